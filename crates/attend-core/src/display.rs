//! Status screen
//!
//! Renders the latest feedback message under a title bar on the 320x240
//! panel. Prompts are drawn left aligned from the top; outcomes are centered.

use core::cell::Cell;

use embedded_graphics::{
    geometry::{Point, Size},
    mono_font::{MonoTextStyle, ascii::FONT_10X20},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use log::warn;

use crate::feedback::{FEEDBACK_CAPACITY, FeedbackMessage};

pub const DISPLAY_WIDTH_PX: u16 = 320;
pub const DISPLAY_HEIGHT_PX: u16 = 240;

const CHAR_WIDTH_PX: u16 = 10;
const CHAR_HEIGHT_PX: u16 = 20;
const TITLE_BAR_HEIGHT_PX: u16 = 32;
const MARGIN_PX: u16 = 8;

/// Characters that fit on one line inside the margins
pub const LINE_CHARS: usize = ((DISPLAY_WIDTH_PX - 2 * MARGIN_PX) / CHAR_WIDTH_PX) as usize;

pub const MAX_LINES: usize = 6;

const TITLE_COLOR: Rgb565 = Rgb565::new(2, 8, 12);

/// Word-wrap `text` into lines of at most `width` characters.
///
/// Words longer than a line are split; lines beyond [`MAX_LINES`] are dropped.
pub fn wrap_lines(text: &str, width: usize) -> heapless::Vec<&str, MAX_LINES> {
    let mut lines = heapless::Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() && !lines.is_full() {
        let (line, next) = if rest.len() <= width {
            (rest, "")
        } else {
            let cut = floor_char_boundary(rest, width);
            let window = floor_char_boundary(rest, width + 1);
            match rest[..window].rfind(' ') {
                Some(space) if space > 0 => (&rest[..space], &rest[space + 1..]),
                _ => (&rest[..cut], &rest[cut..]),
            }
        };
        let _ = lines.push(line.trim_end());
        rest = next.trim_start();
    }
    lines
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Full-screen view of the current status message
pub struct StatusScreen {
    title: &'static str,
    message: FeedbackMessage,
    dirty: Cell<bool>,
}

impl StatusScreen {
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            message: FeedbackMessage::new("", true),
            dirty: Cell::new(true),
        }
    }

    pub fn message(&self) -> &FeedbackMessage {
        &self.message
    }

    pub fn set_message(&mut self, message: FeedbackMessage) {
        if message != self.message {
            self.message = message;
            self.dirty.set(true);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Redraw the screen if the message changed since the last draw.
    pub fn draw<D: DrawTarget<Color = Rgb565>>(&self, display: &mut D) -> Result<(), D::Error> {
        if !self.dirty.get() {
            return Ok(());
        }

        display.clear(Rgb565::BLACK)?;

        Rectangle::new(
            Point::zero(),
            Size::new(DISPLAY_WIDTH_PX as u32, TITLE_BAR_HEIGHT_PX as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(TITLE_COLOR))
        .draw(display)?;
        Text::with_baseline(
            self.title,
            Point::new(MARGIN_PX as i32, ((TITLE_BAR_HEIGHT_PX - CHAR_HEIGHT_PX) / 2) as i32),
            MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE),
            Baseline::Top,
        )
        .draw(display)?;

        let lines = wrap_lines(&self.message.text, LINE_CHARS);
        let style = MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE);
        let body_top = (TITLE_BAR_HEIGHT_PX + MARGIN_PX) as i32;

        if self.message.centered {
            let body_height = (DISPLAY_HEIGHT_PX - TITLE_BAR_HEIGHT_PX) as i32;
            let block_height = lines.len() as i32 * CHAR_HEIGHT_PX as i32;
            let top = TITLE_BAR_HEIGHT_PX as i32 + (body_height - block_height) / 2;
            for (row, line) in lines.iter().enumerate() {
                Text::with_text_style(
                    line,
                    Point::new(
                        (DISPLAY_WIDTH_PX / 2) as i32,
                        top + row as i32 * CHAR_HEIGHT_PX as i32,
                    ),
                    style,
                    TextStyleBuilder::new()
                        .alignment(Alignment::Center)
                        .baseline(Baseline::Top)
                        .build(),
                )
                .draw(display)?;
            }
        } else {
            for (row, line) in lines.iter().enumerate() {
                Text::with_baseline(
                    line,
                    Point::new(
                        MARGIN_PX as i32,
                        body_top + row as i32 * CHAR_HEIGHT_PX as i32,
                    ),
                    style,
                    Baseline::Top,
                )
                .draw(display)?;
            }
        }

        self.dirty.set(false);
        Ok(())
    }
}

/// Display task state: applies queued feedback messages to the screen.
pub struct StatusDisplay<D> {
    display: D,
    screen: StatusScreen,
}

impl<D> StatusDisplay<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    pub fn new(display: D, title: &'static str) -> Self {
        Self {
            display,
            screen: StatusScreen::new(title),
        }
    }

    pub fn screen(&self) -> &StatusScreen {
        &self.screen
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Show `message` now.
    pub fn apply(&mut self, message: FeedbackMessage) {
        self.screen.set_message(message);
        if let Err(e) = self.screen.draw(&mut self.display) {
            warn!("Status screen draw failed: {:?}", e);
        }
    }

    /// Render every message the terminal queues, forever.
    pub async fn run(
        &mut self,
        receiver: Receiver<'_, CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_CAPACITY>,
    ) -> ! {
        loop {
            let message = receiver.receive().await;
            self.apply(message);
        }
    }
}
