//! Status screen rendered in an SDL2 window

use attend_core::Feedback;
use attend_core::display::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, StatusScreen};
use attend_core::feedback::FeedbackMessage;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay, Window};
use log::{error, info};

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

/// Feedback that logs and redraws the status screen in a desktop window.
pub struct WindowFeedback {
    screen: StatusScreen,
    display: SimulatorDisplay<Rgb565>,
    window: Window,
}

impl WindowFeedback {
    pub fn new(title: &'static str) -> Self {
        let display = SimulatorDisplay::<Rgb565>::new(Size::new(
            DISPLAY_WIDTH_PX as u32,
            DISPLAY_HEIGHT_PX as u32,
        ));
        let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
        let window = Window::new("Attendance Simulator", &output_settings);

        let mut feedback = Self {
            screen: StatusScreen::new(title),
            display,
            window,
        };
        feedback.redraw();
        feedback
    }

    fn redraw(&mut self) {
        if let Err(e) = self.screen.draw(&mut self.display) {
            error!("Draw error: {:?}", e);
        }
        // SDL is initialized lazily on the first update
        self.window.update(&self.display);
    }
}

impl Feedback for WindowFeedback {
    fn show_message(&mut self, text: &str, centered: bool) {
        info!("{}", text);
        self.screen.set_message(FeedbackMessage::new(text, centered));
        self.redraw();
    }
}
