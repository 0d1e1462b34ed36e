//! User feedback
//!
//! Every stage of a cycle reports progress through [`Feedback`]. Messages are
//! fire-and-forget: a full display queue or a missing display never fails the
//! capture flow.

use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use log::{info, warn};

/// Longest message the status screen shows
pub const MAX_MESSAGE_LEN: usize = 64;

/// Channel capacity for queued display messages
pub const FEEDBACK_CAPACITY: usize = 4;

pub type MessageText = heapless::String<MAX_MESSAGE_LEN>;

/// Display/log sink for status messages
pub trait Feedback {
    fn show_message(&mut self, text: &str, centered: bool);

    fn show(&mut self, status: &Status) {
        self.show_message(&status.render(), status.centered());
    }
}

impl<F: Feedback + ?Sized> Feedback for &mut F {
    fn show_message(&mut self, text: &str, centered: bool) {
        (**self).show_message(text, centered)
    }
}

/// Everything the terminal tells the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    ConnectingWifi,
    SensorMissing,
    ConfigError,
    SensorReady { templates: Option<u16> },
    Idle,
    EnterId { max: u16 },
    InvalidId,
    PlaceFinger,
    RemoveFinger,
    PlaceAgain,
    PlaceToMatch,
    ScanRetry { attempt: u8, of: u8 },
    ScanFailed,
    Enrolled { id: u16 },
    EnrollFailed,
    ModelLoadFailed,
    DownloadError { read: usize, expected: usize },
    Sending,
    Success,
    Matched,
    NoMatch,
    Rejected { status: u16 },
    NotConnected,
    NoResponse,
}

impl Status {
    pub fn render(&self) -> MessageText {
        let mut text = MessageText::new();
        // All messages fit within MAX_MESSAGE_LEN
        let _ = match self {
            Self::ConnectingWifi => write!(text, "Connecting to WiFi..."),
            Self::SensorMissing => write!(text, "Fingerprint sensor not found"),
            Self::ConfigError => write!(text, "Configuration error"),
            Self::SensorReady { templates: Some(count) } => {
                write!(text, "Sensor ready ({} stored)", count)
            }
            Self::SensorReady { templates: None } => write!(text, "Sensor ready"),
            Self::Idle => write!(text, "Press 'e' to enroll or 'm' to match"),
            Self::EnterId { max } => write!(text, "Enter ID (1-{}):", max),
            Self::InvalidId => write!(text, "Invalid ID"),
            Self::PlaceFinger => write!(text, "Place your finger..."),
            Self::RemoveFinger => write!(text, "Remove finger..."),
            Self::PlaceAgain => write!(text, "Place the same finger again..."),
            Self::PlaceToMatch => write!(text, "Place your finger to match..."),
            Self::ScanRetry { attempt, of } => {
                write!(text, "No finger, retrying ({}/{})", attempt, of)
            }
            Self::ScanFailed => write!(text, "Scan failed"),
            Self::Enrolled { id } => write!(text, "Fingerprint enrolled as #{}", id),
            Self::EnrollFailed => write!(text, "Enrollment failed"),
            Self::ModelLoadFailed => write!(text, "Failed to load fingerprint model"),
            Self::DownloadError { read, expected } => {
                write!(text, "Download error ({}/{} bytes)", read, expected)
            }
            Self::Sending => write!(text, "Sending template..."),
            Self::Success => write!(text, "Success"),
            Self::Matched => write!(text, "Fingerprint matched"),
            Self::NoMatch => write!(text, "No matching fingerprint"),
            Self::Rejected { status } => write!(text, "Server rejected (HTTP {})", status),
            Self::NotConnected => write!(text, "WiFi not connected"),
            Self::NoResponse => write!(text, "No response from server"),
        };
        text
    }

    /// Prompts are left aligned; outcomes are centered on the screen.
    pub fn centered(&self) -> bool {
        !matches!(
            self,
            Self::Idle
                | Self::EnterId { .. }
                | Self::PlaceFinger
                | Self::RemoveFinger
                | Self::PlaceAgain
                | Self::PlaceToMatch
                | Self::ScanRetry { .. }
        )
    }
}

/// Feedback that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn show_message(&mut self, text: &str, _centered: bool) {
        info!("{}", text);
    }
}

/// A message queued for the display task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub text: MessageText,
    pub centered: bool,
}

impl FeedbackMessage {
    pub fn new(text: &str, centered: bool) -> Self {
        let mut buffer = MessageText::new();
        for ch in text.chars() {
            if buffer.push(ch).is_err() {
                break;
            }
        }
        Self {
            text: buffer,
            centered,
        }
    }
}

pub type FeedbackChannel = Channel<CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_CAPACITY>;

/// Global channel between the terminal loop and the display task
pub static FEEDBACK_CHANNEL: FeedbackChannel = Channel::new();

/// Helper to get a feedback sender
pub fn get_feedback_sender()
-> Sender<'static, CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_CAPACITY> {
    FEEDBACK_CHANNEL.sender()
}

/// Helper to get a feedback receiver
pub fn get_feedback_receiver()
-> Receiver<'static, CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_CAPACITY> {
    FEEDBACK_CHANNEL.receiver()
}

/// Feedback that logs and queues the message for the display task.
///
/// A full queue drops the message rather than blocking the capture loop.
pub struct ChannelFeedback<'a> {
    sender: Sender<'a, CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_CAPACITY>,
}

impl<'a> ChannelFeedback<'a> {
    pub fn new(
        sender: Sender<'a, CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_CAPACITY>,
    ) -> Self {
        Self { sender }
    }
}

impl Feedback for ChannelFeedback<'_> {
    fn show_message(&mut self, text: &str, centered: bool) {
        info!("{}", text);
        if let Err(TrySendError::Full(message)) =
            self.sender.try_send(FeedbackMessage::new(text, centered))
        {
            warn!("Display queue full, dropping message: {}", message.text);
        }
    }
}
