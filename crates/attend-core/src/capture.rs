//! Capture state machine
//!
//! [`CaptureController`] drives the sensor through one enrollment or
//! verification scan and leaves the active model's template streaming on the
//! serial link for the extractor.
//!
//! ```text
//! Enroll:  Idle -> AwaitFirstScan -> AwaitRemoval -> AwaitSecondScan
//!               -> BuildModel -> ModelReady -> Done
//! Verify:  Idle -> AwaitScan -> ModelReady -> Done
//! ```
//!
//! Any sensor failure moves the controller to `Failed`; the terminal resets it
//! to `Idle` once the cycle is reported.

use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::config::CaptureTiming;
use crate::feedback::{Feedback, Status};
use crate::sensor::{CharBuffer, FingerprintSensor, SensorError};
use crate::time::{Clock, Deadline};

/// What the current cycle does with the scanned finger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Store the finger at `id` in the sensor library and report it
    Enroll { id: u16 },
    /// Scan once and report the template for matching
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitFirstScan,
    AwaitRemoval,
    AwaitSecondScan,
    AwaitScan,
    BuildModel,
    ModelReady,
    Done,
    Failed(CaptureFailure),
}

impl CaptureState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFailure {
    #[error("No finger within {waited_ms} ms on scan {index}")]
    ScanTimeout { index: u8, waited_ms: u64 },
    #[error("No usable image after {attempts} attempts")]
    ScanFailed { attempts: u8 },
    #[error("Feature conversion failed on scan {index}: {error}")]
    Conversion { index: u8, error: SensorError },
    #[error("Could not build model: {0}")]
    ModelBuild(SensorError),
    #[error("Could not store model: {0}")]
    ModelStore(SensorError),
    #[error("Could not load model: {0}")]
    ModelLoad(SensorError),
    #[error("Could not request template upload: {0}")]
    ModelDump(SensorError),
}

impl CaptureFailure {
    /// Message shown to the operator for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::ScanTimeout { .. } | Self::ScanFailed { .. } | Self::Conversion { .. } => {
                Status::ScanFailed
            }
            Self::ModelBuild(_) | Self::ModelStore(_) => Status::EnrollFailed,
            Self::ModelLoad(_) | Self::ModelDump(_) => Status::ModelLoadFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Captured,
    ImageTimeout,
    ConversionError(SensorError),
}

/// One scan step; the controller keeps the most recent one for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureAttempt {
    /// 1 for the first scan, 2 for the second enrollment scan
    pub index: u8,
    /// Image polls that came back without a usable finger
    pub retries: u32,
    pub outcome: AttemptOutcome,
}

impl CaptureAttempt {
    fn new(index: u8) -> Self {
        Self {
            index,
            retries: 0,
            outcome: AttemptOutcome::Pending,
        }
    }

    fn slot(&self) -> CharBuffer {
        if self.index == 2 {
            CharBuffer::Two
        } else {
            CharBuffer::One
        }
    }
}

pub struct CaptureController {
    timing: CaptureTiming,
    state: CaptureState,
    last_attempt: Option<CaptureAttempt>,
}

impl CaptureController {
    pub fn new(timing: CaptureTiming) -> Self {
        Self {
            timing,
            state: CaptureState::Idle,
            last_attempt: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// The most recent scan step of the current (or last) run.
    pub fn last_attempt(&self) -> Option<CaptureAttempt> {
        self.last_attempt
    }

    /// Return to `Idle` after a finished cycle.
    pub fn reset(&mut self) {
        self.transition(CaptureState::Idle);
    }

    /// Run one capture for `mode`.
    ///
    /// On success the sensor has acknowledged the upload request and the
    /// template bytes are waiting in its byte stream.
    pub async fn run<S, C, F>(
        &mut self,
        mode: CaptureMode,
        sensor: &mut S,
        clock: &C,
        feedback: &mut F,
    ) -> Result<(), CaptureFailure>
    where
        S: FingerprintSensor + ?Sized,
        C: Clock,
        F: Feedback + ?Sized,
    {
        self.last_attempt = None;
        let result = match mode {
            CaptureMode::Enroll { id } => self.enroll(id, sensor, clock, feedback).await,
            CaptureMode::Verify => self.verify(sensor, clock, feedback).await,
        };

        match result {
            Ok(()) => self.transition(CaptureState::Done),
            Err(failure) => {
                warn!("Capture failed: {}", failure);
                self.transition(CaptureState::Failed(failure));
            }
        }
        result
    }

    async fn enroll<S, C, F>(
        &mut self,
        id: u16,
        sensor: &mut S,
        clock: &C,
        feedback: &mut F,
    ) -> Result<(), CaptureFailure>
    where
        S: FingerprintSensor + ?Sized,
        C: Clock,
        F: Feedback + ?Sized,
    {
        info!("Enrolling fingerprint as #{}", id);

        self.transition(CaptureState::AwaitFirstScan);
        feedback.show(&Status::PlaceFinger);
        self.scan_until_ready(1, sensor, clock).await?;

        self.transition(CaptureState::AwaitRemoval);
        feedback.show(&Status::RemoveFinger);
        clock.sleep_ms(self.timing.removal_delay_ms).await;

        self.transition(CaptureState::AwaitSecondScan);
        feedback.show(&Status::PlaceAgain);
        self.scan_until_ready(2, sensor, clock).await?;

        self.transition(CaptureState::BuildModel);
        sensor
            .build_model()
            .await
            .map_err(CaptureFailure::ModelBuild)?;
        sensor
            .store_model(id)
            .await
            .map_err(CaptureFailure::ModelStore)?;
        info!("Fingerprint stored as #{}", id);
        feedback.show(&Status::Enrolled { id });

        self.transition(CaptureState::ModelReady);
        sensor
            .load_model(id)
            .await
            .map_err(CaptureFailure::ModelLoad)?;
        sensor
            .request_model_dump()
            .await
            .map_err(CaptureFailure::ModelDump)
    }

    async fn verify<S, C, F>(
        &mut self,
        sensor: &mut S,
        clock: &C,
        feedback: &mut F,
    ) -> Result<(), CaptureFailure>
    where
        S: FingerprintSensor + ?Sized,
        C: Clock,
        F: Feedback + ?Sized,
    {
        self.transition(CaptureState::AwaitScan);
        feedback.show(&Status::PlaceToMatch);

        let attempts = self.timing.verify_attempts;
        let mut attempt = CaptureAttempt::new(1);
        for round in 1..=attempts {
            match sensor.capture_image().await {
                Ok(()) => {
                    attempt.outcome = AttemptOutcome::Captured;
                    break;
                }
                Err(e) => {
                    attempt.retries += 1;
                    info!("Scan attempt {}/{} failed: {}", round, attempts, e);
                    if round < attempts {
                        feedback.show(&Status::ScanRetry {
                            attempt: round + 1,
                            of: attempts,
                        });
                        clock.sleep_ms(self.timing.retry_backoff_ms).await;
                    }
                }
            }
        }
        if attempt.outcome != AttemptOutcome::Captured {
            attempt.outcome = AttemptOutcome::ImageTimeout;
            debug!("Verification scan ended: {:?}", attempt);
            self.last_attempt = Some(attempt);
            return Err(CaptureFailure::ScanFailed { attempts });
        }

        let converted = self.convert(&mut attempt, sensor).await;
        self.last_attempt = Some(attempt);
        converted?;

        self.transition(CaptureState::ModelReady);
        sensor
            .request_model_dump()
            .await
            .map_err(CaptureFailure::ModelDump)
    }

    /// Poll for a finger on scan `index`, then convert it into its buffer.
    async fn scan_until_ready<S, C>(
        &mut self,
        index: u8,
        sensor: &mut S,
        clock: &C,
    ) -> Result<CaptureAttempt, CaptureFailure>
    where
        S: FingerprintSensor + ?Sized,
        C: Clock,
    {
        let mut attempt = CaptureAttempt::new(index);
        let deadline = Deadline::optional(clock, self.timing.enroll_scan_timeout_ms);

        loop {
            if sensor.capture_image().await.is_ok() {
                attempt.outcome = AttemptOutcome::Captured;
                break;
            }
            attempt.retries += 1;
            if deadline.expired(clock) {
                attempt.outcome = AttemptOutcome::ImageTimeout;
                debug!("Scan {} ended: {:?}", index, attempt);
                self.last_attempt = Some(attempt);
                return Err(CaptureFailure::ScanTimeout {
                    index,
                    waited_ms: deadline.elapsed_ms(clock),
                });
            }
            clock.sleep_ms(self.timing.image_poll_interval_ms).await;
        }
        debug!("Scan {} captured after {} empty polls", index, attempt.retries);

        let converted = self.convert(&mut attempt, sensor).await;
        self.last_attempt = Some(attempt);
        converted.map(|()| attempt)
    }

    async fn convert<S>(
        &self,
        attempt: &mut CaptureAttempt,
        sensor: &mut S,
    ) -> Result<(), CaptureFailure>
    where
        S: FingerprintSensor + ?Sized,
    {
        match sensor.image_to_features(attempt.slot()).await {
            Ok(()) => {
                info!("Scan {} converted", attempt.index);
                Ok(())
            }
            Err(error) => {
                attempt.outcome = AttemptOutcome::ConversionError(error);
                Err(CaptureFailure::Conversion {
                    index: attempt.index,
                    error,
                })
            }
        }
    }

    fn transition(&mut self, to: CaptureState) {
        if self.state != to {
            debug!("Capture state {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}
