//! Attendance terminal loop
//!
//! [`AttendanceTerminal`] owns the long-lived sensor session and uplink and
//! runs one cycle per operator command:
//!
//! capture -> extract -> report -> feedback
//!
//! Every failure ends the cycle with a message; none of them stops the loop.

use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::capture::{CaptureController, CaptureFailure, CaptureMode};
use crate::config::{CaptureTiming, Config};
use crate::console::{Command, IdError, OperatorConsole, next_command, read_enroll_id};
use crate::feedback::{Feedback, Status};
use crate::report::{ReportOutcome, ResultReporter, Uplink};
use crate::sensor::{ByteSource, FingerprintSensor, SensorSession, StartupError};
use crate::template::{ExtractError, TemplateExtractor};
use crate::time::Clock;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleError {
    #[error("{0}")]
    Capture(CaptureFailure),
    #[error("{0}")]
    Extract(ExtractError),
}

/// How one cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A template was sent and the server answered (or did not)
    Reported(ReportOutcome),
    /// The cycle ended before anything was sent
    Failed(CycleError),
    /// The enrollment id was rejected before the sensor was touched
    InvalidId(IdError),
}

pub struct AttendanceTerminal<'a, S, U, F, C> {
    session: SensorSession<S>,
    uplink: U,
    feedback: F,
    clock: C,
    capture: CaptureController,
    extractor: TemplateExtractor,
    reporter: ResultReporter<'a>,
    timing: CaptureTiming,
    capacity: u16,
}

impl<'a, S, U, F, C> AttendanceTerminal<'a, S, U, F, C>
where
    S: FingerprintSensor,
    U: Uplink,
    F: Feedback,
    C: Clock,
{
    /// Verify the sensor and build the terminal.
    ///
    /// A sensor that fails the handshake is reported on `feedback` and
    /// returned as the only fatal error.
    pub async fn start(
        sensor: S,
        uplink: U,
        mut feedback: F,
        clock: C,
        config: &Config<'a>,
    ) -> Result<Self, StartupError> {
        let mut session = match SensorSession::open(sensor, config.sensor.baud_rate).await {
            Ok(session) => session,
            Err(e) => {
                error!("{}", e);
                feedback.show(&Status::SensorMissing);
                return Err(e);
            }
        };

        let count = session.template_count().await;
        let templates = match count {
            Ok(count) => {
                info!(
                    "Sensor at {} baud contains {} templates",
                    session.baud_rate(),
                    count
                );
                Some(count)
            }
            Err(e) => {
                warn!("Could not read template count: {}", e);
                None
            }
        };
        feedback.show(&Status::SensorReady { templates });

        Ok(Self {
            session,
            uplink,
            feedback,
            clock,
            capture: CaptureController::new(config.timing),
            extractor: TemplateExtractor::new(
                config.sensor.template_len,
                config.timing.drain_poll_interval_ms,
            ),
            reporter: ResultReporter::new(&config.api),
            timing: config.timing,
            capacity: config.sensor.capacity,
        })
    }

    pub fn session(&self) -> &SensorSession<S> {
        &self.session
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    /// Run one full capture/extract/report cycle for `mode`.
    pub async fn run_cycle(&mut self, mode: CaptureMode) -> CycleOutcome {
        let outcome = self.cycle(mode).await;
        self.capture.reset();
        outcome
    }

    async fn cycle(&mut self, mode: CaptureMode) -> CycleOutcome {
        if let Err(failure) = self
            .capture
            .run(mode, &mut self.session, &self.clock, &mut self.feedback)
            .await
        {
            self.log_sensor_outcome();
            self.session.discard_pending();
            self.feedback.show(&failure.status());
            return CycleOutcome::Failed(CycleError::Capture(failure));
        }

        let deadline_ms = match mode {
            CaptureMode::Enroll { .. } => self.timing.enroll_deadline_ms,
            CaptureMode::Verify => self.timing.match_deadline_ms,
        };
        let template = match self
            .extractor
            .extract(&mut self.session, &self.clock, deadline_ms)
            .await
        {
            Ok(template) => template,
            Err(e @ ExtractError::Shortfall { read, expected }) => {
                self.log_sensor_outcome();
                self.session.discard_pending();
                self.feedback
                    .show(&Status::DownloadError { read, expected });
                return CycleOutcome::Failed(CycleError::Extract(e));
            }
        };

        self.feedback.show(&Status::Sending);
        let outcome = self
            .reporter
            .report(mode, template, &mut self.uplink, &mut self.session)
            .await;
        info!("Report outcome: {:?}", outcome);
        self.feedback.show(&outcome.status(mode));
        CycleOutcome::Reported(outcome)
    }

    fn log_sensor_outcome(&self) {
        match self.session.last_outcome() {
            Ok(()) => info!("Last sensor command succeeded; the data stream stalled"),
            Err(e) => warn!("Last sensor command failed: {}", e),
        }
    }

    /// Handle one console command, reading the enrollment id if needed.
    ///
    /// Returns `None` when the console closed mid-command.
    pub async fn handle_command<T>(
        &mut self,
        command: Command,
        console: &mut T,
    ) -> Option<CycleOutcome>
    where
        T: OperatorConsole + ?Sized,
    {
        match command {
            Command::Match => Some(self.run_cycle(CaptureMode::Verify).await),
            Command::Enroll => {
                self.feedback.show(&Status::EnterId { max: self.capacity });
                match read_enroll_id(console, self.capacity).await {
                    Ok(id) => Some(self.run_cycle(CaptureMode::Enroll { id }).await),
                    Err(IdError::Closed) => None,
                    Err(e) => {
                        warn!("{}", e);
                        self.feedback.show(&Status::InvalidId);
                        Some(CycleOutcome::InvalidId(e))
                    }
                }
            }
        }
    }

    /// Serve console commands until the console closes.
    pub async fn serve<T>(&mut self, console: &mut T)
    where
        T: OperatorConsole + ?Sized,
    {
        self.feedback.show(&Status::Idle);
        while let Some(command) = next_command(console).await {
            if self.handle_command(command, console).await.is_none() {
                break;
            }
            info!("Ready: press 'e' to enroll or 'm' to match");
        }
        info!("Console closed");
    }
}
