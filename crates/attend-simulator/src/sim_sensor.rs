//! Simulated R30x sensor
//!
//! Behaves like the real module at the level the terminal sees: scans can be
//! made to fail, models are kept in an in-memory library, and a model dump
//! streams the raw template bytes (optionally cut short to simulate a stall).

use std::collections::{HashMap, VecDeque};

use attend_core::sensor::{ByteSource, CharBuffer, Confirmation, FingerprintSensor, SensorError};
use log::debug;

#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    pub template_len: usize,
    /// Empty image polls before each scan finds a finger
    pub scan_failures: u32,
    /// Stop streaming the template after this many bytes
    pub stall_after: Option<usize>,
    /// Which finger is on the glass; scans of one finger yield equal features
    pub finger: u32,
}

pub struct SimulatedSensor {
    options: SimulationOptions,
    library: HashMap<u16, Vec<u8>>,
    buffers: [Option<Vec<u8>>; 2],
    active_model: Option<Vec<u8>>,
    misses_left: u32,
    scans: u32,
    rx: VecDeque<u8>,
}

impl SimulatedSensor {
    pub fn new(options: SimulationOptions) -> Self {
        Self {
            options,
            library: HashMap::new(),
            buffers: [None, None],
            active_model: None,
            misses_left: options.scan_failures,
            scans: 0,
            rx: VecDeque::new(),
        }
    }

    /// Deterministic feature bytes for the configured finger.
    fn features(&self) -> Vec<u8> {
        let mut state = 0x2545_F491_u32 ^ self.options.finger.wrapping_mul(0x9E37_79B9);
        (0..self.options.template_len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    fn rejected(operation: &'static str, code: Confirmation) -> SensorError {
        SensorError::Rejected { operation, code }
    }
}

impl ByteSource for SimulatedSensor {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        // Roughly what 57600 baud delivers between two 5 ms polls
        let count = buf.len().min(self.rx.len()).min(32);
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn discard_pending(&mut self) {
        self.rx.clear();
    }
}

impl FingerprintSensor for SimulatedSensor {
    async fn verify_connection(&mut self) -> bool {
        true
    }

    async fn capture_image(&mut self) -> Result<(), SensorError> {
        if self.misses_left > 0 {
            self.misses_left -= 1;
            return Err(Self::rejected("get image", Confirmation::NoFinger));
        }
        self.misses_left = self.options.scan_failures;
        self.scans += 1;
        debug!("Simulated finger image #{}", self.scans);
        Ok(())
    }

    async fn image_to_features(&mut self, slot: CharBuffer) -> Result<(), SensorError> {
        if self.scans == 0 {
            return Err(Self::rejected("image to features", Confirmation::InvalidImage));
        }
        self.buffers[usize::from(slot.id() - 1)] = Some(self.features());
        if slot == CharBuffer::One {
            self.active_model = self.buffers[0].clone();
        }
        Ok(())
    }

    async fn build_model(&mut self) -> Result<(), SensorError> {
        match &self.buffers {
            [Some(first), Some(second)] if first == second => {
                self.active_model = Some(first.clone());
                Ok(())
            }
            _ => Err(Self::rejected("create model", Confirmation::EnrollMismatch)),
        }
    }

    async fn store_model(&mut self, id: u16) -> Result<(), SensorError> {
        let model = self
            .active_model
            .clone()
            .ok_or_else(|| Self::rejected("store model", Confirmation::BadLocation))?;
        self.library.insert(id, model);
        Ok(())
    }

    async fn load_model(&mut self, id: u16) -> Result<(), SensorError> {
        let model = self
            .library
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::rejected("load model", Confirmation::DbReadFail))?;
        self.active_model = Some(model);
        Ok(())
    }

    async fn request_model_dump(&mut self) -> Result<(), SensorError> {
        let model = self
            .active_model
            .as_ref()
            .ok_or_else(|| Self::rejected("upload model", Confirmation::UploadFeatureFail))?;
        let sent = self.options.stall_after.unwrap_or(model.len()).min(model.len());
        self.rx.extend(&model[..sent]);
        Ok(())
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        Ok(self.library.len() as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    fn options() -> SimulationOptions {
        SimulationOptions {
            template_len: 512,
            scan_failures: 0,
            stall_after: None,
            finger: 1,
        }
    }

    fn drain(sensor: &mut SimulatedSensor) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let read = sensor.try_read(&mut buf);
            if read == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..read]);
        }
    }

    #[test]
    fn test_enrolled_model_round_trips() {
        let mut sensor = SimulatedSensor::new(options());
        block_on(async {
            sensor.capture_image().await.unwrap();
            sensor.image_to_features(CharBuffer::One).await.unwrap();
            sensor.capture_image().await.unwrap();
            sensor.image_to_features(CharBuffer::Two).await.unwrap();
            sensor.build_model().await.unwrap();
            sensor.store_model(42).await.unwrap();
            sensor.load_model(42).await.unwrap();
            sensor.request_model_dump().await.unwrap();
        });

        assert_eq!(drain(&mut sensor).len(), 512);
        assert_eq!(block_on(sensor.template_count()), Ok(1));
    }

    #[test]
    fn test_scan_failures_before_finger() {
        let mut sensor = SimulatedSensor::new(SimulationOptions {
            scan_failures: 2,
            ..options()
        });

        assert!(block_on(sensor.capture_image()).is_err());
        assert!(block_on(sensor.capture_image()).is_err());
        assert!(block_on(sensor.capture_image()).is_ok());
    }

    #[test]
    fn test_stall_truncates_dump() {
        let mut sensor = SimulatedSensor::new(SimulationOptions {
            stall_after: Some(300),
            ..options()
        });
        block_on(async {
            sensor.capture_image().await.unwrap();
            sensor.image_to_features(CharBuffer::One).await.unwrap();
            sensor.request_model_dump().await.unwrap();
        });

        assert_eq!(drain(&mut sensor).len(), 300);
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        let mut sensor = SimulatedSensor::new(options());

        let error = block_on(sensor.load_model(9)).unwrap_err();
        assert_eq!(error.confirmation(), Some(Confirmation::DbReadFail));
    }
}
