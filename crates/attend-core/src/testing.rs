//! Test doubles shared by the module tests

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::Cell;

use embassy_futures::block_on;

use crate::console::OperatorConsole;
use crate::feedback::Feedback;
use crate::http::HttpResponse;
use crate::report::{Uplink, UplinkError};
use crate::sensor::{ByteSource, CharBuffer, Confirmation, FingerprintSensor, SensorError};
use crate::template::{FingerprintTemplate, TemplateExtractor};
use crate::time::Clock;

/// Virtual clock: sleeping advances time instantly
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    async fn sleep_ms(&self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

/// Deterministic template-like bytes
pub fn template_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A complete template, built the only way one can be: by extraction.
pub fn template_of(len: usize) -> FingerprintTemplate {
    let clock = ManualClock::new();
    let mut source = ScriptedBytes::new(&template_bytes(len));
    match block_on(TemplateExtractor::new(len, 5).extract(&mut source, &clock, 1000)) {
        Ok(template) => template,
        Err(e) => panic!("test template extraction failed: {}", e),
    }
}

/// Byte stream that hands out a fixed script in bounded chunks
pub struct ScriptedBytes {
    data: VecDeque<u8>,
    chunk: usize,
}

impl ScriptedBytes {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.iter().copied().collect(),
            chunk: usize::MAX,
        }
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

fn pop_into(data: &mut VecDeque<u8>, buf: &mut [u8], chunk: usize) -> usize {
    let count = buf.len().min(chunk).min(data.len());
    for (slot, byte) in buf.iter_mut().zip(data.drain(..count)) {
        *slot = byte;
    }
    count
}

impl ByteSource for ScriptedBytes {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        pop_into(&mut self.data, buf, self.chunk)
    }

    fn discard_pending(&mut self) {
        self.data.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCall {
    VerifyConnection,
    CaptureImage,
    ImageToFeatures(CharBuffer),
    BuildModel,
    StoreModel(u16),
    LoadModel(u16),
    RequestModelDump,
    TemplateCount,
}

/// Scriptable sensor that records every call
pub struct MockSensor {
    pub verified: bool,
    /// Outcomes of successive `capture_image` calls; an empty script captures
    pub captures: VecDeque<bool>,
    pub convert_one_result: Result<(), SensorError>,
    pub convert_two_result: Result<(), SensorError>,
    pub build_result: Result<(), SensorError>,
    pub store_result: Result<(), SensorError>,
    pub load_result: Result<(), SensorError>,
    pub dump_result: Result<(), SensorError>,
    /// Bytes streamed after a successful dump request
    pub template: Vec<u8>,
    pub stored: u16,
    pub rx: VecDeque<u8>,
    pub chunk: usize,
    pub calls: Vec<SensorCall>,
    pub discards: usize,
}

impl MockSensor {
    pub fn new() -> Self {
        Self {
            verified: true,
            captures: VecDeque::new(),
            convert_one_result: Ok(()),
            convert_two_result: Ok(()),
            build_result: Ok(()),
            store_result: Ok(()),
            load_result: Ok(()),
            dump_result: Ok(()),
            template: template_bytes(512),
            stored: 0,
            rx: VecDeque::new(),
            chunk: 32,
            calls: Vec::new(),
            discards: 0,
        }
    }

    pub fn script_captures(&mut self, captures: &[bool]) {
        self.captures.extend(captures.iter().copied());
    }

    pub fn called(&self, call: SensorCall) -> bool {
        self.calls.contains(&call)
    }

    pub fn count(&self, call: SensorCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl ByteSource for MockSensor {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        pop_into(&mut self.rx, buf, self.chunk)
    }

    fn discard_pending(&mut self) {
        self.rx.clear();
        self.discards += 1;
    }
}

impl FingerprintSensor for MockSensor {
    async fn verify_connection(&mut self) -> bool {
        self.calls.push(SensorCall::VerifyConnection);
        self.verified
    }

    async fn capture_image(&mut self) -> Result<(), SensorError> {
        self.calls.push(SensorCall::CaptureImage);
        if self.captures.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(SensorError::Rejected {
                operation: "get image",
                code: Confirmation::NoFinger,
            })
        }
    }

    async fn image_to_features(&mut self, slot: CharBuffer) -> Result<(), SensorError> {
        self.calls.push(SensorCall::ImageToFeatures(slot));
        match slot {
            CharBuffer::One => self.convert_one_result,
            CharBuffer::Two => self.convert_two_result,
        }
    }

    async fn build_model(&mut self) -> Result<(), SensorError> {
        self.calls.push(SensorCall::BuildModel);
        self.build_result
    }

    async fn store_model(&mut self, id: u16) -> Result<(), SensorError> {
        self.calls.push(SensorCall::StoreModel(id));
        if self.store_result.is_ok() {
            self.stored += 1;
        }
        self.store_result
    }

    async fn load_model(&mut self, id: u16) -> Result<(), SensorError> {
        self.calls.push(SensorCall::LoadModel(id));
        self.load_result
    }

    async fn request_model_dump(&mut self) -> Result<(), SensorError> {
        self.calls.push(SensorCall::RequestModelDump);
        if self.dump_result.is_ok() {
            self.rx.extend(self.template.iter().copied());
        }
        self.dump_result
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        self.calls.push(SensorCall::TemplateCount);
        Ok(self.stored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub url: String,
    pub body: Vec<u8>,
}

/// Uplink that answers every POST with a canned reply
pub struct MockUplink {
    pub connected: bool,
    pub reply: Result<HttpResponse, UplinkError>,
    pub requests: Vec<SentRequest>,
}

impl MockUplink {
    pub fn responding(status: u16) -> Self {
        Self {
            connected: true,
            reply: Ok(HttpResponse {
                status,
                body: b"{\"message\":\"ok\"}".to_vec(),
            }),
            requests: Vec::new(),
        }
    }

    pub fn failing(error: UplinkError) -> Self {
        Self {
            connected: true,
            reply: Err(error),
            requests: Vec::new(),
        }
    }
}

impl Uplink for MockUplink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn post_json(&mut self, url: &str, body: &[u8]) -> Result<HttpResponse, UplinkError> {
        self.requests.push(SentRequest {
            url: url.to_string(),
            body: body.to_vec(),
        });
        self.reply.clone()
    }
}

/// Feedback sink that keeps every message
#[derive(Default)]
pub struct RecordingFeedback {
    pub messages: Vec<(String, bool)>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&str> {
        self.messages.last().map(|(text, _)| text.as_str())
    }

    pub fn contains(&self, text: &str) -> bool {
        self.messages.iter().any(|(message, _)| message == text)
    }
}

impl Feedback for RecordingFeedback {
    fn show_message(&mut self, text: &str, centered: bool) {
        self.messages.push((text.to_string(), centered));
    }
}

/// Console fed from a fixed string; closed once it runs out
pub struct ScriptedConsole {
    input: VecDeque<u8>,
}

impl ScriptedConsole {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.bytes().collect(),
        }
    }
}

impl OperatorConsole for ScriptedConsole {
    async fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }
}
