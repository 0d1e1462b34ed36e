//! Result reporting
//!
//! One POST per cycle: the template goes out as base64 inside a small JSON
//! record, the status code decides the outcome, and the body is only logged.
//! Delivery is never retried.

use alloc::vec::Vec;
use core::future::Future;

use log::{info, warn};
use serde::Serialize;
use thiserror_no_std::Error;

use crate::capture::CaptureMode;
use crate::config::ApiConfig;
use crate::feedback::Status;
use crate::http::{HttpResponse, ResponseError, UrlError};
use crate::sensor::ByteSource;
use crate::template::FingerprintTemplate;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UplinkError {
    #[error("Invalid endpoint: {0}")]
    Url(UrlError),
    #[error("Could not resolve {host}")]
    Dns { host: heapless::String<64> },
    #[error("Network {operation} failed")]
    Transport { operation: &'static str },
    #[error("Bad response: {0}")]
    Response(ResponseError),
}

/// Network path to the attendance server.
pub trait Uplink {
    /// True while the station is associated and has an address.
    fn is_connected(&self) -> bool;

    /// POST `body` as `application/json` to `url` and return the response.
    ///
    /// The connection is opened and closed within this call.
    fn post_json(
        &mut self,
        url: &str,
        body: &[u8],
    ) -> impl Future<Output = Result<HttpResponse, UplinkError>>;
}

impl<U: Uplink + ?Sized> Uplink for &mut U {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn post_json(
        &mut self,
        url: &str,
        body: &[u8],
    ) -> impl Future<Output = Result<HttpResponse, UplinkError>> {
        (**self).post_json(url, body)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Could not encode report body")]
    Encode,
    #[error("{0}")]
    Uplink(UplinkError),
}

#[derive(Serialize)]
struct EnrollRecord<'a> {
    fingerprint_id: u16,
    template: &'a str,
}

#[derive(Serialize)]
struct MatchRecord<'a> {
    template: &'a str,
}

/// JSON body for `mode`; the template is already base64 text.
pub fn encode_record(mode: CaptureMode, template: &str) -> Result<Vec<u8>, ReportError> {
    let encoded = match mode {
        CaptureMode::Enroll { id } => serde_json::to_vec(&EnrollRecord {
            fingerprint_id: id,
            template,
        }),
        CaptureMode::Verify => serde_json::to_vec(&MatchRecord { template }),
    };
    encoded.map_err(|_| ReportError::Encode)
}

/// How the server answered one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Accepted { status: u16 },
    Rejected { status: u16 },
    NotConnected,
    NoResponse,
}

impl ReportOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Message shown to the operator after a report in `mode`.
    pub fn status(&self, mode: CaptureMode) -> Status {
        match (self, mode) {
            (Self::Accepted { .. }, CaptureMode::Enroll { .. }) => Status::Success,
            (Self::Accepted { .. }, CaptureMode::Verify) => Status::Matched,
            (Self::Rejected { .. }, CaptureMode::Verify) => Status::NoMatch,
            (Self::Rejected { status }, CaptureMode::Enroll { .. }) => {
                Status::Rejected { status: *status }
            }
            (Self::NotConnected, _) => Status::NotConnected,
            (Self::NoResponse, _) => Status::NoResponse,
        }
    }
}

pub struct ResultReporter<'a> {
    enroll_url: &'a str,
    match_url: &'a str,
}

impl<'a> ResultReporter<'a> {
    pub fn new(api: &ApiConfig<'a>) -> Self {
        Self {
            enroll_url: api.enroll_url,
            match_url: api.match_url,
        }
    }

    fn url_for(&self, mode: CaptureMode) -> &'a str {
        match mode {
            CaptureMode::Enroll { .. } => self.enroll_url,
            CaptureMode::Verify => self.match_url,
        }
    }

    /// Send `template` for `mode` and classify the answer.
    ///
    /// The sensor's receive buffer is flushed afterwards whatever happened,
    /// so leftover upload packets never leak into the next cycle.
    pub async fn report<U, B>(
        &self,
        mode: CaptureMode,
        template: FingerprintTemplate,
        uplink: &mut U,
        sensor_stream: &mut B,
    ) -> ReportOutcome
    where
        U: Uplink + ?Sized,
        B: ByteSource + ?Sized,
    {
        let outcome = self.exchange(mode, template, uplink).await;
        sensor_stream.discard_pending();
        outcome
    }

    async fn exchange<U>(
        &self,
        mode: CaptureMode,
        template: FingerprintTemplate,
        uplink: &mut U,
    ) -> ReportOutcome
    where
        U: Uplink + ?Sized,
    {
        if !uplink.is_connected() {
            warn!("WiFi not connected, report skipped");
            return ReportOutcome::NotConnected;
        }

        let url = self.url_for(mode);
        let response = match self.post(mode, &template, uplink, url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Report to {} failed: {}", url, e);
                return ReportOutcome::NoResponse;
            }
        };

        info!("Server response ({}): {}", response.status, response.body_text());
        if response.is_success() {
            ReportOutcome::Accepted {
                status: response.status,
            }
        } else {
            ReportOutcome::Rejected {
                status: response.status,
            }
        }
    }

    async fn post<U>(
        &self,
        mode: CaptureMode,
        template: &FingerprintTemplate,
        uplink: &mut U,
        url: &str,
    ) -> Result<HttpResponse, ReportError>
    where
        U: Uplink + ?Sized,
    {
        let encoded = template.to_base64();
        let body = encode_record(mode, &encoded)?;
        info!("Sending {} byte template to {}", template.len(), url);
        uplink.post_json(url, &body).await.map_err(ReportError::Uplink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockUplink, ScriptedBytes, template_of};
    use alloc::string::String;
    use embassy_futures::block_on;
    use serde::Deserialize;

    const API: ApiConfig<'static> = ApiConfig {
        enroll_url: "http://10.0.0.2:3000/api/fingerprint",
        match_url: "http://10.0.0.2:3000/api/fingerprint/match",
    };

    fn report(
        mode: CaptureMode,
        uplink: &mut MockUplink,
        stream: &mut ScriptedBytes,
    ) -> ReportOutcome {
        let reporter = ResultReporter::new(&API);
        block_on(reporter.report(mode, template_of(512), uplink, stream))
    }

    #[test]
    fn test_enroll_record_shape() {
        let body = encode_record(CaptureMode::Enroll { id: 42 }, "AAEC").unwrap();

        assert_eq!(
            core::str::from_utf8(&body).unwrap(),
            r#"{"fingerprint_id":42,"template":"AAEC"}"#
        );
    }

    #[test]
    fn test_match_record_shape() {
        let body = encode_record(CaptureMode::Verify, "AAEC").unwrap();

        assert_eq!(
            core::str::from_utf8(&body).unwrap(),
            r#"{"template":"AAEC"}"#
        );
    }

    #[test]
    fn test_not_connected_skips_network() {
        let mut uplink = MockUplink::responding(201);
        uplink.connected = false;
        let mut stream = ScriptedBytes::new(&[0u8; 40]);

        let outcome = report(CaptureMode::Enroll { id: 1 }, &mut uplink, &mut stream);

        assert_eq!(outcome, ReportOutcome::NotConnected);
        assert!(uplink.requests.is_empty());
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_any_success_status_is_accepted() {
        for status in [200, 201, 204] {
            let mut uplink = MockUplink::responding(status);
            let mut stream = ScriptedBytes::new(&[]);

            let outcome = report(CaptureMode::Enroll { id: 5 }, &mut uplink, &mut stream);
            assert_eq!(outcome, ReportOutcome::Accepted { status });
            assert_eq!(uplink.requests.len(), 1);
        }
    }

    #[test]
    fn test_other_status_is_rejected() {
        for status in [301, 400, 404, 500] {
            let mut uplink = MockUplink::responding(status);
            let mut stream = ScriptedBytes::new(&[]);

            let outcome = report(CaptureMode::Verify, &mut uplink, &mut stream);
            assert_eq!(outcome, ReportOutcome::Rejected { status });
            assert_eq!(outcome.status(CaptureMode::Verify), Status::NoMatch);
        }
    }

    #[test]
    fn test_transport_failure_is_no_response_and_flushes() {
        let mut uplink = MockUplink::failing(UplinkError::Transport {
            operation: "connect",
        });
        let mut stream = ScriptedBytes::new(&[0xAB; 100]);

        let outcome = report(CaptureMode::Verify, &mut uplink, &mut stream);

        assert_eq!(outcome, ReportOutcome::NoResponse);
        assert_eq!(uplink.requests.len(), 1);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_request_goes_to_mode_endpoint() {
        let mut uplink = MockUplink::responding(200);
        let mut stream = ScriptedBytes::new(&[]);

        report(CaptureMode::Verify, &mut uplink, &mut stream);
        report(CaptureMode::Enroll { id: 3 }, &mut uplink, &mut stream);

        assert_eq!(uplink.requests[0].url, API.match_url);
        assert_eq!(uplink.requests[1].url, API.enroll_url);
    }

    #[test]
    fn test_template_survives_encoding() {
        let mut uplink = MockUplink::responding(201);
        let mut stream = ScriptedBytes::new(&[]);

        report(CaptureMode::Enroll { id: 42 }, &mut uplink, &mut stream);

        #[derive(Deserialize)]
        struct Sent {
            fingerprint_id: u16,
            template: String,
        }

        let sent: Sent = serde_json::from_slice(&uplink.requests[0].body).unwrap();
        assert_eq!(sent.fingerprint_id, 42);
        let decoded = FingerprintTemplate::from_base64(&sent.template, 512).unwrap();
        assert_eq!(decoded, template_of(512));
    }

    #[test]
    fn test_outcome_messages() {
        let enroll = CaptureMode::Enroll { id: 1 };

        assert_eq!(
            ReportOutcome::Accepted { status: 201 }.status(enroll),
            Status::Success
        );
        assert_eq!(
            ReportOutcome::Rejected { status: 500 }.status(enroll),
            Status::Rejected { status: 500 }
        );
        assert_eq!(
            ReportOutcome::Accepted { status: 200 }.status(CaptureMode::Verify),
            Status::Matched
        );
        assert_eq!(
            ReportOutcome::NoResponse.status(CaptureMode::Verify),
            Status::NoResponse
        );
    }
}
