//! Minimal HTTP/1.1 framing for the report uplink
//!
//! The firmware has no HTTP client crate on its `no_std` network stack, so it
//! frames requests itself: parse the endpoint URL, write a POST request head,
//! and pick the status code and body out of the response. Only plain HTTP is
//! spoken on the wire; [`Scheme::Https`] is recognised so callers without TLS
//! can refuse it.

use alloc::vec::Vec;
use core::fmt::Write as _;

use thiserror_no_std::Error;

/// Response bodies beyond this size are truncated; they are diagnostics only.
pub const MAX_BODY_LEN: usize = 1024;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlError {
    #[error("Only http:// and https:// URLs are supported")]
    UnsupportedScheme,
    #[error("https:// endpoints need TLS, which this uplink does not provide")]
    TlsUnavailable,
    #[error("URL has no host")]
    MissingHost,
    #[error("Invalid port in URL")]
    InvalidPort,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Response ended before the header block")]
    Incomplete,
    #[error("Malformed status line")]
    MalformedStatusLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Borrowed view of an `http(s)://host[:port]/path` URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpUrl<'a> {
    pub scheme: Scheme,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl<'a> HttpUrl<'a> {
    pub fn parse(url: &'a str) -> Result<Self, UrlError> {
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else {
            return Err(UrlError::UnsupportedScheme);
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>().map_err(|_| UrlError::InvalidPort)?,
            ),
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }
}

/// Serialize a JSON POST request (head and body) into `out`.
pub fn write_post_request(out: &mut Vec<u8>, url: &HttpUrl<'_>, body: &[u8]) {
    let mut head = alloc::string::String::with_capacity(160);
    // Writing into a String cannot fail
    let _ = write!(head, "POST {} HTTP/1.1\r\nHost: {}", url.path, url.host);
    if url.port != url.scheme.default_port() {
        let _ = write!(head, ":{}", url.port);
    }
    let _ = write!(
        head,
        "\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(body);
}

/// Parsed response: status code and (possibly truncated) body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body as text for logging; invalid UTF-8 is shown as a placeholder.
    pub fn body_text(&self) -> &str {
        core::str::from_utf8(&self.body).unwrap_or("<binary body>")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Parse a complete response as read until the server closed the connection.
pub fn parse_response(raw: &[u8]) -> Result<HttpResponse, ResponseError> {
    let header_end = find(raw, b"\r\n\r\n").ok_or(ResponseError::Incomplete)?;
    let head = core::str::from_utf8(&raw[..header_end])
        .map_err(|_| ResponseError::MalformedStatusLine)?;

    let mut lines = head.split("\r\n");
    let status = parse_status_line(lines.next().unwrap_or_default())?;

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok());

    let body = &raw[header_end + 4..];
    let body_len = content_length.unwrap_or(body.len()).min(body.len());
    let kept = body_len.min(MAX_BODY_LEN);

    Ok(HttpResponse {
        status,
        body: body[..kept].to_vec(),
    })
}

/// `HTTP/1.1 201 Created` -> 201
pub fn parse_status_line(line: &str) -> Result<u16, ResponseError> {
    let mut parts = line.split_ascii_whitespace();
    let version = parts.next().ok_or(ResponseError::MalformedStatusLine)?;
    if !version.starts_with("HTTP/") {
        return Err(ResponseError::MalformedStatusLine);
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..600).contains(code))
        .ok_or(ResponseError::MalformedStatusLine)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_with_port_and_path() {
        let url = HttpUrl::parse("http://192.168.1.20:3000/api/fingerprint").unwrap();

        assert_eq!(url.scheme, Scheme::Http);
        assert_eq!(url.host, "192.168.1.20");
        assert_eq!(url.port, 3000);
        assert_eq!(url.path, "/api/fingerprint");
    }

    #[test]
    fn test_parse_url_defaults() {
        let url = HttpUrl::parse("http://erp.local").unwrap();

        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/");
    }

    #[test]
    fn test_parse_https_url() {
        let url = HttpUrl::parse("https://fingerprint-api.vercel.app/api/fingerprint").unwrap();

        assert_eq!(url.scheme, Scheme::Https);
        assert_eq!(url.host, "fingerprint-api.vercel.app");
        assert_eq!(url.port, 443);
        assert_eq!(url.path, "/api/fingerprint");
    }

    #[test]
    fn test_parse_url_errors() {
        assert_eq!(
            HttpUrl::parse("ftp://erp.local/api"),
            Err(UrlError::UnsupportedScheme)
        );
        assert_eq!(HttpUrl::parse("http:///api"), Err(UrlError::MissingHost));
        assert_eq!(
            HttpUrl::parse("http://erp.local:99999/"),
            Err(UrlError::InvalidPort)
        );
    }

    #[test]
    fn test_post_request_head() {
        let url = HttpUrl::parse("http://erp.local:3000/api/fingerprint/match").unwrap();
        let mut out = Vec::new();
        write_post_request(&mut out, &url, br#"{"template":"AAAA"}"#);

        let text = core::str::from_utf8(&out).unwrap();
        assert!(text.starts_with("POST /api/fingerprint/match HTTP/1.1\r\n"));
        assert!(text.contains("Host: erp.local:3000\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Content-Length: 19\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"template\":\"AAAA\"}"));
    }

    #[test]
    fn test_host_header_omits_default_port() {
        let url = HttpUrl::parse("http://erp.local/api").unwrap();
        let mut out = Vec::new();
        write_post_request(&mut out, &url, b"{}");

        let text = core::str::from_utf8(&out).unwrap();
        assert!(text.contains("Host: erp.local\r\n"));
    }

    #[test]
    fn test_parse_response_with_content_length() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\ncontent-length: 13\r\n\r\n{\"ok\":false}\ntrailing";
        let response = parse_response(raw).unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body_text(), "{\"ok\":false}\n");
        assert!(!response.is_success());
    }

    #[test]
    fn test_parse_response_until_close() {
        let raw = b"HTTP/1.0 201 Created\r\n\r\nsaved";
        let response = parse_response(raw).unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.body, b"saved");
        assert!(response.is_success());
    }

    #[test]
    fn test_parse_response_errors() {
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\n"),
            Err(ResponseError::Incomplete)
        );
        assert_eq!(
            parse_response(b"garbage\r\n\r\n"),
            Err(ResponseError::MalformedStatusLine)
        );
    }
}
