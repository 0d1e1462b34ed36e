//! HTTP uplink over the embassy-net TCP stack

use alloc::vec::Vec;
use core::net::Ipv4Addr;

use attend_core::http::{HttpResponse, HttpUrl, Scheme, UrlError, parse_response, write_post_request};
use attend_core::report::{Uplink, UplinkError};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack};
use embassy_time::Duration;
use log::{debug, error, info};

const SOCKET_BUFFER_LEN: usize = 2048;

/// Responses larger than this are cut off; only the status line matters.
const MAX_RESPONSE_LEN: usize = 4096;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// One short-lived plain-HTTP TCP connection per report.
pub struct TcpUplink {
    stack: Stack<'static>,
    rx_buffer: [u8; SOCKET_BUFFER_LEN],
    tx_buffer: [u8; SOCKET_BUFFER_LEN],
}

impl TcpUplink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            rx_buffer: [0; SOCKET_BUFFER_LEN],
            tx_buffer: [0; SOCKET_BUFFER_LEN],
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, UplinkError> {
        if let Ok(address) = host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(address));
        }

        let dns_failed = || {
            let mut name = heapless::String::new();
            for ch in host.chars() {
                if name.push(ch).is_err() {
                    break;
                }
            }
            UplinkError::Dns { host: name }
        };
        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|_| dns_failed())?;
        addresses.first().copied().ok_or_else(dns_failed)
    }
}

impl Uplink for TcpUplink {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    async fn post_json(&mut self, url: &str, body: &[u8]) -> Result<HttpResponse, UplinkError> {
        let url = HttpUrl::parse(url).map_err(UplinkError::Url)?;
        if url.scheme == Scheme::Https {
            error!("{} needs TLS; this firmware only speaks plain HTTP", url.host);
            return Err(UplinkError::Url(UrlError::TlsUnavailable));
        }
        let address = self.resolve(url.host).await?;

        let mut request = Vec::with_capacity(256 + body.len());
        write_post_request(&mut request, &url, body);

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        debug!("Connecting to {}:{}", url.host, url.port);
        socket
            .connect((address, url.port))
            .await
            .map_err(|_| UplinkError::Transport {
                operation: "connect",
            })?;

        embedded_io_async::Write::write_all(&mut socket, &request)
            .await
            .map_err(|_| UplinkError::Transport { operation: "send" })?;

        let mut raw = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            match socket.read(&mut chunk).await {
                Ok(0) => break,
                Ok(read) => {
                    let room = MAX_RESPONSE_LEN.saturating_sub(raw.len());
                    raw.extend_from_slice(&chunk[..read.min(room)]);
                }
                Err(_) => {
                    socket.abort();
                    return Err(UplinkError::Transport { operation: "read" });
                }
            }
        }
        socket.close();
        info!("Received {} response bytes", raw.len());

        parse_response(&raw).map_err(UplinkError::Response)
    }
}
