// # HTTP IP Source
//
// This crate provides an HTTP-based public IPv4 source for the update client.
//
// ## Architecture
//
// Fetches the current address from a plain-text echo service (e.g.
// icanhazip.com) once per poll cycle. The last good answer is cached and
// returned when the service is briefly unreachable, so one flaky lookup does
// not fail the whole cycle.

use noip_core::traits::IpSource;
use noip_core::{Error, Result};

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::sync::Mutex;

/// Echo service used when none is configured
pub const DEFAULT_IP_SERVICE: &str = "https://ipv4.icanhazip.com";

/// HTTP timeout for lookups
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IPv4 source
#[derive(Debug)]
pub struct HttpIpSource {
    /// URL to fetch the address from
    url: String,

    /// Last address successfully fetched
    last_known: Mutex<Option<Ipv4Addr>>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: URL returning the caller's IPv4 address as plain text
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| Error::ip_source(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            last_known: Mutex::new(None),
            client,
        })
    }

    /// Fetch the current address from the echo service
    async fn fetch_ip(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {e}")))?;
        let ip_text = ip_text.trim();

        ip_text
            .parse::<Ipv4Addr>()
            .map_err(|_| Error::ip_source(format!("Expected IPv4 address, got: {ip_text}")))
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        match self.fetch_ip().await {
            Ok(ip) => {
                let mut last_known = self.last_known.lock().await;
                if *last_known != Some(ip) {
                    tracing::info!("Public IP changed: {:?} -> {}", *last_known, ip);
                    *last_known = Some(ip);
                }
                Ok(ip)
            }
            Err(e) => match *self.last_known.lock().await {
                Some(ip) => {
                    tracing::warn!("IP lookup failed, using last known {}: {}", ip, e);
                    Ok(ip)
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_trimmed_ipv4() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5\n"))
            .mount(&server)
            .await;

        let source = HttpIpSource::new(server.uri()).unwrap();
        assert_eq!(source.current().await.unwrap(), Ipv4Addr::new(203, 0, 113, 5));
    }

    #[tokio::test]
    async fn rejects_ipv6_answer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2001:db8::1"))
            .mount(&server)
            .await;

        let source = HttpIpSource::new(server.uri()).unwrap();
        assert!(matches!(source.current().await, Err(Error::IpSource(_))));
    }

    #[tokio::test]
    async fn falls_back_to_last_known_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpIpSource::new(server.uri()).unwrap();
        assert_eq!(source.current().await.unwrap(), Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(source.current().await.unwrap(), Ipv4Addr::new(203, 0, 113, 5));
    }

    #[tokio::test]
    async fn error_without_previous_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpIpSource::new(server.uri()).unwrap();
        assert!(source.current().await.is_err());
    }
}
