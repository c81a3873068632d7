// # No-IP Update Client
//
// This crate provides the No-IP implementation of `UpdateClient`.
//
// ## Behaviour
//
// - ✅ One HTTP GET per poll cycle
// - ✅ HTTP Basic authentication from the device credentials
// - ✅ `User-Agent: <client-name>/v<firmware>` as No-IP requires
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Non-2xx responses still return their body (No-IP reports `badauth`
//      and friends that way)
// - ❌ NO retry logic (a failed cycle waits for the next tick)
// - ❌ NO interpretation of the body (owned by `noip_core::response`)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - The password NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// - Update: GET `https://dynupdate.no-ip.com/nic/update?hostname=<host>&myip=<ip>`

use async_trait::async_trait;
use noip_core::traits::{RawResponse, UpdateClient};
use noip_core::{DeviceIdentity, Error, Result};
use std::net::Ipv4Addr;
use std::time::Duration;

/// No-IP update endpoint
const NOIP_UPDATE_URL: &str = "https://dynupdate.no-ip.com/nic/update";

/// Client name used in the User-Agent unless overridden
pub const DEFAULT_CLIENT_NAME: &str = "NoIP-Sensor";

/// Default HTTP timeout for update requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// No-IP update client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Scheduling and suspension are owned by
/// `PollScheduler`.
#[derive(Debug, Clone)]
pub struct NoIpClient {
    /// Endpoint to send updates to
    update_url: String,

    /// Client name for the User-Agent
    client_name: String,

    /// HTTP client for update requests
    client: reqwest::Client,
}

impl NoIpClient {
    /// Create a client for the public No-IP endpoint
    pub fn new() -> Result<Self> {
        Self::with_options(NOIP_UPDATE_URL, DEFAULT_CLIENT_NAME, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client for the public endpoint under a different client name
    pub fn with_client_name(client_name: impl Into<String>) -> Result<Self> {
        Self::with_options(NOIP_UPDATE_URL, client_name, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client with a custom endpoint, client name and timeout
    ///
    /// Used for tests and No-IP compatible endpoints.
    pub fn with_options(
        update_url: impl Into<String>,
        client_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            update_url: update_url.into(),
            client_name: client_name.into(),
            client,
        })
    }

    /// User-Agent header value for a firmware version
    fn user_agent(&self, firmware: &str) -> String {
        format!("{}/v{}", self.client_name, firmware)
    }
}

#[async_trait]
impl UpdateClient for NoIpClient {
    /// Send one update request
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /nic/update?hostname=home.ddns.net&myip=203.0.113.5
    /// Authorization: Basic <base64(username:password)>
    /// User-Agent: NoIP-Sensor/v3.0.0
    /// ```
    async fn fetch_status(&self, identity: &DeviceIdentity, ip: Ipv4Addr) -> Result<RawResponse> {
        tracing::debug!(hostname = %identity.hostname, %ip, "Sending No-IP update");

        let myip = ip.to_string();
        let response = self
            .client
            .get(&self.update_url)
            .query(&[
                ("hostname", identity.hostname.as_str()),
                ("myip", myip.as_str()),
            ])
            .basic_auth(&identity.username, Some(&identity.password))
            .header(reqwest::header::USER_AGENT, self.user_agent(&identity.firmware))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::transport(format!("Request timed out: {e}"))
                } else {
                    Error::transport(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response (status {status}): {e}")))?;

        Ok(RawResponse { status, body })
    }

    fn client_name(&self) -> &'static str {
        "noip"
    }
}
