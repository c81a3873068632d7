// # Update Client Trait
//
// Defines the interface for the single No-IP `/nic/update` request.
//
// ## Implementations
//
// - No-IP over HTTPS: `noip-client` crate
//
// ## Usage
//
// ```rust,ignore
// use noip_core::UpdateClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* UpdateClient implementation */;
//
//     let response = client
//         .fetch_status(&identity, std::net::Ipv4Addr::new(203, 0, 113, 5))
//         .await?;
//     println!("{} {}", response.status, response.body);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::config::DeviceIdentity;

/// Raw outcome of one update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code, kept for diagnostic logging
    pub status: u16,
    /// Response body as text, untrimmed
    pub body: String,
}

impl RawResponse {
    /// Create a raw response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Trait for update client implementations
///
/// # Trust Level: Untrusted
///
/// Clients are single-shot: one HTTP request per call, no retries, no
/// background tasks, no state beyond the in-flight request. Scheduling,
/// suspension and interpretation of the body are owned by `PollScheduler`.
///
/// A non-2xx status is not an error on its own. No-IP reports credential and
/// hostname problems in the body, so the body is returned whenever it can be
/// read.
#[async_trait]
pub trait UpdateClient: Send + Sync {
    /// Report `ip` for the identity's hostname
    ///
    /// # Returns
    ///
    /// - `Ok(RawResponse)`: The status code and body of the response
    /// - `Err(Error::Transport)`: Request failure, timeout, or unreadable body
    async fn fetch_status(
        &self,
        identity: &DeviceIdentity,
        ip: Ipv4Addr,
    ) -> Result<RawResponse, crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
