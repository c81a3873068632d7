// # IP Source Trait
//
// Supplies the host's current public IPv4 address to each poll cycle.
// Detection itself is outside the core; the scheduler just asks for the
// current value before every update request.
//
// ## Implementations
//
// - Fixed address: [`StaticIpSource`]
// - HTTP echo service: `noip-ip-http` crate

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP source implementations
///
/// Implementations must be thread-safe and return promptly; they are called
/// from inside a poll cycle while the poll lock is held.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current address
    /// - `Err(Error)`: If the address cannot be determined
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;
}

/// An IP source that always reports the same address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpSource {
    ip: Ipv4Addr,
}

impl StaticIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self { ip }
    }
}

#[async_trait]
impl IpSource for StaticIpSource {
    async fn current(&self) -> Result<Ipv4Addr, crate::Error> {
        Ok(self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_configured_address() {
        let source = StaticIpSource::new(Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(source.current().await.unwrap(), Ipv4Addr::new(203, 0, 113, 5));
    }
}
