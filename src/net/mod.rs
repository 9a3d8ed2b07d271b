use anyhow::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::net::lookup_host;

pub mod tcp;

/// Resolves a hostname to an address to dial. Pluggable so tests (and
/// future callers wanting a different strategy, e.g. a hosts-file override)
/// don't have to go through the OS resolver.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr>;
}

/// Resolves via tokio's builtin asynchronous DNS resolution.
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr> {
        // lookup_host requires a host:port pair; the port is irrelevant here.
        let mut addrs = lookup_host((hostname, 0)).await?;
        let addr = addrs.next().ok_or_else(|| anyhow::anyhow!("no addresses found for '{}'", hostname))?;
        Ok(addr.ip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn resolves_localhost() {
        let resolver = DnsResolver;
        assert_ok!(resolver.resolve("localhost").await);
    }

    #[tokio::test]
    async fn fails_on_unresolvable_name() {
        let resolver = DnsResolver;
        assert!(resolver.resolve("this-name-should-not-resolve.invalid").await.is_err());
    }
}
