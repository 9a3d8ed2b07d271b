use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    io,
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
};

/// Copies bytes from one half of a relayed connection to the other. Kept
/// pluggable so a future caller could, for instance, rate-limit or inspect
/// the stream without touching the relay's half-close/reporting wiring.
#[async_trait]
pub trait Copier: Send + Sync {
    async fn copy(&self, dst: &mut OwnedWriteHalf, src: &mut OwnedReadHalf) -> Result<u64>;
}

/// Plain `tokio::io::copy`, the default used by both relay directions.
pub struct SimpleCopier;

#[async_trait]
impl Copier for SimpleCopier {
    async fn copy(&self, dst: &mut OwnedWriteHalf, src: &mut OwnedReadHalf) -> Result<u64> {
        io::copy(src, dst).await.map_err(anyhow::Error::from)
    }
}
