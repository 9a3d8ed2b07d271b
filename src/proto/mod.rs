//! Wire-level message traits shared by every SOCKS5 request/response type.

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub mod socks5;

pub trait LurkRequest {
    async fn read_from<T: AsyncReadExt + Unpin + Send>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized;
}

pub trait LurkResponse {
    async fn write_to<T: AsyncWriteExt + Unpin + Send>(&self, stream: &mut T) -> Result<()>;
}