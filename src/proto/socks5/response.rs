use super::{consts, Address, ReplyStatus};
use crate::proto::LurkResponse;
use anyhow::Result;
use bytes::{BufMut, BytesMut};
use tokio::io::AsyncWriteExt;

// The server selects from one of the methods given in METHODS, and
// sends a METHOD selection message:
// +----+--------+
// |VER | METHOD |
// +----+--------+
// | 1  |   1    |
// +----+--------+

#[derive(Debug, PartialEq)]
pub struct HandshakeResponse {
    method: u8,
}

impl HandshakeResponse {
    pub fn method(method: u8) -> HandshakeResponse {
        HandshakeResponse { method }
    }

    pub fn no_acceptable_method() -> HandshakeResponse {
        HandshakeResponse {
            method: consts::auth::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.method != consts::auth::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE
    }
}

impl LurkResponse for HandshakeResponse {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        stream.write_all(&[consts::SOCKS5_VERSION, self.method]).await?;
        Ok(())
    }
}

// The server evaluates the relay request, and returns a reply formed as follows:
// +----+-----+-------+------+----------+----------+
// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

#[derive(Debug)]
pub struct RelayResponse {
    bound_addr: Address,
    status: ReplyStatus,
}

impl RelayResponse {
    pub fn builder() -> RelayResponseBuilder {
        RelayResponseBuilder {
            bound_addr: None,
            status: None,
        }
    }

    pub fn status(&self) -> ReplyStatus {
        self.status
    }
}

impl LurkResponse for RelayResponse {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        let mut bytes = BytesMut::new();
        bytes.put_slice(&[consts::SOCKS5_VERSION, self.status.as_u8(), 0x00]);
        self.bound_addr.write_to(&mut bytes)?;
        stream.write_all(&bytes).await?;
        Ok(())
    }
}

pub struct RelayResponseBuilder {
    bound_addr: Option<Address>,
    status: Option<ReplyStatus>,
}

impl RelayResponseBuilder {
    pub fn with_status(&mut self, status: ReplyStatus) -> &mut RelayResponseBuilder {
        self.status = Some(status);
        self
    }

    pub fn with_bound_address(&mut self, bound_addr: Address) -> &mut RelayResponseBuilder {
        self.bound_addr = Some(bound_addr);
        self
    }

    pub fn build(&self) -> RelayResponse {
        RelayResponse {
            bound_addr: self.bound_addr.clone().unwrap_or_else(Address::unspecified),
            status: self.status.expect("reply status must be set before building"),
        }
    }
}
