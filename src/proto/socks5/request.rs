use super::{consts, Address, Command};
use crate::{error::InvalidValue, proto::LurkRequest};
use anyhow::{ensure, Result};
use tokio::io::AsyncReadExt;

// The client connects to the server, and sends a
// version identifier/method selection message:
// +----+----------+----------+
// |VER | NMETHODS | METHODS  |
// +----+----------+----------+
// | 1  |    1     | 1 to 255 |
// +----+----------+----------+

/// The client's method-selection message.
///
/// Methods are kept in the order the client sent them: selection must pick
/// the first method both the client advertised and the server registered,
/// and "first" only means something if the order survives parsing.
#[derive(Debug)]
pub struct HandshakeRequest {
    methods: Vec<u8>,
}

impl HandshakeRequest {
    #[cfg(test)]
    pub fn new(methods: Vec<u8>) -> HandshakeRequest {
        HandshakeRequest { methods }
    }

    pub fn methods(&self) -> &[u8] {
        &self.methods
    }
}

impl LurkRequest for HandshakeRequest {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized,
    {
        let mut header: [u8; 2] = [0, 0];
        stream.read_exact(&mut header).await?;

        let (version, nmethods) = (header[0], header[1]);
        ensure!(version == consts::SOCKS5_VERSION, InvalidValue::ProtocolVersion(version));

        let mut methods = vec![0u8; nmethods as usize];
        stream.read_exact(&mut methods).await?;

        Ok(HandshakeRequest { methods })
    }
}

// The SOCKS request information is sent by the client as
// soon as it has established a connection to the SOCKS
// server, and completed the authentication negotiations.
// +----+-----+-------+------+----------+----------+
// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

#[derive(Debug)]
pub struct RelayRequest {
    command: Command,
    destination: Address,
}

impl RelayRequest {
    #[cfg(test)]
    pub fn new(command: Command, destination: Address) -> RelayRequest {
        RelayRequest { command, destination }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }
}

impl LurkRequest for RelayRequest {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<RelayRequest> {
        let mut buff: [u8; 3] = [0, 0, 0];
        stream.read_exact(&mut buff).await?;

        let (version, cmd, reserved) = (buff[0], buff[1], buff[2]);

        ensure!(version == consts::SOCKS5_VERSION, InvalidValue::ProtocolVersion(version));
        ensure!(reserved == 0x00, InvalidValue::ReservedValue(reserved));

        let command = Command::try_from(cmd)?;
        let destination = Address::read_from(stream).await?;

        Ok(RelayRequest { command, destination })
    }
}
