///
/// SOCKS5 protocol implementation details
///
/// RFC 1928
/// https://datatracker.ietf.org/doc/html/rfc1928#ref-1
///
use crate::error::{InvalidValue, LurkError};
use anyhow::{bail, ensure, Result};
use bytes::BufMut;
use std::{
    fmt::Display,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};
use tokio::io::AsyncReadExt;

pub mod request;
pub mod response;

#[rustfmt::skip]
pub mod consts {
    pub const SOCKS5_VERSION: u8 = 0x05;

    pub mod auth {
        pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
        pub const SOCKS5_AUTH_METHOD_GSSAPI: u8 = 0x01;
        pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
        pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xff;
    }

    pub mod command {
        pub const SOCKS5_CMD_CONNECT: u8 = 0x01;
        pub const SOCKS5_CMD_BIND: u8 = 0x02;
        pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;
    }

    pub mod address {
        pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
        pub const SOCKS5_ADDR_TYPE_DOMAIN_NAME: u8 = 0x03;
        pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;
    }

    pub mod reply {
        pub const SOCKS5_REPLY_SUCCEEDED: u8 = 0x00;
        pub const SOCKS5_REPLY_GENERAL_FAILURE: u8 = 0x01;
        pub const SOCKS5_REPLY_CONNECTION_NOT_ALLOWED: u8 = 0x02;
        pub const SOCKS5_REPLY_NETWORK_UNREACHABLE: u8 = 0x03;
        pub const SOCKS5_REPLY_HOST_UNREACHABLE: u8 = 0x04;
        pub const SOCKS5_REPLY_CONNECTION_REFUSED: u8 = 0x05;
        pub const SOCKS5_REPLY_TTL_EXPIRED: u8 = 0x06;
        pub const SOCKS5_REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
        pub const SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;
    }
}

#[repr(u8)]
#[rustfmt::skip]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
}

impl TryFrom<u8> for Command {
    type Error = LurkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use consts::command::*;
        match value {
            SOCKS5_CMD_CONNECT => Ok(Command::Connect),
            SOCKS5_CMD_BIND => Ok(Command::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Ok(Command::UdpAssociate),
            _ => Err(LurkError::DataError(InvalidValue::SocksCommand(value))),
        }
    }
}

/// A SOCKS5 address record: IPv4, IPv6 or a length-prefixed FQDN.
///
/// Unlike a plain `SocketAddr`, this type can carry a domain name that has
/// not yet been resolved to an IP. `resolve` performs that translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    SocketAddress(SocketAddr),
    DomainName(String, u16),
}

impl Address {
    pub fn port(&self) -> u16 {
        match self {
            Address::SocketAddress(sock) => sock.port(),
            Address::DomainName(_, port) => *port,
        }
    }

    pub async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Address> {
        use consts::address::*;
        let address_type = stream.read_u8().await?;

        match address_type {
            SOCKS5_ADDR_TYPE_IPV4 => Address::read_ipv4(stream).await,
            SOCKS5_ADDR_TYPE_IPV6 => Address::read_ipv6(stream).await,
            SOCKS5_ADDR_TYPE_DOMAIN_NAME => Address::read_domain_name(stream).await,
            _ => bail!(LurkError::DataError(InvalidValue::AddressType(address_type))),
        }
    }

    async fn read_ipv4<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Address> {
        let ipv4 = Ipv4Addr::from(stream.read_u32().await?);
        let port = stream.read_u16().await?;
        Ok(Address::SocketAddress(SocketAddr::V4(SocketAddrV4::new(ipv4, port))))
    }

    async fn read_ipv6<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Address> {
        let ipv6 = Ipv6Addr::from(stream.read_u128().await?);
        let port = stream.read_u16().await?;
        Ok(Address::SocketAddress(SocketAddr::V6(SocketAddrV6::new(ipv6, port, 0, 0))))
    }

    async fn read_domain_name<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Address> {
        let len = stream.read_u8().await?;
        let mut buf = vec![0u8; len as usize];
        stream.read_exact(&mut buf).await?;

        let name = String::from_utf8(buf).map_err(LurkError::DomainNameDecodingFailed)?;
        let port = stream.read_u16().await?;

        Ok(Address::DomainName(name, port))
    }

    /// Writes this address using the wire priority: FQDN, then IPv4, then IPv6,
    /// falling back to `0.0.0.0:0` for a null address.
    pub fn write_to<T: BufMut>(&self, buf: &mut T) -> Result<()> {
        match self {
            Address::DomainName(name, port) => Address::write_domain_name(buf, name, *port),
            Address::SocketAddress(SocketAddr::V4(ipv4_addr)) => {
                buf.put_u8(consts::address::SOCKS5_ADDR_TYPE_IPV4);
                Address::write_ipv4(buf, ipv4_addr);
                Ok(())
            }
            Address::SocketAddress(SocketAddr::V6(ipv6_addr)) => {
                buf.put_u8(consts::address::SOCKS5_ADDR_TYPE_IPV6);
                Address::write_ipv6(buf, ipv6_addr);
                Ok(())
            }
        }
    }

    /// The null address used as `BND.ADDR` when no real bound address applies.
    pub fn unspecified() -> Address {
        Address::SocketAddress(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
    }

    fn write_ipv4<T: BufMut>(bytes: &mut T, ipv4_addr: &SocketAddrV4) {
        bytes.put_slice(&ipv4_addr.ip().octets());
        bytes.put_u16(ipv4_addr.port());
    }

    fn write_ipv6<T: BufMut>(bytes: &mut T, ipv6_addr: &SocketAddrV6) {
        bytes.put_slice(&ipv6_addr.ip().octets());
        bytes.put_u16(ipv6_addr.port());
    }

    fn write_domain_name<T: BufMut>(bytes: &mut T, name: &str, port: u16) -> Result<()> {
        ensure!(name.len() <= u8::MAX as usize, "domain name '{}' is too long to encode", name);
        bytes.put_u8(consts::address::SOCKS5_ADDR_TYPE_DOMAIN_NAME);
        bytes.put_u8(name.len() as u8);
        bytes.put_slice(name.as_bytes());
        bytes.put_u16(port);
        Ok(())
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::SocketAddress(sock) => write!(f, "{sock:}"),
            Address::DomainName(name, port) => write!(f, "{name:}:{port:}"),
        }
    }
}

/// `REP` field of a relay reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyStatus {
    Succeeded,
    GeneralFailure,
    ConnectionNotAllowed,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    CommandNotSupported,
    AddressTypeNotSupported,
}

impl ReplyStatus {
    #[rustfmt::skip]
    pub fn as_u8(self) -> u8 {
        match self {
            ReplyStatus::Succeeded               => consts::reply::SOCKS5_REPLY_SUCCEEDED,
            ReplyStatus::GeneralFailure          => consts::reply::SOCKS5_REPLY_GENERAL_FAILURE,
            ReplyStatus::ConnectionNotAllowed    => consts::reply::SOCKS5_REPLY_CONNECTION_NOT_ALLOWED,
            ReplyStatus::NetworkUnreachable      => consts::reply::SOCKS5_REPLY_NETWORK_UNREACHABLE,
            ReplyStatus::HostUnreachable         => consts::reply::SOCKS5_REPLY_HOST_UNREACHABLE,
            ReplyStatus::ConnectionRefused       => consts::reply::SOCKS5_REPLY_CONNECTION_REFUSED,
            ReplyStatus::CommandNotSupported     => consts::reply::SOCKS5_REPLY_COMMAND_NOT_SUPPORTED,
            ReplyStatus::AddressTypeNotSupported => consts::reply::SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
        }
    }

    /// Classifies a failed `connect(2)` against the destination by matching
    /// on its error text, the same brittle rule `liamylian/lsocks` uses.
    /// Kept intentionally, see the REDESIGN FLAGS design note.
    pub fn from_dial_error(err: &std::io::Error) -> ReplyStatus {
        let message = err.to_string().to_lowercase();
        if message.contains("refused") {
            ReplyStatus::ConnectionRefused
        } else if message.contains("network is unreachable") {
            ReplyStatus::NetworkUnreachable
        } else {
            ReplyStatus::HostUnreachable
        }
    }
}

#[cfg(test)]
mod test;
