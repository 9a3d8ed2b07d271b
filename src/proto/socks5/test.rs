use super::*;
use crate::proto::{socks5::request::HandshakeRequest, LurkRequest, LurkResponse};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;

#[tokio::test]
async fn read_address_from_stream() {
    let domain_name = "www.example.com".to_string();
    let mut mock = tokio_test::io::Builder::new()
        .read(&[0x01, 127, 0, 0, 1, 10, 10]) // ipv4
        .read(&[
            0x04, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xc0, 0x0a, 0x02, 0xff, 0xca, 0x1, 0x0, 0x11, 0xff, 10, 10,
        ]) // ipv6
        .read([&[0x03, domain_name.len() as u8], domain_name.as_bytes(), &[10, 10]].concat().as_slice())
        .build();

    assert_eq!(
        Address::SocketAddress(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 2570))),
        Address::read_from(&mut mock).await.unwrap()
    );

    assert_eq!(
        Address::SocketAddress(SocketAddr::V6(SocketAddrV6::new(
            Ipv6Addr::new(0, 0, 0xff, 0xffc0, 0xa02, 0xffca, 0x100, 0x11ff),
            2570,
            0,
            0
        ))),
        Address::read_from(&mut mock).await.unwrap()
    );

    assert_eq!(Address::DomainName(domain_name, 2570), Address::read_from(&mut mock).await.unwrap());
}

#[test]
fn write_domain_name_address() {
    let addr = Address::DomainName("example.test".to_string(), 8080);
    let mut buf = bytes::BytesMut::new();
    addr.write_to(&mut buf).expect("should encode");

    assert_eq!(buf[0], consts::address::SOCKS5_ADDR_TYPE_DOMAIN_NAME);
    assert_eq!(buf[1], "example.test".len() as u8);
    assert_eq!(&buf[2..2 + 12], b"example.test");
    assert_eq!(&buf[buf.len() - 2..], &8080u16.to_be_bytes());
}

#[test]
fn write_null_address_falls_back_to_ipv4() {
    let addr = Address::unspecified();
    let mut buf = bytes::BytesMut::new();
    addr.write_to(&mut buf).expect("should encode");

    assert_eq!(buf.as_ref(), &[consts::address::SOCKS5_ADDR_TYPE_IPV4, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn handshake_request_preserves_client_method_order() {
    let mut mock = tokio_test::io::Builder::new().read(&[0x05, 0x03, 0x01, 0x02, 0x00]).build();

    let request = HandshakeRequest::read_from(&mut mock).await.unwrap();
    assert_eq!(&[0x01, 0x02, 0x00], request.methods());
}

#[test]
fn dial_error_classification_matches_known_substrings() {
    use std::io::{Error, ErrorKind};

    let refused = Error::new(ErrorKind::ConnectionRefused, "connection refused");
    assert_eq!(ReplyStatus::ConnectionRefused, ReplyStatus::from_dial_error(&refused));

    let unreachable_net = Error::new(ErrorKind::Other, "network is unreachable");
    assert_eq!(ReplyStatus::NetworkUnreachable, ReplyStatus::from_dial_error(&unreachable_net));

    let other = Error::new(ErrorKind::Other, "something else entirely");
    assert_eq!(ReplyStatus::HostUnreachable, ReplyStatus::from_dial_error(&other));
}
