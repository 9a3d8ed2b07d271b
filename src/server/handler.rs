use crate::{
    error::{InvalidValue, LurkError, Unsupported},
    logging,
    net::tcp::establish_tcp_connection,
    proto::{
        socks5::{
            request::{HandshakeRequest, RelayRequest},
            response::{HandshakeResponse, RelayResponse},
            Address, Command, ReplyStatus,
        },
        LurkRequest, LurkResponse,
    },
    server::{tunnel, SocksHandlerDeps},
    traffic::TrafficReporter,
};
use anyhow::{bail, Result};
use human_bytes::human_bytes;
use log::{error, info};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpStream;

/// Runs one accepted connection through the full SOCKS5 state machine:
/// negotiation, authentication, request parsing, resolution, rewriting,
/// rule evaluation, command dispatch and (for `CONNECT`) the relay.
pub async fn handle(mut stream: TcpStream, peer_addr: SocketAddr, deps: Arc<SocksHandlerDeps>) -> Result<()> {
    let local_addr = stream.local_addr()?;

    let handshake_request = HandshakeRequest::read_from(&mut stream).await?;
    let authenticator = match deps.authenticators.select(handshake_request.methods()) {
        Some(authenticator) => authenticator,
        None => {
            HandshakeResponse::no_acceptable_method().write_to(&mut stream).await?;
            bail!(LurkError::NoAcceptableAuthMethod(peer_addr));
        }
    };
    HandshakeResponse::method(authenticator.code()).write_to(&mut stream).await?;

    let auth_context = authenticator.authenticate(&mut stream).await?;

    let relay_request = match RelayRequest::read_from(&mut stream).await {
        Ok(request) => request,
        Err(err) => {
            if matches!(
                err.downcast_ref::<LurkError>(),
                Some(LurkError::DataError(InvalidValue::AddressType(_)))
            ) {
                let _ = reply(&mut stream, ReplyStatus::AddressTypeNotSupported, Address::unspecified()).await;
            }
            return Err(err);
        }
    };

    let command = relay_request.command();
    let destination = relay_request.destination().clone();

    let dial_addr = match resolve(&destination, deps.resolver.as_ref()).await {
        Ok(addr) => addr,
        Err(err) => {
            reply(&mut stream, ReplyStatus::HostUnreachable, Address::unspecified()).await?;
            return Err(err);
        }
    };

    let rewritten_addr = deps.rewriter.rewrite(dial_addr);

    if !deps.rules.allow(&auth_context, command, &destination.to_string()) {
        reply(&mut stream, ReplyStatus::ConnectionNotAllowed, Address::unspecified()).await?;
        bail!(LurkError::RuleDenied);
    }

    match command {
        Command::Connect => handle_connect(stream, peer_addr, local_addr, rewritten_addr, &auth_context, &deps).await,
        Command::Bind | Command::UdpAssociate => {
            reply(&mut stream, ReplyStatus::CommandNotSupported, Address::unspecified()).await?;
            bail!(LurkError::Unsupported(Unsupported::Socks5Command(command)));
        }
    }
}

async fn resolve(destination: &Address, resolver: &dyn crate::net::Resolver) -> Result<SocketAddr> {
    match destination {
        Address::SocketAddress(addr) => Ok(*addr),
        Address::DomainName(name, port) => {
            let ip = resolver
                .resolve(name)
                .await
                .map_err(|_| LurkError::UnresolvedDomainName(name.clone()))?;
            Ok(SocketAddr::new(ip, *port))
        }
    }
}

async fn reply(stream: &mut TcpStream, status: ReplyStatus, bound_addr: Address) -> Result<()> {
    RelayResponse::builder()
        .with_status(status)
        .with_bound_address(bound_addr)
        .build()
        .write_to(stream)
        .await
}

async fn handle_connect(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    target_addr: SocketAddr,
    auth_context: &crate::auth::AuthContext,
    deps: &SocksHandlerDeps,
) -> Result<()> {
    match establish_tcp_connection(target_addr).await {
        Ok(target) => {
            let bound_addr = target.local_addr()?;
            reply(&mut stream, ReplyStatus::Succeeded, Address::SocketAddress(bound_addr)).await?;

            logging::log_tunnel_created!(peer_addr, local_addr, target_addr);

            let request_reporter = deps.request_reporter.as_ref().map(|r| r as &dyn TrafficReporter);
            let response_reporter = deps.response_reporter.as_ref().map(|r| r as &dyn TrafficReporter);

            let (request_bytes, response_bytes) = tunnel::relay(
                stream,
                target,
                &auth_context.identity,
                deps.request_copier.as_ref(),
                deps.response_copier.as_ref(),
                request_reporter,
                response_reporter,
            )
            .await;

            logging::log_tunnel_closed!(
                peer_addr,
                local_addr,
                target_addr,
                auth_context.identity,
                request_bytes,
                response_bytes
            );

            Ok(())
        }
        Err(err) => {
            let status = err
                .downcast_ref::<std::io::Error>()
                .map(ReplyStatus::from_dial_error)
                .unwrap_or(ReplyStatus::HostUnreachable);

            let _ = reply(&mut stream, status, Address::unspecified()).await;
            logging::log_tunnel_closed_with_error!(peer_addr, local_addr, target_addr, err);

            Err(err)
        }
    }
}
