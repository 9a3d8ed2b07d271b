use anyhow::Result;
use socket2::{Domain, SockRef, Socket, TcpKeepalive, Type};
use std::{net::SocketAddr, time::Duration};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

const TCP_LISTEN_BACKLOG: i32 = 1024;

/// Different TCP connection options.
///
/// **Fields**:
/// * ```keep_alive``` - setting for TCP keepalive procedure
pub struct TcpConnectionOptions {
    keep_alive: Option<TcpKeepalive>,
}

impl TcpConnectionOptions {
    pub fn new() -> TcpConnectionOptions {
        TcpConnectionOptions { keep_alive: None }
    }

    pub fn set_keepalive(&mut self, keep_alive: TcpKeepalive) -> &mut TcpConnectionOptions {
        debug_assert!(self.keep_alive.is_none(), "should be unset");
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn apply_to(&self, tcp_stream: &mut TcpStream) -> Result<()> {
        let tcp_sock_ref = SockRef::from(&tcp_stream);

        if let Some(keep_alive) = &self.keep_alive {
            tcp_sock_ref.set_tcp_keepalive(keep_alive)?;
        }

        Ok(())
    }
}

impl Default for TcpConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Establish TCP connection with passed ```endpoint```.
///
/// Input ```tcp_opts``` are applied to created TCP socket right after stream creation.
pub async fn establish_tcp_connection_with_opts(addr: impl ToSocketAddrs, tcp_opts: &TcpConnectionOptions) -> Result<TcpStream> {
    let mut tcp_stream = TcpStream::connect(addr).await.map_err(anyhow::Error::from)?;
    tcp_opts.apply_to(&mut tcp_stream)?;
    Ok(tcp_stream)
}

/// Establish TCP connection with passed ```endpoint``` with default options.
pub async fn establish_tcp_connection(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    let mut tcp_opts = TcpConnectionOptions::new();
    tcp_opts.set_keepalive(
        TcpKeepalive::new()
            .with_time(Duration::from_secs(150)) // 2.5 min
            .with_interval(Duration::from_secs(30)) // 30 sec
            .with_retries(5),
    );

    establish_tcp_connection_with_opts(addr, &tcp_opts).await
}

/// A `TcpListener` wrapper bound via `socket2` so an explicit backlog and
/// non-blocking mode can be set before handing the socket to tokio.
pub struct LurkTcpListener {
    inner: TcpListener,
}

impl LurkTcpListener {
    pub async fn bind(addr: SocketAddr) -> Result<LurkTcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;

        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(TCP_LISTEN_BACKLOG)?;
        socket.set_nonblocking(true)?;

        let inner = TcpListener::from_std(socket.into())?;

        Ok(LurkTcpListener { inner })
    }

    pub async fn accept(&mut self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer_addr) = self.inner.accept().await?;
        Ok((stream, peer_addr))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr().expect("listener doesn't have local address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BIND_IPV4: &str = "127.0.0.1:0";

    #[tokio::test]
    async fn binds_and_accepts_connections() {
        let mut listener = LurkTcpListener::bind(TEST_BIND_IPV4.parse().unwrap())
            .await
            .expect("expect binded listener");
        let addr = listener.local_addr();

        tokio::spawn(async move {
            TcpStream::connect(addr).await.expect("client should connect");
        });

        let (_, peer_addr) = listener.accept().await.expect("expect accepted connection");
        assert_eq!(peer_addr.ip(), addr.ip());
    }
}
