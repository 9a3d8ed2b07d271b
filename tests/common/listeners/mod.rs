use anyhow::Result;
use log::debug;
use lurk::{
    auth::{AuthenticatorSet, CredentialStore},
    server::{LurkServer, SocksHandlerDeps},
};
use std::{future::Future, net::SocketAddr};
use tokio::task::{yield_now, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

pub mod tcp_echo_server;

#[allow(unused_macros)]
macro_rules! cancel_listener {
    ($l:expr) => {
        $l.cancel().await.expect("Failed to cancel async task");
    };
}

#[allow(unused_imports)]
pub(crate) use cancel_listener;

pub trait AsyncListener {
    fn name(&self) -> &'static str;

    fn listen(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn run(self) -> impl Future<Output = AsyncListenerTask> + Send
    where
        Self: Send + Sized + 'static,
    {
        AsyncListenerTask::spawn(self)
    }
}

pub struct AsyncListenerTask {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl AsyncListenerTask {
    /// Spawn listener through tokio::spawn with graceful cancellation ability.
    async fn spawn<T>(mut listener: T) -> AsyncListenerTask
    where
        T: AsyncListener + Send + 'static,
    {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let failure_msg = format!("[AsyncListenerTask] Failure occured while running {} listener", listener.name());

        let handle = tokio::spawn(async move {
            tokio::select! {
                res = listener.listen() => res.expect(&failure_msg),
                _ = token_clone.cancelled() => {
                    debug!(
                        "[AsyncListenerTask] {} listener has been cancelled. Shutting down the task ...",
                        listener.name()
                    );
                }
            }
        });

        yield_now().await;

        AsyncListenerTask { handle, token }
    }

    /// Cancel task and wait for it's termination.
    pub async fn cancel(self) -> Result<(), JoinError> {
        self.token.cancel();
        self.handle.await
    }
}

/*
 * Lurk server listener
 */

pub struct LurkServerListener {
    server: LurkServer,
}

impl LurkServerListener {
    /// No-auth, no traffic reporting - a plain relay for protocol-level tests.
    pub fn new(addr: SocketAddr) -> LurkServerListener {
        let deps = SocksHandlerDeps::new(AuthenticatorSet::from_credentials(CredentialStore::default()), None);
        LurkServerListener::with_deps(addr, deps)
    }

    pub fn with_deps(addr: SocketAddr, deps: SocksHandlerDeps) -> LurkServerListener {
        LurkServerListener {
            server: LurkServer::new(addr, deps),
        }
    }
}

impl AsyncListener for LurkServerListener {
    fn listen(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.server.run()
    }

    fn name(&self) -> &'static str {
        "Lurk server"
    }
}
