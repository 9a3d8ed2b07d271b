use crate::{
    auth::AuthenticatorSet,
    logging,
    net::{tcp::LurkTcpListener, Resolver},
    server::{copier::Copier, rewrite::Rewriter, rules::RuleSet},
    traffic::TrafficReporterHandle,
};
use anyhow::Result;
use async_listen::is_transient_error;
use log::{error, info};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use stats::LurkServerStats;
use tokio::{net::TcpStream, signal, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

pub mod copier;
pub mod handler;
pub mod rewrite;
pub mod rules;
pub mod stats;
pub mod tunnel;

/// The collaborators a connection handler needs, wired once at startup and
/// shared across every accepted connection.
pub struct SocksHandlerDeps {
    pub authenticators: AuthenticatorSet,
    pub resolver: Box<dyn Resolver>,
    pub rewriter: Box<dyn Rewriter>,
    pub rules: Box<dyn RuleSet>,
    pub request_copier: Box<dyn Copier>,
    pub response_copier: Box<dyn Copier>,
    pub request_reporter: Option<TrafficReporterHandle>,
    pub response_reporter: Option<TrafficReporterHandle>,
}

impl SocksHandlerDeps {
    /// Builds the default dependency set: system DNS resolution, no
    /// rewriting, permit-all rules, plain `tokio::io::copy` both ways, and
    /// both relay halves reporting through the same traffic reporter handle.
    pub fn new(authenticators: AuthenticatorSet, traffic_reporter: Option<TrafficReporterHandle>) -> SocksHandlerDeps {
        SocksHandlerDeps {
            authenticators,
            resolver: Box::new(crate::net::DnsResolver),
            rewriter: Box::new(rewrite::IdentityRewriter),
            rules: Box::new(rules::PermitAll),
            request_copier: Box::new(copier::SimpleCopier),
            response_copier: Box::new(copier::SimpleCopier),
            request_reporter: traffic_reporter.clone(),
            response_reporter: traffic_reporter,
        }
    }
}

pub struct LurkServer {
    bind_addr: SocketAddr,
    deps: Arc<SocksHandlerDeps>,
    stats: Arc<LurkServerStats>,
    task_tracker: TaskTracker,
    task_cancellation_token: CancellationToken,
}

impl LurkServer {
    /// Delay after non-transient TCP acception failure, e.g.
    /// handle resource exhaustion errors.
    const DELAY_AFTER_ERROR_MILLIS: u64 = 500;

    pub fn new(bind_addr: SocketAddr, deps: SocksHandlerDeps) -> LurkServer {
        LurkServer {
            bind_addr,
            deps: Arc::new(deps),
            stats: Arc::new(LurkServerStats::new()),
            task_tracker: TaskTracker::new(),
            task_cancellation_token: CancellationToken::new(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let mut tcp_listener = LurkTcpListener::bind(self.bind_addr).await?;
        info!("Proxy is listening on {}", self.bind_addr);

        self.stats.on_server_started();

        loop {
            tokio::select! {
                accepted = tcp_listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => self.on_tcp_connection_established(stream, peer_addr).await,
                    Err(err) => self.on_tcp_acception_error(err).await,
                },
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C. Gracefully tearing down ...");
                    self.on_shutdown_requested();
                    break
                }
            }
        }

        self.stats.on_server_finished();
        self.task_tracker.wait().await;

        Ok(())
    }

    async fn on_tcp_acception_error(&self, err: anyhow::Error) {
        logging::log_tcp_acception_error!(err);

        if let Some(err) = err.downcast_ref::<std::io::Error>() {
            if !is_transient_error(err) {
                // Perform sleep after non-transient errors
                sleep(Duration::from_millis(LurkServer::DELAY_AFTER_ERROR_MILLIS)).await;
            }
        }
    }

    async fn on_tcp_connection_established(&self, stream: TcpStream, peer_addr: SocketAddr) {
        logging::log_tcp_established_conn!(peer_addr);

        let deps = Arc::clone(&self.deps);
        let token = self.task_cancellation_token.clone();

        self.task_tracker.spawn(async move {
            tokio::select! {
                res = handler::handle(stream, peer_addr, deps) => {
                    if let Err(err) = res {
                        logging::log_tcp_closed_conn_with_error!(peer_addr, err);
                    } else {
                        logging::log_tcp_closed_conn!(peer_addr);
                    }
                },
                _ = token.cancelled() => {
                    logging::log_tcp_canceled_conn!(peer_addr);
                }
            }
        });
    }

    pub fn get_stats(&self) -> Arc<LurkServerStats> {
        Arc::clone(&self.stats)
    }

    fn on_shutdown_requested(&self) {
        self.task_tracker.close();
        self.task_cancellation_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatorSet, CredentialStore};

    #[tokio::test]
    async fn new_binds_a_usable_listener_and_reports_not_yet_started() {
        let deps = SocksHandlerDeps::new(AuthenticatorSet::from_credentials(CredentialStore::default()), None);
        let server = LurkServer::new("127.0.0.1:0".parse().unwrap(), deps);

        assert!(!server.get_stats().is_server_started());
    }
}
