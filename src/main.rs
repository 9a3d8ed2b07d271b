use anyhow::Result;
use clap::Parser;
use lurk::{
    auth::{AuthenticatorSet, CredentialStore},
    config::WorkerConfig,
    logging,
    server::{LurkServer, SocksHandlerDeps},
    traffic::TrafficReporterService,
};
use log::info;

/// Default period length the worker's own traffic reporter aggregates over.
const REPORTER_INTERVAL_SECS: i64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::parse();
    logging::init(&config.log_file, &config.log_level)?;

    let credentials = CredentialStore::parse(&config.credentials);
    let authenticators = AuthenticatorSet::from_credentials(credentials);

    let reporter = TrafficReporterService::start(REPORTER_INTERVAL_SECS, config.traffics_file.clone());
    let deps = SocksHandlerDeps::new(authenticators, Some(reporter.handle()));

    let server = LurkServer::new(config.bind_addr(), deps);
    server.run().await?;

    info!("Shutting down traffic reporter");
    reporter.close().await;

    Ok(())
}
