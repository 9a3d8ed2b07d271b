use anyhow::Result;
use clap::Parser;
use lurk::{
    config::CollectorConfig,
    dashboard::{DashboardEndpoint, Statistician},
    logging,
};
use log::info;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config = CollectorConfig::parse();
    logging::init(&config.log_file, &config.log_level)?;

    let (statistician, store, statistician_ready) = Statistician::new(config.traffics_file.clone());
    let cancellation = CancellationToken::new();
    let statistician_task = tokio::spawn(statistician.run(cancellation.clone()));

    let endpoint = DashboardEndpoint::new(config.bind_addr(), store, statistician_ready, config.dashboard_dir.clone());

    tokio::select! {
        result = endpoint.run() => { result?; }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C. Gracefully tearing down ...");
        }
    }

    cancellation.cancel();
    statistician_task.await?;

    Ok(())
}
