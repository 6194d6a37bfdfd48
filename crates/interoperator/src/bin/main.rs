use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use fluvio_future::task::run_block_on;
use fluvio_future::timer::sleep;

use interoperator::cli::InteroperatorOpt;
use interoperator::metadata::client::MemoryClient;
use interoperator::registry::LocalClientFactory;
use interoperator::start::{seed_manifests, start};

fn main() -> Result<()> {
    fluvio_future::subscriber::init_logger();
    let opt = InteroperatorOpt::parse();
    run_block_on(run(opt))
}

async fn run(opt: InteroperatorOpt) -> Result<()> {
    let client = MemoryClient::new_shared();
    if let Some(dir) = opt.seed_dir() {
        seed_manifests(&client, dir).await?;
    }

    let config = opt.as_start_config(&client).await?;
    let factory = Arc::new(LocalClientFactory::default());
    factory.add(config.own_cluster_id.clone(), client.clone()).await;

    let running = start(client, factory, config).await;
    info!(controllers = running.controller_count(), "running");

    loop {
        sleep(std::time::Duration::from_secs(3600)).await;
    }
}
