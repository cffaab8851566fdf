mod args;

use clap::Parser;
use vtscan_core::conf::Conf;
use vtscan_scheduler::{server, Scheduler};

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let args = args::Args::parse();
    let conf = Conf::new(&args.config).expect("failed to load config");
    vtscan_core::utils::trace::setup("vtscan-scheduler", conf.log_level);

    let scheduler = Scheduler::new(conf.clone())
        .await
        .expect("scheduler failed to initialize");
    let pool = scheduler.pool();
    let bind_addr = conf.scheduler.bind_addr.clone();

    tokio::spawn(async move {
        if let Err(err) = server::serve(pool, &bind_addr).await {
            tracing::error!(error = %err, "task-service HTTP server exited");
        }
    });

    scheduler.run().await;
}
