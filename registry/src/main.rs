mod args;

use clap::Parser;
use vtscan_core::conf::Conf;
use vtscan_registry::Registry;

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let args = args::Args::parse();
    let conf = Conf::new(&args.config).expect("failed to load config");
    vtscan_core::utils::trace::setup("vtscan-registry", conf.log_level);
    let registry = Registry::new(conf).await.expect("registry failed to initialize");
    registry.run().await;
}
