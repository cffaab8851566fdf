mod args;

use clap::Parser;
use vtscan_autoscaler::Autoscaler;
use vtscan_core::conf::Conf;

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let args = args::Args::parse();
    let conf = Conf::new(&args.config).expect("failed to load config");
    vtscan_core::utils::trace::setup("vtscan-autoscaler", conf.log_level);
    let autoscaler = Autoscaler::new(conf).await.expect("autoscaler failed to initialize");
    autoscaler.run().await;
}
