use clap::Parser;

/// Command line args for the task scheduler (C5).
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct Args {
    /// The path to load the config file from
    #[clap(short, long, default_value = "vtscan.yml")]
    pub config: String,
}
