use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "nas-paneld", about = "Embedded MQTT broker and NAS telemetry daemon")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "/etc/nas-paneld/config.yaml")]
    pub config: PathBuf,

    /// Run the configured probes once, print the resulting document, and exit.
    #[arg(long)]
    pub test: bool,

    /// Raise the log level to debug.
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a default configuration document to this path and exit.
    #[arg(long)]
    pub generate_config: Option<PathBuf>,
}
