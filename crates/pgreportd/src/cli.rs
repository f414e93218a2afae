//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pgreportd")]
#[command(version, about = "Generate pgBadger reports from PostgreSQL server logs over HTTP")]
pub struct Cli {
    /// Config file (.yaml, .yml, .toml or .json); probes config/ when omitted
    #[arg(short, long, env = "PGREPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen port, overrides this_service_port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address, overrides bind_address
    #[arg(long)]
    pub bind: Option<String>,

    /// Allowed CORS origin (any origin when omitted)
    #[arg(long)]
    pub cors_origin: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
