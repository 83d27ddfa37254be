use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug, Default)]
#[command(name = "soundboard", version = VERSION)]
pub struct Args {
    /// Optional config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Control API bind address, e.g. 127.0.0.1:8090
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Bridge HTTP address, e.g. 192.168.1.20:5556
    #[arg(long)]
    pub bridge: Option<SocketAddr>,

    /// Output channel (bridge device name) to connect to
    #[arg(long)]
    pub channel: Option<String>,

    /// Bearer token for the bridge API
    #[arg(long)]
    pub token: Option<String>,

    /// Quick sound mapping file (`label:path` lines)
    #[arg(long)]
    pub quick_sounds: Option<PathBuf>,

    /// Connect to the channel at startup
    #[arg(long)]
    pub connect: bool,
}
