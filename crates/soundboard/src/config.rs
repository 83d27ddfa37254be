//! Configuration loading and parsing.
//!
//! File values are defaults; command-line flags win.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use soundboard_core::config::CoordinatorConfig;
use soundboard_core::volume::VolumeSettings;

use crate::cli::Args;

const DEFAULT_BIND: &str = "127.0.0.1:8090";
const DEFAULT_BRIDGE: &str = "127.0.0.1:5556";
const DEFAULT_QUICK_SOUNDS: &str = "quick_play_files.txt";
const DEFAULT_STATUS_POLL_MS: u64 = 250;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Control API bind address (host:port).
    pub bind: Option<String>,
    /// Quick sound mapping file.
    pub quick_sounds_path: Option<String>,
    pub bridge: Option<BridgeSection>,
    pub volume: Option<VolumeSection>,
    pub coordinator: Option<CoordinatorSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BridgeSection {
    /// Bridge HTTP address (host:port).
    pub http_addr: Option<String>,
    /// Device name used as the output channel.
    pub channel: Option<String>,
    /// Bearer token sent with every bridge request.
    pub token: Option<String>,
    /// Base URL the bridge fetches local files from (`{base}/stream?path=...`).
    pub media_base_url: Option<String>,
    /// Status poll interval in milliseconds.
    pub status_poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VolumeSection {
    pub primary: Option<f32>,
    pub interrupt: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoordinatorSection {
    /// How long to wait for the sink to confirm a stop.
    pub stop_wait_ms: Option<u64>,
}

/// Settings after merging file and flags.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bind: SocketAddr,
    pub bridge_addr: SocketAddr,
    pub channel: String,
    pub token: Option<String>,
    pub media_base_url: Option<String>,
    pub status_poll: Duration,
    pub quick_sounds_path: PathBuf,
    pub coordinator: CoordinatorConfig,
    pub connect_on_start: bool,
}

impl AppConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg =
            toml::from_str::<AppConfig>(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

fn parse_addr(raw: &str, what: &str) -> Result<SocketAddr> {
    raw.parse()
        .with_context(|| format!("parse {what} {raw}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Merge `cfg` with command-line overrides.
pub fn resolve(cfg: AppConfig, args: &Args) -> Result<ResolvedConfig> {
    let bridge = cfg.bridge.unwrap_or_default();
    let volume = cfg.volume.unwrap_or_default();
    let coordinator = cfg.coordinator.unwrap_or_default();

    let bind = match args.bind {
        Some(addr) => addr,
        None => parse_addr(cfg.bind.as_deref().unwrap_or(DEFAULT_BIND), "bind")?,
    };
    let bridge_addr = match args.bridge {
        Some(addr) => addr,
        None => parse_addr(
            bridge.http_addr.as_deref().unwrap_or(DEFAULT_BRIDGE),
            "bridge http_addr",
        )?,
    };
    let channel = non_empty(args.channel.clone())
        .or_else(|| non_empty(bridge.channel))
        .ok_or_else(|| anyhow::anyhow!("output channel is required; use --channel or [bridge] channel"))?;
    let token = non_empty(args.token.clone()).or_else(|| non_empty(bridge.token));
    let media_base_url = non_empty(bridge.media_base_url);
    let status_poll =
        Duration::from_millis(bridge.status_poll_ms.unwrap_or(DEFAULT_STATUS_POLL_MS).max(10));
    let quick_sounds_path = args
        .quick_sounds
        .clone()
        .or_else(|| cfg.quick_sounds_path.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_QUICK_SOUNDS));

    let defaults = VolumeSettings::default();
    let mut core = CoordinatorConfig {
        volume: VolumeSettings {
            primary: volume.primary.unwrap_or(defaults.primary),
            interrupt: volume.interrupt.unwrap_or(defaults.interrupt),
        },
        ..CoordinatorConfig::default()
    };
    if let Some(ms) = coordinator.stop_wait_ms {
        core = core.with_stop_wait(Duration::from_millis(ms));
    }

    Ok(ResolvedConfig {
        bind,
        bridge_addr,
        channel,
        token,
        media_base_url,
        status_poll,
        quick_sounds_path,
        coordinator: core,
        connect_on_start: args.connect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_channel(channel: &str) -> Args {
        Args {
            channel: Some(channel.to_string()),
            ..Args::default()
        }
    }

    #[test]
    fn resolve_applies_defaults() {
        let resolved = resolve(AppConfig::default(), &args_with_channel("Speakers")).unwrap();
        assert_eq!(resolved.bind, "127.0.0.1:8090".parse().unwrap());
        assert_eq!(resolved.bridge_addr, "127.0.0.1:5556".parse().unwrap());
        assert_eq!(resolved.channel, "Speakers");
        assert_eq!(resolved.status_poll, Duration::from_millis(250));
        assert_eq!(resolved.quick_sounds_path, PathBuf::from("quick_play_files.txt"));
        assert_eq!(resolved.coordinator.volume, VolumeSettings::default());
        assert!(resolved.token.is_none());
        assert!(!resolved.connect_on_start);
    }

    #[test]
    fn resolve_requires_channel() {
        let err = resolve(AppConfig::default(), &Args::default()).unwrap_err();
        assert!(err.to_string().contains("output channel is required"));
    }

    #[test]
    fn flags_override_file_values() {
        let cfg: AppConfig = toml::from_str(
            r#"
            bind = "0.0.0.0:9000"
            quick_sounds_path = "/srv/quick.txt"

            [bridge]
            http_addr = "10.0.0.2:5556"
            channel = "Living Room"
            token = "file-token"
            media_base_url = "http://10.0.0.1:8090"
            status_poll_ms = 500

            [volume]
            primary = 0.6

            [coordinator]
            stop_wait_ms = 750
            "#,
        )
        .unwrap();
        let args = Args {
            bridge: Some("10.0.0.3:5556".parse().unwrap()),
            token: Some("flag-token".to_string()),
            ..Args::default()
        };
        let resolved = resolve(cfg, &args).unwrap();
        assert_eq!(resolved.bind, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(resolved.bridge_addr, "10.0.0.3:5556".parse().unwrap());
        assert_eq!(resolved.channel, "Living Room");
        assert_eq!(resolved.token.as_deref(), Some("flag-token"));
        assert_eq!(resolved.media_base_url.as_deref(), Some("http://10.0.0.1:8090"));
        assert_eq!(resolved.status_poll, Duration::from_millis(500));
        assert_eq!(resolved.quick_sounds_path, PathBuf::from("/srv/quick.txt"));
        assert_eq!(resolved.coordinator.volume.primary, 0.6);
        assert_eq!(resolved.coordinator.volume.interrupt, 1.0);
        assert_eq!(
            resolved.coordinator.idle_wait.timeout,
            Duration::from_millis(750)
        );
    }

    #[test]
    fn resolve_rejects_bad_bind() {
        let cfg = AppConfig {
            bind: Some("not-an-addr".to_string()),
            ..AppConfig::default()
        };
        assert!(resolve(cfg, &args_with_channel("x")).is_err());
    }
}
