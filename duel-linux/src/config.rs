//! Load config from file and environment.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use duel_core::SessionConfig;

/// Daemon configuration. File: ~/.config/duel/config.toml or /etc/duel/config.toml.
/// Env overrides: DUEL_PLAYER_ONE, DUEL_PLAYER_TWO, DUEL_OFFER_TRIES, DUEL_OFFER_TIMEOUT_MS,
/// DUEL_PILE.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// UDP address of player one (link address 1).
    #[serde(default = "default_player_one")]
    pub player_one: SocketAddr,
    /// UDP address of player two (link address 2).
    #[serde(default = "default_player_two")]
    pub player_two: SocketAddr,
    /// Wait for a link-level ack before retransmitting (default 200).
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// Link-level retransmissions per send (default 3).
    #[serde(default = "default_retries")]
    pub retries: u8,
    /// Largest protocol packet carried (default 60, the radio limit the protocol was sized for).
    #[serde(default = "default_max_packet")]
    pub max_packet: usize,
    /// Nim starting pile (default 21).
    #[serde(default = "default_pile")]
    pub pile: u8,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_player_one() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 47001))
}
fn default_player_two() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 47002))
}
fn default_ack_timeout_ms() -> u64 {
    200
}
fn default_retries() -> u8 {
    3
}
fn default_max_packet() -> usize {
    60
}
fn default_pile() -> u8 {
    21
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player_one: default_player_one(),
            player_two: default_player_two(),
            ack_timeout_ms: default_ack_timeout_ms(),
            retries: default_retries(),
            max_packet: default_max_packet(),
            pile: default_pile(),
            session: SessionConfig::default(),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(a) = var("DUEL_PLAYER_ONE").and_then(|s| s.parse().ok()) {
        c.player_one = a;
    }
    if let Some(a) = var("DUEL_PLAYER_TWO").and_then(|s| s.parse().ok()) {
        c.player_two = a;
    }
    if let Some(n) = var("DUEL_OFFER_TRIES").and_then(|s| s.parse().ok()) {
        c.session.offer_tries = n;
    }
    if let Some(ms) = var("DUEL_OFFER_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
        c.session.offer_timeout_ms = ms;
    }
    if let Some(p) = var("DUEL_PILE").and_then(|s| s.parse().ok()) {
        c.pile = p;
    }
    if c.pile == 0 {
        tracing::warn!(default = default_pile(), "pile must not be empty, using default");
        c.pile = default_pile();
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/duel/config.toml"));
    }
    out.push(PathBuf::from("/etc/duel/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => tracing::warn!(path = %p.display(), error = %e, "ignoring invalid config"),
                },
                Err(e) => tracing::warn!(path = %p.display(), error = %e, "cannot read config"),
            }
            break;
        }
    }
    None
}
