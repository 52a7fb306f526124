// Duel Linux: UDP link, config, and a Nim demo driving the session state machine.

mod config;
mod link;
mod nim;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use duel_core::Session;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::link::{LinkSettings, UdpLink};
use crate::nim::Nim;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error, PartialEq)]
enum ArgsError {
    #[error("choose a side with --player-one or --player-two")]
    NoRole,
    #[error("unknown argument {0}")]
    Unknown(String),
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    version: bool,
    player_one: Option<bool>,
    seek: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, ArgsError> {
    let mut out = Args::default();
    for arg in args {
        match arg.as_str() {
            "--version" | "-V" => out.version = true,
            "--player-one" => out.player_one = Some(true),
            "--player-two" => out.player_one = Some(false),
            "--seek" => out.seek = true,
            _ => return Err(ArgsError::Unknown(arg)),
        }
    }
    if !out.version && out.player_one.is_none() {
        return Err(ArgsError::NoRole);
    }
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!("duel-linux {}", VERSION);
        return Ok(());
    }
    let is_player_one = args.player_one.unwrap_or(true);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::load();
    info!(player_one = %cfg.player_one, player_two = %cfg.player_two, pile = cfg.pile, "config loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let link = UdpLink::new(rt.handle().clone(), LinkSettings::from(&cfg));
    let mut session = Session::with_config(Nim::new(cfg.pile), link, is_player_one, cfg.session.clone());
    let running = Arc::new(AtomicBool::new(true));
    let keep_going = running.clone();

    let result = rt.block_on(async move {
        let play = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            session.start().context("session start")?;
            if args.seek {
                session.seek();
            }
            while keep_going.load(Ordering::Relaxed) {
                session.step();
            }
            let game = session.game();
            info!(wins = game.wins(), losses = game.losses(), "session closed");
            Ok(())
        });
        tokio::select! {
            r = play => r?,
            r = shutdown_signal() => {
                running.store(false, Ordering::Relaxed);
                info!("shutting down");
                r
            }
        }
    });
    // The session thread may be parked in an indefinite wait; don't join it.
    rt.shutdown_background();
    result
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
