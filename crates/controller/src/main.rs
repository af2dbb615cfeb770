mod board;
mod config;
mod console;
mod controller;
mod debounce;
mod dispatcher;
mod error;
mod history;
mod plot;
mod pump;
mod status;

use std::env;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use console::OperatorInput;
use dispatcher::Dispatcher;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "controller.toml".to_string());
    let cfg = config::load(&config_path)?;

    // ── Logging ─────────────────────────────────────────────────────
    // stdout carries the menu, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        path = %config_path,
        plots = cfg.plots.len(),
        policy = ?cfg.threshold_policy,
        "config loaded"
    );

    // ── Board ───────────────────────────────────────────────────────
    #[cfg(feature = "gpio")]
    let (board, button) = (board::gpio::GpioBoard::new(&cfg)?, None::<board::sim::SimButton>);

    #[cfg(not(feature = "gpio"))]
    let (board, button) = {
        let sim = board::sim::SimBoard::new(cfg.sensor.max);
        let button = sim.button();
        println!("Simulated board: type 'b' to press the manual button.");
        (sim, Some(button))
    };

    // ── Menu ────────────────────────────────────────────────────────
    let mut dispatcher = Dispatcher::new(&cfg, board);
    let mut input = OperatorInput::spawn_stdin();
    let mut stdout = std::io::stdout();

    console::run(
        &mut dispatcher,
        &mut input,
        &mut stdout,
        button.as_ref(),
        cfg.sensor.max,
    )
    .await?;

    info!("input closed, shutting down");
    Ok(())
}
