mod camera;
mod config;
mod cycle;
mod hardware;
mod network;
mod poll;
mod scheduler;
mod state;
mod supervisor;
mod upload;

use config::{Config, DEFAULT_CONFIG_PATH};
use hardware::Board;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FIELDCAM_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&path)?;

    info!("Field camera station {} starting", config.station.id);
    info!(
        "  schedule: every {}h at :{:02}",
        config.station.interval_hours, config.station.anchor_minute
    );
    info!("  upload: {}", config.upload.url);

    let (alarm_tx, mut alarm_rx) = scheduler::alarm_channel();
    let mut board = Board::open(&config, alarm_tx)?;

    // The cycle never finishes on its own; only the alarm can win this race
    let event = tokio::select! {
        biased;
        Some(event) = alarm_rx.recv() => event,
        never = cycle::run_until_reset(&mut board, &config) => match never {},
    };

    scheduler::on_alarm_interrupt(event, &mut *board.store, &mut *board.system)
}
