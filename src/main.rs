use anyhow::{Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod analysis;
mod app;
mod client;
mod config;
mod diet;
mod handler;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    init_tracing()?;
    info!(
        "starting nutrichat, backend at {}",
        config.resolve_api_url()
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(config);
    let result = run(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }

    Ok(())
}

/// Log to a file under the user's data directory; the terminal itself is
/// owned by the alternate screen.
fn init_tracing() -> Result<()> {
    let log_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("nutrichat");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("nutrichat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Arc::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}
