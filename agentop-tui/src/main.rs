//! agentop - Live AI Agent Process Monitor
//!
//! Terminal UI for watching local agent processes: status, token usage, and
//! cost, derived live from their append-only log files.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use agentop_core::{Config, Monitor, MonitorOptions};
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;

#[derive(Parser, Debug)]
#[command(name = "agentop", about = "Live monitor for local AI agent processes", version)]
struct Args {
    /// Agent home directory (containing projects/ and todos/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Seconds between timed full re-scans
    #[arg(long)]
    interval: Option<u64>,

    /// Disable filesystem-event watching (poll only)
    #[arg(long)]
    no_watch: bool,

    /// Never fetch the remote price sheet
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        agentop_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("agentop TUI starting up");

    let log_dir = args.log_dir.unwrap_or_else(|| config.log_dir());
    let options = MonitorOptions {
        refresh_interval: Duration::from_secs(
            args.interval.unwrap_or(config.monitor.refresh_secs).max(1),
        ),
        watch_enabled: config.monitor.watch && !args.no_watch,
        offline: config.pricing.offline || args.offline,
        pricing_cache: config.pricing.cache_path.clone(),
    };

    tracing::info!(dir = %log_dir.display(), "Starting monitor");
    let monitor = Monitor::start(&log_dir, options).context("failed to start monitor")?;

    let mut app = App::new();
    app.update(monitor.snapshot());

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, &monitor);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    monitor.stop();
    tracing::info!("agentop TUI shutting down");

    result
}

/// Run the main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    monitor: &Monitor,
) -> Result<()> {
    loop {
        // Pick up the latest snapshot; cheap Arc clone, compare for redraws.
        app.update(monitor.snapshot());

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
                if app.refresh_requested {
                    app.refresh_requested = false;
                    monitor.refresh_now();
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}
