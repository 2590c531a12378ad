mod app;
mod browse;
mod components;
mod config;
mod error;
mod event;
mod handler;
mod keyspace;
mod logging;
mod theme;
mod tree;
mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};

use crate::app::App;
use crate::config::{AppConfig, GeneralConfig, LoggingConfig, ScanConfig, TreeConfig};
use crate::event::{Event, EventHandler};
use crate::keyspace::backend::KeyspaceBackend;
use crate::keyspace::memory::MemoryKeyspace;
use crate::logging::{init_logging, LogConfig};
use crate::tui::{install_panic_hook, Tui};

/// Browse a large keyspace incrementally: cursor scans, lazy metadata and a
/// namespace tree.
#[derive(Parser, Debug)]
#[command(name = "ks", version, about)]
struct Cli {
    /// JSON fixture with the keyspace to browse
    #[arg(long, value_name = "PATH")]
    keys_file: Option<PathBuf>,

    /// Size of the generated demo keyspace when no fixture is given
    #[arg(long, default_value_t = 5000)]
    demo_keys: usize,

    /// Simulated backend latency per request, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Path to a config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Namespace delimiter for the tree view
    #[arg(long)]
    delimiter: Option<String>,

    /// Keys requested per scan
    #[arg(long)]
    batch_size: Option<usize>,

    /// Initial glob filter
    #[arg(long)]
    filter: Option<String>,

    /// Disable mouse capture
    #[arg(long)]
    no_mouse: bool,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                mouse: self.no_mouse.then_some(false),
                ..Default::default()
            },
            scan: ScanConfig {
                batch_size: self.batch_size,
                ..Default::default()
            },
            tree: TreeConfig {
                delimiter: self.delimiter.clone(),
                ..Default::default()
            },
            logging: LoggingConfig {
                file: self.log_file.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn backend(&self) -> error::Result<MemoryKeyspace> {
        let keyspace = match &self.keys_file {
            Some(path) => MemoryKeyspace::from_fixture_file(path)?,
            None => MemoryKeyspace::demo(self.demo_keys),
        };
        Ok(keyspace.with_latency(Duration::from_millis(self.latency_ms)))
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));

    match init_logging(LogConfig {
        level: config.log_level(),
        verbose: cli.verbose,
        file: config.log_file(),
    }) {
        Ok(path) => info!(path = %path.display(), "logging started"),
        Err(e) => eprintln!("Warning: logging disabled: {}", e),
    }

    let keyspace = cli.backend()?;
    info!(keys = keyspace.len(), "keyspace ready");
    let backend: Arc<dyn KeyspaceBackend> = Arc::new(keyspace);

    install_panic_hook();

    let mouse = config.mouse_enabled();
    let mut tui = Tui::new(mouse)?;
    let mut events = EventHandler::new(config.tick_rate());
    let mut app = App::new(backend, &config, events.sender());

    app.mount();
    if let Some(filter) = cli.filter.as_deref() {
        app.set_filter(filter);
    }

    loop {
        tui.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key),
            Event::Mouse(mouse_event) if mouse => handler::handle_mouse_event(&mut app, mouse_event),
            Event::Mouse(_) | Event::Resize(_, _) => {}
            other => app.on_event(other, Instant::now()),
        }

        if app.should_quit {
            break;
        }
    }

    if let Err(e) = tui.restore() {
        warn!(error = %e, "terminal restore failed");
        return Err(e);
    }
    info!("exiting");
    Ok(())
}
