use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{self, ExitCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use claude_pulse::config::{Config, SourceKind};
use claude_pulse::display::{render_report, report::render_settings, PopoverView};
use claude_pulse::live::{
    CommandSnapshotSource, FileSnapshotSource, InvalidationHub, Orchestrator, SnapshotSource,
    UsageState,
};
use claude_pulse::logging;
use claude_pulse::settings::{
    JsonFilePersistence, RefreshInterval, SettingsPatch, SettingsPersistence, SettingsStore,
    ThemePreference,
};
use claude_pulse::theme::{ThemeResolver, WatchAppearance};

/// How often the watch screen is redrawn so relative times stay current
const CLOCK_TICK: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "claude-pulse")]
#[command(about = "Rolling Claude usage and cost summary for the current window and week")]
#[command(version)]
struct Cli {
    /// Use this config file instead of the default search path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one snapshot and print the usage summary
    Show {
        /// Output the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep the summary on screen, refreshing on a timer and on file changes
    Watch,
    /// Show or change user settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Change one or more settings
    Set {
        /// Refresh interval in seconds (60, 120, 180 or 300)
        #[arg(long)]
        refresh_interval: Option<RefreshInterval>,
        /// Rolling window length in hours (1 to 24, step 0.5)
        #[arg(long)]
        window_hours: Option<f64>,
        /// Token limit for the usage meter
        #[arg(long, conflicts_with = "clear_limit")]
        limit: Option<u64>,
        /// Remove the token limit
        #[arg(long)]
        clear_limit: bool,
        /// Theme: light, dark or system
        #[arg(long)]
        theme: Option<ThemePreference>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = matches!(
        cli.command,
        Some(Commands::Show { json: true })
            | Some(Commands::Settings {
                action: Some(SettingsAction::Show { json: true })
            })
    );

    match run(cli).await {
        Ok(code) => code,
        Err(e) => handle_error(e, json),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_with_file(path)?,
        None => Config::load()?,
    };
    let _guard = logging::init_logging(&config.logging, &config.paths.log_directory)?;

    let persistence = Arc::new(JsonFilePersistence::new(&config.paths.settings_file));
    let store = Arc::new(SettingsStore::new(persistence.clone()));

    let done = match cli.command.unwrap_or(Commands::Show { json: false }) {
        Commands::Show { json } => return show(&config, store, json).await,
        Commands::Watch => watch(&config, store).await,
        Commands::Settings { action } => match action.unwrap_or(SettingsAction::Show { json: false }) {
            SettingsAction::Show { json } => show_settings(&store, json).await,
            SettingsAction::Set {
                refresh_interval,
                window_hours,
                limit,
                clear_limit,
                theme,
            } => {
                let mut patch = SettingsPatch {
                    refresh_interval_secs: refresh_interval,
                    window_hours,
                    theme,
                    ..SettingsPatch::default()
                };
                if clear_limit {
                    patch.usage_limit_tokens = Some(None);
                } else if let Some(limit) = limit {
                    patch.usage_limit_tokens = Some(Some(limit));
                }
                set_settings(&store, persistence.as_ref(), patch).await
            }
        },
    };
    done.map(|()| ExitCode::SUCCESS)
}

fn build_source(config: &Config, store: &SettingsStore) -> Arc<dyn SnapshotSource> {
    match config.source.kind {
        SourceKind::File => Arc::new(FileSnapshotSource::new(&config.paths.snapshot_file)),
        SourceKind::Command => Arc::new(
            CommandSnapshotSource::new(&config.source.command)
                .args(config.source.args.iter().cloned())
                .timeout(Duration::from_secs(config.source.timeout_secs))
                .with_settings(store.subscribe()),
        ),
    }
}

/// The error view is the whole report, so a failed fetch exits non-zero
/// without repeating the message on stderr.
async fn show(config: &Config, store: Arc<SettingsStore>, json: bool) -> Result<ExitCode> {
    store.load().await;
    let source = build_source(config, &store);
    let result = source.fetch().await;

    if json {
        let snapshot = result?;
        let output =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize usage snapshot")?;
        println!("{}", output);
        return Ok(ExitCode::SUCCESS);
    }

    let settings = store.settings();
    let resolver = ThemeResolver::new(Arc::new(WatchAppearance::from_env()), settings.theme);
    let view = PopoverView::build(
        &UsageState::from_result(result),
        &settings,
        resolver.theme(),
        false,
        chrono::Utc::now(),
    );
    resolver.dispose();

    print!("{}", render_report(&view));
    if matches!(view, PopoverView::Error { .. }) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(config: &Config, store: Arc<SettingsStore>) -> Result<()> {
    let hub = InvalidationHub::new();

    #[cfg(feature = "fs-watch")]
    let _watcher = if config.refresh.watch_enabled {
        let mut targets = vec![config.paths.watch_directory.clone()];
        if config.source.kind == SourceKind::File {
            targets.push(config.paths.snapshot_file.clone());
        }
        match claude_pulse::live::FsWatcher::start(
            &targets,
            hub.clone(),
            Duration::from_millis(config.refresh.push_debounce_ms),
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "File watching unavailable, polling only");
                None
            }
        }
    } else {
        None
    };

    let source = build_source(config, &store);
    let orchestrator = Orchestrator::start(
        store,
        source,
        Arc::new(hub),
        Arc::new(WatchAppearance::from_env()),
        config.refresh.ordering,
    );

    let mut usage = orchestrator.subscribe_usage();
    let mut settings = orchestrator.subscribe_settings();
    let mut theme = orchestrator.subscribe_theme();
    let mut panel = orchestrator.subscribe_settings_open();
    let mut clock = tokio::time::interval(CLOCK_TICK);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    hide_cursor();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = clock.tick() => {}
            Ok(()) = usage.changed() => {}
            Ok(()) = settings.changed() => {}
            Ok(()) = theme.changed() => {}
            Ok(()) = panel.changed() => {}
            line = input.next_line(), if input_open => match line {
                Ok(Some(command)) => match command.trim() {
                    "q" | "quit" => break,
                    "r" | "refresh" => {
                        debug!("Manual refresh requested");
                        let outcome = orchestrator.refresh().await;
                        debug!(?outcome, "Manual refresh settled");
                    }
                    "s" | "settings" => {
                        if orchestrator.settings_open() {
                            orchestrator.close_settings();
                        } else {
                            orchestrator.open_settings();
                        }
                    }
                    _ => {}
                },
                _ => input_open = false,
            },
        }

        clear_screen();
        print!("{}", render_report(&orchestrator.view()));
        println!("\n[r] refresh  [s] settings  [q] quit  (Ctrl+C to exit)");
    }

    show_cursor();
    orchestrator.dispose();
    info!("Watch stopped");
    println!("\nMonitoring stopped.");
    Ok(())
}

async fn show_settings(store: &SettingsStore, json: bool) -> Result<()> {
    store.load().await;
    let settings = store.settings();

    if json {
        let output =
            serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
        println!("{}", output);
    } else {
        let resolver = ThemeResolver::new(Arc::new(WatchAppearance::from_env()), settings.theme);
        print!("{}", render_settings(&settings, resolver.theme()));
        resolver.dispose();
    }
    Ok(())
}

async fn set_settings(
    store: &SettingsStore,
    persistence: &JsonFilePersistence,
    patch: SettingsPatch,
) -> Result<()> {
    if patch.is_empty() {
        return Err(anyhow::anyhow!(
            "Nothing to change, pass at least one of --refresh-interval, --window-hours, --limit, --clear-limit or --theme"
        ));
    }

    store.load().await;
    let handle = store.update_settings(patch)?;
    handle.await.context("Settings write task failed")?;

    // The store only logs write failures, so confirm the durable copy
    let settings = store.settings();
    let stored = persistence.load().await.ok();
    if stored.as_ref() != Some(&settings) {
        return Err(anyhow::anyhow!(
            "Failed to save settings to {}",
            persistence.path().display()
        ));
    }

    let resolver = ThemeResolver::new(Arc::new(WatchAppearance::from_env()), settings.theme);
    print!("{}", render_settings(&settings, resolver.theme()));
    resolver.dispose();
    Ok(())
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = io::stdout().flush();
}

fn hide_cursor() {
    print!("\x1b[?25l");
    let _ = io::stdout().flush();
}

fn show_cursor() {
    print!("\x1b[?25h");
    let _ = io::stdout().flush();
}

fn handle_error(e: anyhow::Error, json: bool) -> ! {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
