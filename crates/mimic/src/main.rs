//! mimic - record and replay timed input patterns
//!
//! Capture side: a global input hook records mouse and keyboard activity
//! while an action queue file names what is being performed. Replay side:
//! the newest stored pattern for an action is driven back into the focused
//! target window with the recorded timing.
//!
//! Supported: Windows, macOS (dry runs work anywhere)

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use mimic_core::config;
use mimic_core::prelude::*;
use mimic_recorder::prelude::*;

#[derive(Parser)]
#[command(name = "mimic")]
#[command(about = "Record and replay timed input patterns, segmented by an action queue")]
#[command(version)]
struct Cli {
    /// Config file (defaults to mimic.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the patterns directory
    #[arg(long, global = true)]
    patterns_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record input, segmented by the action queue
    Record {
        /// Start capturing immediately instead of waiting for the hotkey
        #[arg(long)]
        now: bool,
    },
    /// Watch the action queue and replay each entry as it appears
    Dispatch {
        /// Walk the timing without driving real input
        #[arg(long)]
        dry_run: bool,
    },
    /// Replay the newest pattern for an action type
    Replay {
        action: Option<String>,
        /// Narrow the match to one recorded box id
        #[arg(long = "box")]
        box_id: Option<i64>,
        /// Replay a specific artifact instead of the newest match
        #[arg(long)]
        file: Option<PathBuf>,
        /// Speed multiplier (defaults to the configured speed)
        #[arg(long)]
        speed: Option<f64>,
        /// Walk the timing without driving real input
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored patterns
    List {
        /// Only patterns for this action type
        #[arg(long)]
        action: Option<String>,
    },
    /// Show one pattern's summary
    Show {
        file: String,
        /// Print the first N events
        #[arg(long, default_value = "0")]
        events: usize,
    },
    /// Delete a stored pattern
    Delete { file: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);

    let result: Result<()> = match cli.command {
        Commands::Record { now } => record(&config, now),
        Commands::Dispatch { dry_run } => dispatch(&config, dry_run),
        Commands::Replay {
            action,
            box_id,
            file,
            speed,
            dry_run,
        } => replay(&config, action.as_deref(), box_id, file, speed, dry_run),
        Commands::List { action } => list(&config, action.as_deref()),
        Commands::Show { file, events } => show(&config, &file, events),
        Commands::Delete { file } => delete(&config, &file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Config {
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; falling back to defaults", e);
            Config::default()
        }
    };
    if let Some(dir) = &cli.patterns_dir {
        config.paths.patterns_directory = dir.clone();
    }
    config
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
fn record(config: &Config, start_now: bool) -> Result<()> {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    let recorder_config = RecorderConfig::from_config(config);
    let stop = Arc::new(AtomicBool::new(false));
    let active = Arc::new(AtomicBool::new(start_now));

    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    let (tx, rx) = crossbeam_channel::bounded(recorder_config.max_buffer);
    spawn_hook(
        tx,
        HookConfig {
            active: active.clone(),
            stop: stop.clone(),
            start_key: config.hotkeys.start_recording.clone(),
            stop_key: config.hotkeys.stop_recording.clone(),
        },
    );

    if !start_now {
        println!(
            "Armed. Press {} to start recording, {} or Ctrl+C to stop.",
            config.hotkeys.start_recording, config.hotkeys.stop_recording
        );
        while !active.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(50));
        }
        if stop.load(Ordering::SeqCst) {
            println!("Stopped before capture began.");
            return Ok(());
        }
    }

    println!(
        "Recording. Press {} or Ctrl+C to stop.",
        config.hotkeys.stop_recording
    );
    let handle = Recorder::new(recorder_config).start(rx)?;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }
    active.store(false, Ordering::SeqCst);

    let summary = handle.stop();
    println!("{} events recorded", summary.total_events);
    for path in &summary.artifacts {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn record(_config: &Config, _start_now: bool) -> Result<()> {
    bail!("recording needs the global input hook, which has no backend on this platform yet");
}

fn dispatch(config: &Config, dry_run: bool) -> Result<()> {
    let store = PatternStore::new(&config.paths.patterns_directory)?;
    let queue = ActionQueue::new(&config.paths.suggested_actions);
    let engine = build_engine(config, dry_run, config.replay.speed)?;
    let mut dispatcher = ActionDispatcher::new(
        queue,
        store,
        engine,
        config::secs(config.replay.dispatch_interval),
    );

    let stop = dispatcher.stop_flag();
    let cancel = dispatcher.replay_stop();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
        cancel.stop();
    })?;

    println!(
        "Dispatching from {} (Ctrl+C to stop)",
        config.paths.suggested_actions.display()
    );
    dispatcher.run();
    Ok(())
}

fn replay(
    config: &Config,
    action: Option<&str>,
    box_id: Option<i64>,
    file: Option<PathBuf>,
    speed: Option<f64>,
    dry_run: bool,
) -> Result<()> {
    let store = PatternStore::new(&config.paths.patterns_directory)?;

    let path = match (file, action) {
        (Some(path), _) => path,
        (None, Some(action)) => store
            .find_latest(action, box_id)
            .with_context(|| format!("no pattern recorded for '{}'", action))?,
        (None, None) => bail!("give an action type or --file"),
    };

    let speed = speed.unwrap_or(config.replay.speed);
    let mut engine = build_engine(config, dry_run, speed)?;
    let count = engine.load(&store, &path)?;

    let cancel = engine.stop_handle();
    ctrlc::set_handler(move || cancel.stop())?;

    println!(
        "Replaying {} ({} events) at {}x speed...",
        path.display(),
        count,
        speed
    );
    println!("Starting in 2 seconds...");
    std::thread::sleep(std::time::Duration::from_secs(2));

    match engine.play() {
        ReplayOutcome::Completed => println!("Done."),
        ReplayOutcome::Cancelled => println!("Cancelled."),
        ReplayOutcome::Skipped => println!("Skipped: target window not focused."),
        ReplayOutcome::Failed => bail!("input driver failed mid-replay"),
    }
    Ok(())
}

fn list(config: &Config, action: Option<&str>) -> Result<()> {
    let store = PatternStore::new(&config.paths.patterns_directory)?;
    let mut files = store.list()?;
    if let Some(action) = action {
        let prefix = mimic_core::store::file_prefix(action, None);
        files.retain(|f| f.starts_with(&prefix));
    }
    if files.is_empty() {
        println!("No patterns stored.");
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

fn show(config: &Config, file: &str, events: usize) -> Result<()> {
    let store = PatternStore::new(&config.paths.patterns_directory)?;
    let recording = store.load(resolve_artifact(&store, file))?;

    println!("Action line: {}", recording.action_name_line);
    println!("Type: {}", recording.parsed_action_type);
    if let Some(id) = recording.parsed_box_id {
        println!("Box: {}", id);
    }
    println!("Saved: {}", recording.save_timestamp);
    println!("Events: {}", recording.total_events);

    let (mut moves, mut buttons, mut keys, mut pauses) = (0, 0, 0, 0);
    for e in &recording.events {
        match e {
            Event::MouseMove { .. } => moves += 1,
            Event::MouseButton { .. } => buttons += 1,
            Event::Key { .. } => keys += 1,
            Event::Pause { .. } => pauses += 1,
        }
    }
    println!(
        "\nSummary: {} moves, {} buttons, {} keys, {} pauses",
        moves, buttons, keys, pauses
    );

    for (i, e) in recording.events.iter().take(events).enumerate() {
        println!("{}: {:?}", i, e);
    }
    Ok(())
}

fn delete(config: &Config, file: &str) -> Result<()> {
    let store = PatternStore::new(&config.paths.patterns_directory)?;
    store.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}

/// Accept either a bare artifact filename or a full path.
fn resolve_artifact(store: &PatternStore, file: &str) -> PathBuf {
    let direct = PathBuf::from(file);
    if direct.exists() {
        direct
    } else {
        store.path().join(file)
    }
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
fn build_engine(config: &Config, dry_run: bool, speed: f64) -> Result<ReplayEngine> {
    let mut options = ReplayOptions::from_config(&config.replay);
    options.speed = speed;

    if dry_run {
        return Ok(ReplayEngine::new(
            Box::new(NoopDriver),
            Box::new(StaticFocus(true)),
            options,
        ));
    }

    let focus = RateLimited::new(
        WindowFocus::new(config.window.game_title.as_str()),
        options.focus_check_interval,
    );
    Ok(ReplayEngine::new(
        Box::new(EnigoDriver::new()?),
        Box::new(focus),
        options,
    ))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn build_engine(config: &Config, dry_run: bool, speed: f64) -> Result<ReplayEngine> {
    let mut options = ReplayOptions::from_config(&config.replay);
    options.speed = speed;
    if !dry_run {
        warn!("no injection backend on this platform, running dry");
    }
    Ok(ReplayEngine::new(
        Box::new(NoopDriver),
        Box::new(StaticFocus(true)),
        options,
    ))
}
