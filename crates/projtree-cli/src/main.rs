mod input;
mod render;

use std::path::{Path, PathBuf};

use anyhow::Context;
use projtree_core::{CoreError, Engine, Layout, ProjectWatcher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use input::{parse_line, InputAction, HELP};
use render::{render_event, render_tree};

/// Finds the config file: `./projtree.toml`, then `~/.config/projtree/projtree.toml`.
fn config_path() -> PathBuf {
    let local = PathBuf::from("projtree.toml");
    if local.exists() {
        return local;
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
        .join(".config")
        .join("projtree")
        .join("projtree.toml")
}

fn load_config() -> anyhow::Result<projtree_core::Config> {
    let path = config_path();
    match projtree_core::Config::load(&path) {
        Ok(config) => Ok(config),
        Err(CoreError::NotFound(_)) => Ok(projtree_core::Config::default()),
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

fn init_logging(log_file: &Path, level: &str) -> anyhow::Result<()> {
    let level: tracing::Level = level
        .parse()
        .with_context(|| format!("invalid log level {level:?}"))?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    // Logs go to a file so stdout stays readable.
    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = load_config()?;
    if let Some(root) = std::env::args().nth(1) {
        config.general.root = PathBuf::from(root);
    }

    std::fs::create_dir_all(&config.general.root)
        .with_context(|| format!("cannot create {}", config.general.root.display()))?;
    init_logging(
        &config.logging.file_path(&config.general.root),
        &config.logging.level,
    )?;

    let mut engine = Engine::new(Layout::ensure(&config.general.root)?, &config)?;
    tracing::info!(
        root = %engine.layout().root(),
        images = %engine.layout().images(),
        "layout ready"
    );
    print!("{}", render_tree(engine.store()));

    let (change_tx, change_rx) = mpsc::unbounded_channel();
    let watcher = ProjectWatcher::start(
        engine.layout().projects(),
        Some(engine.layout().holding_area().clone()),
        change_tx,
    )?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let cancel = engine.cancel_handle();
    let projects = engine.layout().projects().as_path().to_path_buf();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_line(&line, &projects) {
                Ok(InputAction::Command(command)) => {
                    if command_tx.send(command).is_err() {
                        break;
                    }
                }
                Ok(InputAction::Cancel) => cancel.cancel(),
                Ok(InputAction::Help) => println!("{HELP}"),
                Ok(InputAction::Quit) => break,
                Ok(InputAction::Nothing) => {}
                Err(msg) => eprintln!("{msg}"),
            }
        }
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("{}", render_event(&event));
        }
    });

    engine.run(command_rx, change_rx, event_tx).await;
    drop(watcher);

    reader.abort();
    if let Err(e) = printer.await {
        tracing::warn!("event printer stopped abnormally: {e}");
    }

    print!("{}", render_tree(engine.store()));
    Ok(())
}
