use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use gk_core::{Action, Screen, Session, Snapshot};

const LOG_FILE_NAME: &str = "groupkeep.log";

#[derive(Debug, Parser)]
#[command(name = "groupkeep", version, about = "Groups with custom fields")]
struct Cli {
    /// Append logs to this file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Log filter directives, e.g. `info` or `gk_core=debug`.
    #[arg(long, global = true, env = "GROUPKEEP_LOG", default_value = "info")]
    log_filter: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply a YAML script to a fresh session and print the final snapshot.
    Replay {
        /// Path to the script.
        path: PathBuf,
    },
}

/// Settings resolved from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    log_file: Option<PathBuf>,
    log_filter: String,
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Self {
            log_file: cli.log_file.clone(),
            log_filter: cli.log_filter.clone(),
        }
    }
}

impl Config {
    /// Log file locations to try, in order.
    fn log_file_candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.log_file {
            return vec![path.clone()];
        }
        let mut candidates = Vec::new();
        if let Some(dir) = dirs::data_local_dir() {
            candidates.push(dir.join("groupkeep").join(LOG_FILE_NAME));
        }
        candidates.push(PathBuf::from(".groupkeep").join(LOG_FILE_NAME));
        candidates
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from(&cli);

    match cli.command {
        None => {
            init_tracing(&config, true);
            gk_tui::run()
        }
        Some(Command::Replay { path }) => {
            init_tracing(&config, false);
            let snapshot = replay(&path)?;
            print!("{}", render_snapshot(&snapshot)?);
            Ok(())
        }
    }
}

/// Where log events go.
#[derive(Debug)]
enum LogSink {
    File(PathBuf, fs::File),
    Stderr,
    Disabled,
}

/// Pick the log sink along with warnings collected while opening files.
///
/// The terminal UI owns stdout and stderr, so interactive runs only log to a
/// file and stay silent when none can be opened.
fn choose_log_sink(config: &Config, interactive: bool) -> (LogSink, Vec<String>) {
    if !interactive && config.log_file.is_none() {
        return (LogSink::Stderr, Vec::new());
    }
    let (log_file, warnings) = open_log_file(config);
    let sink = match log_file {
        Some((path, file)) => LogSink::File(path, file),
        None if interactive => LogSink::Disabled,
        None => LogSink::Stderr,
    };
    (sink, warnings)
}

/// Install the global subscriber, then report any sink warnings through it.
fn init_tracing(config: &Config, interactive: bool) {
    let env_filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let (sink, warnings) = choose_log_sink(config, interactive);

    match sink {
        LogSink::File(path, file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            info!(path = %path.display(), "logging initialized");
        }
        LogSink::Stderr => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(env_filter)
                .init();
        }
        LogSink::Disabled => {
            tracing_subscriber::registry().with(env_filter).init();
        }
    }

    for warning in warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(config: &Config) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in config.log_file_candidates() {
        if let Some(parent) = candidate.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                warnings.push(format!("failed to create log dir {}: {e}", parent.display()));
                continue;
            }
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!("failed to open log file {}: {e}", candidate.display()));
            }
        }
    }

    (None, warnings)
}

/// One scripted user input. Groups and fields are named, not identified.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    OpenCreateDialog,
    CloseCreateDialog,
    SetGroupName { name: String },
    SetPendingFieldName { name: String },
    AddField { name: String },
    AddPendingField,
    /// Remove the first draft field with this name.
    RemoveField { name: String },
    CreateGroup,
    /// Open the first listed group with this name.
    OpenGroup { name: String },
    OpenEntryForm,
    SetEntryValue { field: String, value: String },
    SaveEntry,
    CancelEntry,
    DeleteEntry { index: usize },
    GoHome,
}

impl Step {
    fn resolve(self, snapshot: &Snapshot) -> Result<Action> {
        let action = match self {
            Step::OpenCreateDialog => Action::OpenCreateDialog,
            Step::CloseCreateDialog => Action::CloseCreateDialog,
            Step::SetGroupName { name } => Action::SetGroupName { name },
            Step::SetPendingFieldName { name } => Action::SetPendingFieldName { name },
            Step::AddField { name } => Action::AddField { name },
            Step::AddPendingField => Action::AddPendingField,
            Step::RemoveField { name } => {
                let Screen::Home {
                    create_dialog: Some(dialog),
                    ..
                } = &snapshot.screen
                else {
                    return Err(anyhow!("create dialog is not open"));
                };
                let field = dialog
                    .draft
                    .fields()
                    .iter()
                    .find(|field| field.name() == name)
                    .ok_or_else(|| anyhow!("no draft field named {name:?}"))?;
                Action::RemoveField {
                    field_id: field.id(),
                }
            }
            Step::CreateGroup => Action::CreateGroup,
            Step::OpenGroup { name } => {
                let Screen::Home { groups, .. } = &snapshot.screen else {
                    return Err(anyhow!("groups are only listed on the home view"));
                };
                let group = groups
                    .iter()
                    .find(|group| group.name() == name)
                    .ok_or_else(|| anyhow!("no group named {name:?}"))?;
                Action::OpenGroup {
                    group_id: group.id(),
                }
            }
            Step::OpenEntryForm => Action::OpenEntryForm,
            Step::SetEntryValue { field, value } => Action::SetEntryValue { field, value },
            Step::SaveEntry => Action::SaveEntry,
            Step::CancelEntry => Action::CancelEntry,
            Step::DeleteEntry { index } => Action::DeleteEntry { index },
            Step::GoHome => Action::GoHome,
        };
        Ok(action)
    }
}

fn parse_script(source: &str) -> Result<Vec<Step>> {
    serde_yaml::from_str(source).context("invalid replay script")
}

fn run_script(steps: Vec<Step>) -> Result<Snapshot> {
    let mut session = Session::new();
    let mut snapshot = session.snapshot();
    for (i, step) in steps.into_iter().enumerate() {
        let number = i + 1;
        let action = step.resolve(&snapshot).with_context(|| format!("step {number}"))?;
        snapshot = session.apply(action);
        info!(step = number, outcome = ?snapshot.outcome, "replay step applied");
    }
    Ok(snapshot)
}

fn replay(path: &Path) -> Result<Snapshot> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read replay script {}", path.display()))?;
    run_script(parse_script(&source)?)
}

fn render_snapshot(snapshot: &Snapshot) -> Result<String> {
    serde_yaml::to_string(snapshot).context("failed to serialize snapshot")
}
