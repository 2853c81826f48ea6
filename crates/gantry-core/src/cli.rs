use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gantry",
    version,
    about = "Gantry: step-by-step project scheduling client",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "gantryrc", global = true)]
    pub gantryrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Answer yes to every confirmation prompt.
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the current step and what has been entered so far.
    Status,
    /// Create the project, or update it after going back.
    Project(ProjectArgs),
    #[command(subcommand)]
    Employee(EmployeeCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    /// Move on to the next step.
    Next,
    /// Return to the previous step.
    Back,
    /// Submit employees and tasks and calculate the schedule.
    Schedule,
    /// Resubmit everything and recalculate.
    Recompute,
    /// Print the Gantt chart of the last schedule.
    Show,
    /// Save the schedule as an Excel workbook.
    Export {
        /// Defaults to `<project>_gantt.xlsx`.
        filename: Option<String>,
    },
    /// Load a whole project from a workbook, or from JSON with `--json`.
    Import {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Discard everything and start a new project.
    Reset,
}

/// Unset flags keep whatever the form already holds.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    #[arg(long)]
    pub name: Option<String>,
    /// YYYY-MM-DD, DD/MM/YYYY or `today`.
    #[arg(long)]
    pub start: Option<String>,
    /// Comma-separated dates and `A-B` ranges.
    #[arg(long)]
    pub holidays: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EmployeeCommand {
    Add(EmployeeArgs),
    /// Move an employee back into the form. Positions start at 1.
    Edit { position: usize },
    Delete { position: usize },
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EmployeeArgs {
    #[arg(long)]
    pub name: Option<String>,
    /// e.g. `mon,tue,wed`, `weekdays` or `all`.
    #[arg(long)]
    pub days: Option<String>,
    #[arg(long)]
    pub holidays: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    Add(TaskArgs),
    /// Move a task back into the form. Positions start at 1.
    Edit { position: usize },
    Delete { position: usize },
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "assignee")]
    pub assigned_to: Option<String>,
    /// Estimated working days.
    #[arg(long = "days", allow_negative_numbers = true)]
    pub estimated_duration: Option<i64>,
    /// Percent of the assignee's time, 1 to 100.
    #[arg(long, allow_negative_numbers = true)]
    pub availability: Option<i64>,
    /// Extra working days.
    #[arg(long = "margin", allow_negative_numbers = true)]
    pub contingency_margin: Option<i64>,
    /// Empty clears the dependency.
    #[arg(long = "depends-on")]
    pub dependency: Option<String>,
    /// Empty clears the custom start.
    #[arg(long = "start")]
    pub custom_start_date: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
