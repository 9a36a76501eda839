use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

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
    name = "taskdeck",
    version,
    about = "Taskdeck: a small to-do list with filtering, sorting and stats",
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

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task.
    Add(AddArgs),
    /// Change the fields of an existing task.
    Edit(EditArgs),
    /// Flip a task between pending and done.
    Toggle { selector: String },
    /// Remove a task.
    Delete { selector: String },
    /// Remove every completed task.
    ClearCompleted,
    /// Show the filtered, sorted list.
    List(ListArgs),
    /// Show completion statistics.
    Stats,
    /// Show the categories in use.
    Categories,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    #[arg(short = 'c', long)]
    pub category: Option<String>,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub selector: String,

    #[arg(short = 't', long)]
    pub text: Option<String>,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    #[arg(short = 'c', long)]
    pub category: Option<String>,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 's', long)]
    pub search: Option<String>,

    #[arg(short = 'c', long)]
    pub category: Option<String>,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub hide_completed: bool,

    #[arg(long)]
    pub sort: Option<String>,
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli};

    #[test]
    fn parses_add_with_flags() {
        let cli = GlobalCli::parse_from([
            "taskdeck", "-vv", "add", "Buy", "milk", "-p", "high", "--due", "tomorrow",
        ]);
        assert_eq!(cli.verbose, 2);
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.text, vec!["Buy", "milk"]);
        assert_eq!(args.priority.as_deref(), Some("high"));
        assert_eq!(args.due.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn rc_overrides_accumulate() {
        let cli = GlobalCli::parse_from([
            "taskdeck",
            "--rc",
            "color=off",
            "--rc",
            "default.sort=priority",
            "list",
            "--hide-completed",
        ]);
        assert_eq!(cli.rc_overrides.len(), 2);
        assert_eq!(cli.rc_overrides[1].key, "default.sort");
        let Some(Command::List(args)) = cli.command else {
            panic!("expected list");
        };
        assert!(args.hide_completed);
    }

    #[test]
    fn edit_rejects_due_and_clear_due_together() {
        let parsed = GlobalCli::try_parse_from([
            "taskdeck",
            "edit",
            "abc",
            "--due",
            "today",
            "--clear-due",
        ]);
        assert!(parsed.is_err());
    }
}
