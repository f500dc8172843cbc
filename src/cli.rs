//! CLI struct definitions for the quorum command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use crate::core::config::ReflectionType;
use crate::core::records::EventType;
use crate::core::tasks::TaskStatus;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "quorum",
    version = env!("CARGO_PKG_VERSION"),
    about = "Independent analytical agents coordinating through one shared record store."
)]
pub(crate) struct Cli {
    /// Store root directory (defaults to $QUORUM_HOME, then ./.quorum).
    #[clap(long, global = true)]
    pub store: Option<PathBuf>,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SinceArgs {
    /// Lookback window, e.g. `24h`, `2d`, or a bare hour count.
    #[clap(long)]
    pub since: Option<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the store and its schema
    Init,
    /// Link unprocessed conversation turns to related memory
    Connector(SinceArgs),
    /// Extract tasks from recent activity and flag overdue or stale work
    Executor(SinceArgs),
    /// Critique recent decisions and high-priority tasks
    #[clap(name = "devils-advocate")]
    DevilsAdvocate(SinceArgs),
    /// Look for quick wins and reusable work
    Opportunist(SinceArgs),
    /// Write a daily or weekly strategic reflection
    Strategist {
        /// Reflection granularity
        #[clap(long = "type", value_enum, default_value_t = ReflectionType::Daily)]
        reflection_type: ReflectionType,
        #[clap(flatten)]
        since: SinceArgs,
    },
    /// Inspect and move tasks
    Task(TaskCli),
    /// Record turns, events and documents
    Ingest(IngestCli),
    /// Integration catalog from config.toml
    Integrations(IntegrationsCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct TaskCli {
    #[clap(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TaskCommand {
    /// Add a task, or refresh the open task with the same title
    Add {
        title: String,
        #[clap(long, default_value = "")]
        description: String,
        /// Lower is more urgent
        #[clap(long, default_value_t = crate::core::tasks::DEFAULT_PRIORITY)]
        priority: i64,
        #[clap(long)]
        owner: Option<String>,
        /// Due date (`YYYY-MM-DD` or RFC 3339)
        #[clap(long)]
        due: Option<String>,
    },
    /// List tasks, most urgent first
    List {
        /// Only this status (repeatable)
        #[clap(long, value_parser = parse_status)]
        status: Vec<TaskStatus>,
        /// Include done and cancelled tasks
        #[clap(long)]
        all: bool,
        #[clap(long, default_value_t = 100)]
        limit: usize,
    },
    /// Show one task
    Show { id: String },
    /// Move a task to a new status
    Transition {
        id: String,
        #[clap(value_parser = parse_status)]
        status: TaskStatus,
    },
    /// Open tasks past their due date
    Overdue,
    /// Open tasks not updated recently
    Stale {
        /// Days without an update (defaults to tasks.stale_after_days)
        #[clap(long)]
        days: Option<u32>,
    },
}

fn parse_status(raw: &str) -> Result<TaskStatus, String> {
    raw.parse().map_err(|e: crate::core::error::QuorumError| e.to_string())
}

fn parse_event_type(raw: &str) -> Result<EventType, String> {
    raw.parse().map_err(|e: crate::core::error::QuorumError| e.to_string())
}

#[derive(clap::Args, Debug)]
pub(crate) struct IngestCli {
    #[clap(subcommand)]
    pub command: IngestCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum IngestCommand {
    /// Append a conversation turn
    Turn {
        #[clap(long)]
        conversation: String,
        #[clap(long, default_value = "user")]
        role: String,
        content: String,
    },
    /// Append an event (e.g. a decision for the devil's advocate)
    Event {
        #[clap(long = "type", value_parser = parse_event_type, default_value = "decision")]
        event_type: EventType,
        #[clap(long, default_value = "human")]
        actor: String,
        title: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    /// Append a document
    Document {
        #[clap(long, default_value = "note")]
        doc_type: String,
        #[clap(long, default_value = "human")]
        source: String,
        #[clap(long)]
        title: String,
        /// Repeatable
        #[clap(long = "tag")]
        tags: Vec<String>,
        content: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct IntegrationsCli {
    #[clap(subcommand)]
    pub command: IntegrationsCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum IntegrationsCommand {
    /// Show which integrations are active, misconfigured or disabled
    Status,
    /// Integrations available to one agent
    For { agent: String },
}
