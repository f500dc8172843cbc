//! Quorum: independent analytical agents over one shared record store.
//!
//! Five roles (connector, executor, devil's advocate, opportunist,
//! strategist) each run as a short batch pass. A pass reads the store,
//! works out which records it has not yet acted upon, consults a reasoning
//! oracle, gates what comes back, and writes findings as events, tasks and
//! documents. The agents never call each other; they coordinate only
//! through what they leave in the store.
//!
//! # Store
//!
//! A store is a directory (`--store`, `$QUORUM_HOME`, or `./.quorum`)
//! holding `quorum.db`, an optional `config.toml` and optional
//! `prompts/<role>.txt` overrides.
//!
//! # Examples
//!
//! ```bash
//! quorum init
//! quorum ingest turn --conversation c1 "we should move billing to the new queue"
//! quorum connector
//! quorum strategist --type weekly
//! quorum task list --format json
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: record store, frontier, tasks, oracle, interpretation, config
//! - [`agents`]: the runner contract and the five roles

pub mod agents;
pub mod core;

mod cli;

use crate::agents::runner::{self, Agent, AgentContext, AgentRole};
use crate::agents::{Connector, DevilsAdvocate, Executor, Opportunist, Strategist};
use crate::cli::{
    Cli, Command, IngestCommand, IntegrationsCommand, OutputFormat, SinceArgs, TaskCommand,
};
use crate::core::config::{self, IntegrationStatus, Settings};
use crate::core::error::QuorumError;
use crate::core::oracle::HttpOracle;
use crate::core::records::{self, NewDocument, NewEvent};
use crate::core::store::Store;
use crate::core::tasks::{self, NewTask, Task, TaskQuery, UpsertOutcome};
use crate::core::time::{command_envelope, parse_due, rfc3339};

use clap::Parser;
use colored::Colorize;
use serde_json::json;
use std::path::Path;

fn init_tracing() {
    // Logs go to stderr so `--format json` output stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quorum=info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn since_hours(args: &SinceArgs) -> Result<Option<u32>, QuorumError> {
    args.since.as_deref().map(config::parse_since).transpose()
}

fn print_json(value: &serde_json::Value) -> Result<(), QuorumError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Loads settings, builds the oracle, then opens the store. Configuration
/// problems surface before anything is written.
fn run_agent(root: &Path, format: OutputFormat, agent: &dyn Agent) -> Result<(), QuorumError> {
    let settings = Settings::load(root)?;
    let oracle = HttpOracle::from_settings(&settings.oracle)?;
    let issues = settings.integrations.validate();
    for issue in &issues {
        tracing::warn!(integration = %issue.integration, "{}", issue.issue);
    }
    let store = Store::open(root)?;
    let ctx = AgentContext::new(&store, &oracle, &settings);
    let summary = runner::execute(agent, &ctx)?;
    match format {
        OutputFormat::Json => print_json(&summary.envelope()),
        OutputFormat::Text => {
            println!("{}: {}", agent.role().display_name().bold(), summary.message);
            Ok(())
        }
    }
}

fn task_line(t: &Task) -> String {
    let due = t
        .due_at
        .as_ref()
        .map(|d| format!(" due {}", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    let owner = t
        .owner
        .as_deref()
        .map(|o| format!(" @{o}"))
        .unwrap_or_default();
    format!(
        "{}  [{}] P{} {}{}{}",
        t.id.dimmed(),
        t.status,
        t.priority,
        t.title,
        owner,
        due
    )
}

fn print_tasks(cmd: &str, format: OutputFormat, items: &[Task]) -> Result<(), QuorumError> {
    match format {
        OutputFormat::Json => print_json(&command_envelope(
            cmd,
            "ok",
            json!({ "count": items.len(), "items": items }),
        )),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No tasks.");
            }
            for t in items {
                println!("{}", task_line(t));
            }
            Ok(())
        }
    }
}

fn run_task_cli(
    root: &Path,
    format: OutputFormat,
    command: TaskCommand,
) -> Result<(), QuorumError> {
    let settings = Settings::load(root)?;
    let store = Store::open(root)?;
    match command {
        TaskCommand::Add {
            title,
            description,
            priority,
            owner,
            due,
        } => {
            let due_at = match due.as_deref() {
                Some(raw) => Some(parse_due(raw).ok_or_else(|| {
                    QuorumError::Validation(format!("invalid due date '{raw}'"))
                })?),
                None => None,
            };
            let task = NewTask::new(title)
                .description(description)
                .priority(priority)
                .owner(owner)
                .due_at(due_at);
            let (id, outcome) = tasks::upsert_task(&store, task)?;
            match format {
                OutputFormat::Json => print_json(&command_envelope(
                    "task.add",
                    "ok",
                    json!({ "id": id, "outcome": outcome }),
                )),
                OutputFormat::Text => {
                    let verb = match outcome {
                        UpsertOutcome::Created => "Created",
                        UpsertOutcome::Updated => "Updated",
                    };
                    println!("{verb} task {id}");
                    Ok(())
                }
            }
        }
        TaskCommand::List { status, all, limit } => {
            let query = if !status.is_empty() {
                TaskQuery {
                    statuses: status,
                    limit,
                    ..TaskQuery::default()
                }
            } else if all {
                TaskQuery {
                    limit,
                    ..TaskQuery::default()
                }
            } else {
                TaskQuery::non_terminal(limit)
            };
            let items = tasks::query_tasks(&store, &query)?;
            print_tasks("task.list", format, &items)
        }
        TaskCommand::Show { id } => {
            let task = tasks::get_task(&store, &id)?
                .ok_or_else(|| QuorumError::NotFound(format!("task {id}")))?;
            match format {
                OutputFormat::Json => {
                    print_json(&command_envelope("task.show", "ok", json!({ "task": task })))
                }
                OutputFormat::Text => {
                    println!("{}", task_line(&task));
                    if !task.description.is_empty() {
                        println!("\n{}", task.description);
                    }
                    println!("\ncreated {}  updated {}", rfc3339(&task.created_at), rfc3339(&task.updated_at));
                    if let Some(done) = &task.completed_at {
                        println!("completed {}", rfc3339(done));
                    }
                    Ok(())
                }
            }
        }
        TaskCommand::Transition { id, status } => {
            let task = tasks::transition(&store, &id, status)?;
            match format {
                OutputFormat::Json => print_json(&command_envelope(
                    "task.transition",
                    "ok",
                    json!({ "task": task }),
                )),
                OutputFormat::Text => {
                    println!("{}", task_line(&task));
                    Ok(())
                }
            }
        }
        TaskCommand::Overdue => {
            let items = tasks::overdue_tasks(&store)?;
            print_tasks("task.overdue", format, &items)
        }
        TaskCommand::Stale { days } => {
            let days = days.unwrap_or(settings.tasks.stale_after_days);
            let items = tasks::stale_tasks(&store, days)?;
            print_tasks("task.stale", format, &items)
        }
    }
}

fn run_ingest_cli(
    root: &Path,
    format: OutputFormat,
    command: IngestCommand,
) -> Result<(), QuorumError> {
    let store = Store::open(root)?;
    let (kind, id) = match command {
        IngestCommand::Turn {
            conversation,
            role,
            content,
        } => {
            if content.trim().is_empty() {
                return Err(QuorumError::Validation("turn content is empty".into()));
            }
            let turn = records::insert_turn(&store, &conversation, &role, &content)?;
            ("turn", turn.id)
        }
        IngestCommand::Event {
            event_type,
            actor,
            title,
            description,
        } => {
            let event = records::insert_event(
                &store,
                NewEvent::new(event_type, &actor, title).description(description),
            )?;
            ("event", event.id)
        }
        IngestCommand::Document {
            doc_type,
            source,
            title,
            tags,
            content,
        } => {
            let doc = records::insert_document(
                &store,
                NewDocument::new(&doc_type, &source, title, content).tags(tags),
            )?;
            ("document", doc.id)
        }
    };
    match format {
        OutputFormat::Json => print_json(&command_envelope(
            &format!("ingest.{kind}"),
            "ok",
            json!({ "id": id }),
        )),
        OutputFormat::Text => {
            println!("Recorded {kind} {id}");
            Ok(())
        }
    }
}

fn run_integrations_cli(
    root: &Path,
    format: OutputFormat,
    command: IntegrationsCommand,
) -> Result<(), QuorumError> {
    let settings = Settings::load(root)?;
    let lookup = |k: &str| std::env::var(k).ok();
    let integrations = &settings.integrations;
    match command {
        IntegrationsCommand::Status => match format {
            OutputFormat::Json => {
                let items: Vec<_> = integrations
                    .0
                    .iter()
                    .map(|(name, i)| {
                        json!({
                            "name": name,
                            "status": integrations
                                .status_with(name, lookup)
                                .unwrap_or(IntegrationStatus::Disabled),
                            "benefit": i.benefit,
                            "agents": i.agents,
                        })
                    })
                    .collect();
                print_json(&command_envelope(
                    "integrations.status",
                    "ok",
                    json!({
                        "integrations": items,
                        "issues": integrations.validate_with(lookup),
                    }),
                ))
            }
            OutputFormat::Text => {
                if integrations.0.is_empty() {
                    println!("No integrations configured.");
                } else {
                    print!("{}", integrations.render_status(lookup));
                }
                Ok(())
            }
        },
        IntegrationsCommand::For { agent } => {
            let role: AgentRole = agent.parse()?;
            let names: Vec<&String> = integrations
                .for_agent(role.as_str())
                .filter(|(name, _)| {
                    integrations.status_with(name, lookup) == Some(IntegrationStatus::Active)
                })
                .map(|(name, _)| name)
                .collect();
            match format {
                OutputFormat::Json => print_json(&command_envelope(
                    "integrations.for",
                    "ok",
                    json!({ "agent": role.as_str(), "integrations": names }),
                )),
                OutputFormat::Text => {
                    for name in names {
                        println!("{name}");
                    }
                    Ok(())
                }
            }
        }
    }
}

pub fn run() -> Result<(), QuorumError> {
    let cli = Cli::parse();
    init_tracing();
    let root = config::resolve_store_root(cli.store.as_deref());
    let format = cli.format;

    match cli.command {
        Command::Init => {
            Settings::load(&root)?;
            let store = Store::open(&root)?;
            match format {
                OutputFormat::Json => print_json(&command_envelope(
                    "init",
                    "ok",
                    json!({ "root": store.root.display().to_string() }),
                )),
                OutputFormat::Text => {
                    println!("Initialized store at {}", store.root.display());
                    Ok(())
                }
            }
        }
        Command::Connector(args) => {
            let agent = Connector {
                since_hours: since_hours(&args)?,
            };
            run_agent(&root, format, &agent)
        }
        Command::Executor(args) => {
            let mut agent = Executor::default();
            if let Some(h) = since_hours(&args)? {
                agent.lookback_hours = h;
            }
            run_agent(&root, format, &agent)
        }
        Command::DevilsAdvocate(args) => {
            let mut agent = DevilsAdvocate::default();
            if let Some(h) = since_hours(&args)? {
                agent.lookback_hours = h;
            }
            run_agent(&root, format, &agent)
        }
        Command::Opportunist(args) => {
            let mut agent = Opportunist::default();
            if let Some(h) = since_hours(&args)? {
                agent.lookback_hours = h;
            }
            run_agent(&root, format, &agent)
        }
        Command::Strategist {
            reflection_type,
            since,
        } => {
            let agent = Strategist {
                reflection_type,
                lookback_hours: since_hours(&since)?,
            };
            run_agent(&root, format, &agent)
        }
        Command::Task(task_cli) => run_task_cli(&root, format, task_cli.command),
        Command::Ingest(ingest_cli) => run_ingest_cli(&root, format, ingest_cli.command),
        Command::Integrations(integrations_cli) => {
            run_integrations_cli(&root, format, integrations_cli.command)
        }
    }
}
