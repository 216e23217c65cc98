//! Signoff: a local-first control plane for report governance.
//!
//! Signoff answers two questions for a fleet of recurring reports:
//!
//! - **When does this job fire?** A pure schedule evaluator maps a schedule
//!   spec plus a calendar date to a due/not-due decision.
//! - **Is this artifact allowed to move forward?** A lifecycle state machine
//!   gates every stage move through an approval workflow and a change-freeze
//!   window, records an immutable transition history, and keeps the version
//!   ledger's single current pointer intact.
//!
//! # Core Principles
//!
//! - **Local-first**: all state lives under `.signoff/data/`, versioned and
//!   auditable
//! - **Deterministic**: evaluation takes an injected clock; identical inputs
//!   yield identical answers
//! - **All-or-nothing**: a failed gate leaves the aggregate untouched
//! - **Ledger-backed**: every mutation is brokered and logged; transitions
//!   land in an append-only, hash-verified audit ledger
//!
//! # Architecture
//!
//! All state mutations route through `DbBroker` for serialization and audit
//! logging. The governance aggregate (lifecycle record, approval workflow,
//! version ledger, quality gate) is keyed by report identity and persisted
//! whole through the `Repository` port; schedules are an independent
//! aggregate keyed by schedule identity.
//!
//! ## Subsystems (Plugins)
//!
//! - `schedule`: recurring report schedules and due-today evaluation
//! - `lifecycle`: stage transitions with an append-only history
//! - `approval`: ordered sign-off steps deriving a workflow status
//! - `version`: the version ledger and its single current pointer
//! - `quality`: pass/fail checks aggregated into a gate signal
//! - `change`: change requests admitted through the freeze gate
//! - `freeze`: the change-freeze window
//! - `release`: caller-side go/no-go composition
//!
//! # Crate Structure
//!
//! - [`core`]: fundamental types and the decision engines
//! - [`plugins`]: subsystem implementations (CLI + persistence shells)

pub mod core;
pub mod plugins;

mod subsystems;

use core::{
    config,
    error,
    store::Store,
};
use plugins::{approval, change, freeze, lifecycle, quality, release, schedule, version};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "signoff",
    version = env!("CARGO_PKG_VERSION"),
    about = "The Report Governance Control Plane"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct InitCli {
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    dir: Option<PathBuf>,
}

// ===== Grouped Command Structures =====

#[derive(clap::Args, Debug)]
struct GovernCli {
    #[clap(subcommand)]
    command: GovernCommand,
}

#[derive(Subcommand, Debug)]
enum GovernCommand {
    /// Report registration and stage transitions
    Lifecycle(lifecycle::LifecycleCli),

    /// Ordered approval steps and workflow status
    Approval(approval::ApprovalCli),

    /// Change requests gated by the freeze window
    Change(change::ChangeCli),

    /// Change-freeze window control
    Freeze(freeze::FreezeCli),

    /// Release go/no-go checks
    Release(release::ReleaseCli),
}

#[derive(clap::Args, Debug)]
struct LedgerCli {
    #[clap(subcommand)]
    command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Version ledger with a single current pointer
    Version(version::VersionCli),

    /// Quality checks and the aggregate gate
    Quality(quality::QualityCli),
}

#[derive(clap::Args, Debug)]
struct DataCli {
    #[clap(subcommand)]
    command: DataCommand,
}

#[derive(Subcommand, Debug)]
enum DataCommand {
    /// Subsystem schemas and discovery
    Schema(SchemaCli),

    /// Audit log access (the mutation broker)
    Broker(BrokerCli),
}

#[derive(clap::Args, Debug)]
struct SchemaCli {
    /// Limit output to one subsystem.
    #[clap(long)]
    subsystem: Option<String>,
}

#[derive(clap::Args, Debug)]
struct BrokerCli {
    #[clap(subcommand)]
    command: BrokerCommand,
}

#[derive(Subcommand, Debug)]
enum BrokerCommand {
    /// Show the audit log of brokered mutations.
    Audit,
}

// ===== Main Command Enum =====

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the control plane in a repository
    #[clap(name = "init", visible_alias = "i")]
    Init(InitCli),

    /// Recurring report schedules and due checks
    #[clap(name = "schedule", visible_alias = "s")]
    Schedule(schedule::ScheduleCli),

    /// Governance: lifecycle, approvals, changes, freeze, release
    #[clap(name = "govern", visible_alias = "g")]
    Govern(GovernCli),

    /// Ledgers: versions and quality checks
    #[clap(name = "ledger", visible_alias = "l")]
    Ledger(LedgerCli),

    /// Data: schemas and audit logs
    #[clap(name = "data")]
    Data(DataCli),

    /// Show version information
    #[clap(name = "version")]
    Version,
}

fn find_signoff_project_root(start_dir: &Path) -> Result<PathBuf, error::SignoffError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(".signoff").exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(error::SignoffError::NotFound(
                "'.signoff' directory not found in current or parent directories. Run `signoff init` first.".to_string(),
            ));
        }
    }
}

fn init_project(dir: Option<PathBuf>) -> Result<(), error::SignoffError> {
    let raw_dir = match dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    let target_dir = std::fs::canonicalize(&raw_dir).map_err(error::SignoffError::IoError)?;

    let signoff_root = target_dir.join(".signoff");
    let data_root = signoff_root.join("data");
    std::fs::create_dir_all(&data_root).map_err(error::SignoffError::IoError)?;

    subsystems::initialize_all_dbs(&data_root)?;
    config::write_default_config(&signoff_root)?;

    println!(
        "{} control plane initialized at {}",
        "●".bright_green(),
        signoff_root.display().to_string().bright_white()
    );
    println!("  governance.db, schedule.db ready");
    println!("  next: `signoff govern lifecycle register --id <report>`");
    Ok(())
}

pub fn run() -> Result<(), error::SignoffError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Init(init_cli) => init_project(init_cli.dir),
        _ => {
            let project_root = find_signoff_project_root(&current_dir)?;
            let signoff_root = project_root.join(".signoff");
            let store_root = signoff_root.join("data");
            std::fs::create_dir_all(&store_root).map_err(error::SignoffError::IoError)?;

            let store = Store::new(store_root);
            let cfg = config::load_config(&signoff_root)?;

            match cli.command {
                Command::Schedule(schedule_cli) => {
                    schedule::run_schedule_cli(&store, &cfg, schedule_cli)
                }
                Command::Govern(govern_cli) => match govern_cli.command {
                    GovernCommand::Lifecycle(lifecycle_cli) => {
                        lifecycle::run_lifecycle_cli(&store, &cfg.default_actor, lifecycle_cli)
                    }
                    GovernCommand::Approval(approval_cli) => {
                        approval::run_approval_cli(&store, &cfg.default_actor, approval_cli)
                    }
                    GovernCommand::Change(change_cli) => {
                        change::run_change_cli(&store, &cfg.default_actor, change_cli)
                    }
                    GovernCommand::Freeze(freeze_cli) => {
                        freeze::run_freeze_cli(&store, &cfg.default_actor, freeze_cli)
                    }
                    GovernCommand::Release(release_cli) => {
                        release::run_release_cli(&store, release_cli)
                    }
                },
                Command::Ledger(ledger_cli) => match ledger_cli.command {
                    LedgerCommand::Version(version_cli) => {
                        version::run_version_cli(&store, &cfg.default_actor, version_cli)
                    }
                    LedgerCommand::Quality(quality_cli) => {
                        quality::run_quality_cli(&store, quality_cli)
                    }
                },
                Command::Data(data_cli) => match data_cli.command {
                    DataCommand::Schema(schema_cli) => {
                        let mut schemas = std::collections::BTreeMap::new();
                        schemas.insert("schedule", schedule::schema());
                        schemas.insert("lifecycle", lifecycle::schema());
                        schemas.insert("approval", approval::schema());
                        schemas.insert("version", version::schema());
                        schemas.insert("quality", quality::schema());
                        schemas.insert("change", change::schema());
                        schemas.insert("freeze", freeze::schema());
                        schemas.insert("release", release::schema());
                        schemas.insert("broker", core::broker::schema());

                        let output = if let Some(sub) = schema_cli.subsystem {
                            schemas
                                .get(sub.as_str())
                                .cloned()
                                .unwrap_or(serde_json::json!({ "error": "subsystem not found" }))
                        } else {
                            serde_json::json!({
                                "schema_version": "1.0.0",
                                "subsystems": schemas
                            })
                        };
                        println!("{}", serde_json::to_string_pretty(&output).unwrap());
                        Ok(())
                    }
                    DataCommand::Broker(broker_cli) => match broker_cli.command {
                        BrokerCommand::Audit => {
                            let audit_log = store.root.join("broker.events.jsonl");
                            if audit_log.exists() {
                                let content = std::fs::read_to_string(audit_log)?;
                                println!("{}", content);
                            } else {
                                println!("No audit log found.");
                            }
                            Ok(())
                        }
                    },
                },
                _ => unreachable!(),
            }
        }
    }
}
