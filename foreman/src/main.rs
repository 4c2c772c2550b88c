//! Checklist-driven loop for an autonomous coding agent.
//!
//! Drives an external coding agent through `feature_list.json` one feature
//! at a time, recording every session in `PROGRESS.md`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use foreman::core::selector::next_feature;
use foreman::exit_codes;
use foreman::io::config::load_config;
use foreman::io::feature_store::FeatureStore;
use foreman::io::init::{InitOptions, init_project};
use foreman::io::ledger::ProgressLedger;
use foreman::io::paths::ProjectPaths;
use foreman::io::prompt::{PromptInputs, render_session_prompt};
use foreman::io::session::CodexSessionRunner;
use foreman::logging;
use foreman::looping::{LoopLimits, LoopStop, run_loop};
use foreman::status::{render_human as render_status, status_report};
use foreman::validate::{render_human as render_validation, validate_checklist};

#[derive(Parser)]
#[command(
    name = "foreman",
    version,
    about = "Checklist-driven loop for an autonomous coding agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold feature_list.json, PROGRESS.md, and foreman.toml.
    Init {
        /// Overwrite existing scaffolding.
        #[arg(short, long)]
        force: bool,
    },
    /// Run sessions until the checklist completes or a stop condition fires.
    Run {
        /// Select and print the next session without executing the agent.
        #[arg(long)]
        dry_run: bool,
        /// Stop after this many sessions.
        #[arg(long, value_name = "N")]
        max_sessions: Option<u32>,
        /// Stop after this many consecutive failed sessions.
        #[arg(long, value_name = "N")]
        max_failures: Option<u32>,
    },
    /// Report checklist progress and cumulative token usage.
    Status {
        #[arg(long)]
        json: bool,
        /// Exit 2 when features remain (for polling loops).
        #[arg(long)]
        check: bool,
    },
    /// Validate feature_list.json structure and invariants.
    Validate {
        #[arg(long)]
        json: bool,
    },
    /// Set a feature's pass/fail flag.
    Update {
        id: String,
        status: PassFlag,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PassFlag {
    Pass,
    Fail,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Run {
            dry_run,
            max_sessions,
            max_failures,
        } => cmd_run(&root, dry_run, max_sessions, max_failures),
        Command::Status { json, check } => cmd_status(&root, json, check),
        Command::Validate { json } => cmd_validate(&root, json),
        Command::Update { id, status, json } => cmd_update(&root, &id, status, json),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_project(root, &InitOptions { force })?;
    println!("Initialized {}", paths.feature_list_path.display());
    println!("Initialized {}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    root: &Path,
    dry_run: bool,
    max_sessions: Option<u32>,
    max_failures: Option<u32>,
) -> Result<i32> {
    let paths = ProjectPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let mut store = FeatureStore::new(&paths.feature_list_path);
    let mut ledger = ProgressLedger::new(&paths.ledger_path);

    if dry_run {
        let list = store.load()?;
        let Some(feature) = next_feature(&list).cloned() else {
            println!("All features passing; nothing to run.");
            return Ok(exit_codes::OK);
        };
        let session_id = ledger.parse()?.next_session_id();
        let prompt = render_session_prompt(&PromptInputs::new(&list, &feature))?;
        println!(
            "Dry run: would run session {} on [{}] ({})",
            session_id,
            feature.id,
            feature.priority.as_str()
        );
        println!();
        println!("{prompt}");
        return Ok(exit_codes::OK);
    }

    let runner = CodexSessionRunner::from_config(&cfg.agent.command);
    let limits = LoopLimits {
        max_failures: max_failures.unwrap_or(cfg.max_failures_default),
        max_sessions,
    };

    let outcome = run_loop(
        &paths,
        &mut store,
        &mut ledger,
        &runner,
        &cfg,
        &limits,
        |step| {
            println!(
                "session {} [{}] {} ({:.1}s, {} tokens)",
                step.session_id,
                step.feature_id,
                step.kind.as_str(),
                step.duration_ms as f64 / 1000.0,
                step.tokens.total()
            );
        },
    )?;

    match outcome.stop {
        LoopStop::Complete => {
            println!(
                "All features passing after {} session(s).",
                outcome.sessions_run
            );
            Ok(exit_codes::OK)
        }
        LoopStop::Stuck {
            consecutive_failures,
            max_failures,
        } => {
            eprintln!(
                "Stopped: {consecutive_failures} consecutive failed session(s) \
                 (limit {max_failures})."
            );
            Ok(exit_codes::ERROR)
        }
        LoopStop::SessionLimit { max_sessions, .. } => {
            eprintln!("Stopped after reaching the session limit ({max_sessions}).");
            Ok(exit_codes::ERROR)
        }
    }
}

fn cmd_status(root: &Path, json: bool, check: bool) -> Result<i32> {
    let paths = ProjectPaths::new(root);
    let mut store = FeatureStore::new(&paths.feature_list_path);
    let mut ledger = ProgressLedger::new(&paths.ledger_path);
    let report = status_report(&mut store, &mut ledger)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_status(&report));
    }

    if check && !report.is_complete {
        if let Some(next) = &report.next_feature {
            eprintln!("Continue to: {} - {}", next.id, next.description);
        }
        return Ok(exit_codes::REMAINING);
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path, json: bool) -> Result<i32> {
    let paths = ProjectPaths::new(root);
    let report = validate_checklist(&paths.feature_list_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_validation(&report));
    }

    if report.valid {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::ERROR)
    }
}

fn cmd_update(root: &Path, id: &str, status: PassFlag, json: bool) -> Result<i32> {
    let paths = ProjectPaths::new(root);
    let mut store = FeatureStore::new(&paths.feature_list_path);
    let passes = matches!(status, PassFlag::Pass);
    let outcome = store.set_passes(id, passes)?;

    let status_str = if passes { "passing" } else { "failing" };
    if json {
        let payload = serde_json::json!({
            "changed": outcome.changed,
            "featureId": outcome.feature.id,
            "status": status_str,
            "passing": outcome.passing,
            "total": outcome.total,
        });
        println!("{payload}");
    } else if outcome.changed {
        println!("Feature: {}", outcome.feature.id);
        println!("Status: now {status_str}");
        println!("Progress: {}/{}", outcome.passing, outcome.total);
    } else {
        println!("Feature '{}' is already {status_str}", outcome.feature.id);
    }
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_flags() {
        let cli = Cli::parse_from([
            "foreman",
            "run",
            "--dry-run",
            "--max-sessions",
            "5",
            "--max-failures",
            "2",
        ]);
        match cli.command {
            Command::Run {
                dry_run,
                max_sessions,
                max_failures,
            } => {
                assert!(dry_run);
                assert_eq!(max_sessions, Some(5));
                assert_eq!(max_failures, Some(2));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_update_pass() {
        let cli = Cli::parse_from(["foreman", "update", "core-1", "pass"]);
        match cli.command {
            Command::Update { id, status, json } => {
                assert_eq!(id, "core-1");
                assert!(matches!(status, PassFlag::Pass));
                assert!(!json);
            }
            _ => panic!("expected update command"),
        }
    }

    #[test]
    fn parse_status_check() {
        let cli = Cli::parse_from(["foreman", "status", "--check", "--json"]);
        match cli.command {
            Command::Status { json, check } => {
                assert!(json);
                assert!(check);
            }
            _ => panic!("expected status command"),
        }
    }
}
