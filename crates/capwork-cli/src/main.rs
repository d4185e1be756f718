use anyhow::{Context, Result};
use capwork_core::logging::init_tracing;
use capwork_core::{AgentId, CapworkConfig, ConfigManager, DispatchError, TaskId};
use capwork_matcher::MatchCandidate;
use capwork_router::{RouterStats, TaskRouter};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tabled::{Table, Tabled};

mod scenario;

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "capwork")]
#[command(about = "capwork - capability-aware task dispatch simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (pretty, json)
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    output: OutputFormat,

    /// Config file (defaults to ./.capwork.toml, then ~/.capwork/config.toml)
    #[arg(short, long, global = true, env = "CAPWORK_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario: assign every task, optionally complete some
    Simulate {
        /// Scenario TOML file with [[agents]] and [[tasks]]
        scenario: PathBuf,

        /// Complete this many of the earliest assignments afterwards
        #[arg(long, default_value = "0")]
        complete: usize,
    },

    /// Rank agents in a scenario for a set of skills
    Match {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Required skill (repeatable)
        #[arg(short, long = "skill", required = true)]
        skills: Vec<String>,

        /// Minimum proficiency (defaults to routing.min_proficiency)
        #[arg(long)]
        min_proficiency: Option<u8>,
    },

    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        #[arg(long, default_value = ".capwork.toml")]
        path: PathBuf,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Tabled, Serialize)]
struct AssignmentRow {
    task: String,
    capability: String,
    outcome: String,
    agent: String,
}

#[derive(Tabled, Serialize)]
struct CandidateRow {
    agent: String,
    total: String,
    proficiency: String,
    availability: String,
    quality: String,
    load: String,
    matched: String,
}

impl From<&MatchCandidate> for CandidateRow {
    fn from(c: &MatchCandidate) -> Self {
        Self {
            agent: c.agent_id.to_string(),
            total: format!("{:.3}", c.total_score),
            proficiency: format!("{:.3}", c.proficiency_score),
            availability: format!("{:.3}", c.availability_score),
            quality: format!("{:.3}", c.quality_score),
            load: format!("{:.3}", c.load_score),
            matched: c.matched_skills.join(", "),
        }
    }
}

#[derive(Serialize)]
struct SimulationReport {
    assignments: Vec<AssignmentRow>,
    completed: Vec<String>,
    queue_depth: usize,
    stats: RouterStats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::load()?,
    };
    let mut config = manager.config().clone();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Simulate { scenario, complete } => {
            simulate(&config, &scenario, complete, cli.output)
        }
        Commands::Match {
            scenario,
            skills,
            min_proficiency,
        } => rank(&config, &scenario, &skills, min_proficiency, cli.output),
        Commands::Config(ConfigCommands::Init { path }) => {
            ConfigManager::create_default_config(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} {}", "Wrote".green().bold(), path.display());
            Ok(())
        }
        Commands::Config(ConfigCommands::Show) => {
            if let Some(path) = manager.config_path() {
                println!("# loaded from {}", path.display());
            }
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn simulate(
    config: &CapworkConfig,
    path: &Path,
    complete: usize,
    output: OutputFormat,
) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let router = scenario.build_router(config)?;
    info!(
        "Simulating {} agents and {} tasks from {}",
        scenario.agents.len(),
        scenario.tasks.len(),
        path.display()
    );

    let mut rows = Vec::new();
    let mut assigned: Vec<TaskId> = Vec::new();
    for task in scenario.tasks() {
        let task_id = task.id.clone();
        let capability = task.required_capability.clone();
        let (outcome, agent) = match router.assign_task(task) {
            Ok(agent) => {
                assigned.push(task_id.clone());
                ("assigned".to_string(), agent.to_string())
            }
            Err(DispatchError::NoAgentAvailable { .. }) => {
                ("queued (no agent)".to_string(), "-".to_string())
            }
            Err(DispatchError::TaskQueued { .. }) => {
                ("queued (saturated)".to_string(), "-".to_string())
            }
            Err(e) => {
                debug!("Task {} rejected: {}", task_id, e);
                (format!("rejected: {}", e), "-".to_string())
            }
        };
        rows.push(AssignmentRow {
            task: task_id.to_string(),
            capability,
            outcome,
            agent,
        });
    }

    let completed: Vec<String> = assigned
        .iter()
        .take(complete)
        .filter(|id| router.complete_task(id).is_some())
        .map(|id| id.to_string())
        .collect();

    // drained tasks changed owner; refresh the rows from router state
    for row in rows.iter_mut() {
        if let Some(task) = router.get_task(&TaskId::from(row.task.as_str())) {
            row.outcome = task.status.to_string();
            row.agent = task
                .assigned_agent
                .as_ref()
                .map(AgentId::to_string)
                .unwrap_or_else(|| "-".to_string());
        }
    }

    let report = SimulationReport {
        assignments: rows,
        completed,
        queue_depth: router.get_queue_depth(None),
        stats: router.stats(),
    };

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => print_report(&router, &report),
    }
    Ok(())
}

fn print_report(router: &TaskRouter, report: &SimulationReport) {
    println!("{}", Table::new(&report.assignments));
    if !report.completed.is_empty() {
        println!("{} {}", "Completed:".bold(), report.completed.join(", "));
    }
    for agent_id in router.registry().agent_ids() {
        if let Some(agent) = router.registry().get_agent(&agent_id) {
            println!(
                "  {} {}/{} ({})",
                agent_id.to_string().cyan(),
                agent.current_wip,
                agent.wip_limit,
                agent.status
            );
        }
    }
    println!("{} {}", "Queue depth:".bold(), report.queue_depth);
    if report.stats.backpressure_active {
        println!("{}", "Backpressure ACTIVE".red().bold());
    } else {
        println!("{}", "Backpressure inactive".green());
    }
}

fn rank(
    config: &CapworkConfig,
    path: &Path,
    skills: &[String],
    min_proficiency: Option<u8>,
    output: OutputFormat,
) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let router = scenario.build_router(config)?;
    let min = min_proficiency.unwrap_or(config.routing.min_proficiency);
    let candidates = router.match_candidates(skills, min);

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&candidates)?),
        OutputFormat::Pretty => {
            if candidates.is_empty() {
                println!("{}", "No matching agents".yellow());
            } else {
                let rows: Vec<CandidateRow> = candidates.iter().map(CandidateRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}
