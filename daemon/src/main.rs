//! Ballot daemon: run a node or administer elections from the command line.
//!
//! Every command opens the same data directory. Output of administrative
//! commands is pretty-printed JSON on stdout.

use std::path::PathBuf;

use anyhow::{bail, Context};
use ballot_node::{init_logging, BallotNode, LedgerKind, NodeConfig};
use ballot_types::{CandidateId, CandidateSpec, ElectionId, ElectionStatus, Timestamp, Voter, VoterId, VoterRole};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "ballot-daemon", about = "Vote ledger and election lifecycle daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "BALLOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConfigOverrides {
    /// Data directory holding the store and the local vote log.
    #[arg(long, env = "BALLOT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Ledger backend: "local" or "http".
    #[arg(long, env = "BALLOT_LEDGER")]
    ledger: Option<String>,

    /// Base URL of the external ledger.
    #[arg(long, env = "BALLOT_LEDGER_URL")]
    ledger_url: Option<String>,

    #[arg(long, env = "BALLOT_LEDGER_TIMEOUT_MS")]
    ledger_timeout_ms: Option<u64>,

    /// Secret key for voter identity hashing.
    #[arg(long, env = "BALLOT_VOTER_HASH_KEY", hide_env_values = true)]
    voter_hash_key: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BALLOT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BALLOT_LOG_FORMAT")]
    log_format: Option<String>,

    /// Report Prometheus metrics on shutdown.
    #[arg(long, env = "BALLOT_ENABLE_METRICS")]
    metrics: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node with its background tasks.
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Create, inspect, close and finalize elections.
    Election {
        #[command(subcommand)]
        action: ElectionAction,
    },
    /// Register and inspect voters.
    Voter {
        #[command(subcommand)]
        action: VoterAction,
    },
    /// Cast votes.
    Vote {
        #[command(subcommand)]
        action: VoteAction,
    },
    /// Repair ballot rows against the ledger and report conflicts.
    Sweep,
    /// Inspect the local vote log.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    /// Run until SIGINT/SIGTERM.
    Run,
}

#[derive(Subcommand)]
enum ElectionAction {
    Create {
        #[arg(long)]
        name: String,
        /// End of the voting window, unix seconds.
        #[arg(long, conflicts_with = "duration_secs", required_unless_present = "duration_secs")]
        end_time: Option<u64>,
        /// Length of the voting window from now, in seconds.
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Candidate as "name" or "name:party". Repeat for each candidate.
        #[arg(long = "candidate", required = true)]
        candidates: Vec<String>,
    },
    List {
        /// Only elections with this status.
        #[arg(long)]
        status: Option<ElectionStatus>,
    },
    Show {
        id: ElectionId,
    },
    Close {
        id: ElectionId,
    },
    Finalize {
        id: ElectionId,
    },
    Results {
        id: ElectionId,
    },
}

#[derive(Subcommand)]
enum VoterAction {
    Register {
        id: VoterId,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "voter")]
        role: VoterRole,
    },
    Show {
        id: VoterId,
    },
    /// Every ballot of a voter with its status.
    Ballots {
        id: VoterId,
    },
}

#[derive(Subcommand)]
enum VoteAction {
    Cast {
        #[arg(long)]
        voter: VoterId,
        #[arg(long)]
        election: ElectionId,
        #[arg(long)]
        candidate: CandidateId,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Walk the hash chain of the local vote log.
    Verify,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path_str = path.to_str().context("config path is not valid UTF-8")?;
            NodeConfig::from_toml_file(path_str)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => NodeConfig::default(),
    };

    let o = &cli.overrides;
    if let Some(dir) = &o.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(kind) = &o.ledger {
        config.ledger = match kind.trim().to_ascii_lowercase().as_str() {
            "local" => LedgerKind::Local,
            "http" => LedgerKind::Http,
            other => bail!("unknown ledger backend '{other}'"),
        };
    }
    if let Some(url) = &o.ledger_url {
        config.ledger_url = url.clone();
    }
    if let Some(ms) = o.ledger_timeout_ms {
        config.ledger_timeout_ms = ms;
    }
    if let Some(key) = &o.voter_hash_key {
        config.voter_hash_key = key.clone();
    }
    if let Some(level) = &o.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &o.log_format {
        config.log_format = format.clone();
    }
    config.enable_metrics |= o.metrics;
    Ok(config)
}

fn parse_candidate(raw: &str) -> CandidateSpec {
    match raw.split_once(':') {
        Some((name, party)) => CandidateSpec::new(name.trim(), party.trim()),
        None => CandidateSpec::new(raw.trim(), ""),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct LedgerVerification {
    events: u64,
    head: String,
    intact: bool,
    broken_at: Option<u64>,
    missing: Vec<u64>,
}

async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    let enable_metrics = config.enable_metrics;
    let mut node = BallotNode::open(config)?;
    node.start().await?;

    node.shutdown_controller().wait_for_signal().await;
    tracing::info!("shutdown signal received, stopping node");

    if enable_metrics {
        node.refresh_metrics();
        tracing::info!(metrics = %node.metrics().encode()?, "final metrics snapshot");
    }
    node.shutdown().await?;
    tracing::info!("ballot daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    config.validate()?;
    init_logging(config.log_format()?, &config.log_level)?;

    if let Command::Node { action: NodeAction::Run } = cli.command {
        return run_node(config).await;
    }

    let node = BallotNode::open(config)?;
    let engine = node.engine();

    match cli.command {
        Command::Node { .. } => {}
        Command::Election { action } => match action {
            ElectionAction::Create {
                name,
                end_time,
                duration_secs,
                candidates,
            } => {
                let end = match (end_time, duration_secs) {
                    (Some(secs), _) => Timestamp::new(secs),
                    (None, Some(secs)) => Timestamp::now().plus_secs(secs),
                    (None, None) => bail!("either --end-time or --duration-secs is required"),
                };
                let specs: Vec<CandidateSpec> =
                    candidates.iter().map(|c| parse_candidate(c)).collect();
                print_json(&node.create_election(&name, end, &specs)?)?;
            }
            ElectionAction::List { status } => {
                let elections = match status {
                    Some(status) => engine.list_by_status(status)?,
                    None => engine.list_elections()?,
                };
                print_json(&elections)?;
            }
            ElectionAction::Show { id } => print_json(&engine.election_details(id)?)?,
            ElectionAction::Close { id } => print_json(&node.close_election(id).await?)?,
            ElectionAction::Finalize { id } => print_json(&node.finalize(id).await?)?,
            ElectionAction::Results { id } => print_json(&engine.results(id)?)?,
        },
        Command::Voter { action } => match action {
            VoterAction::Register { id, name, role } => {
                let ballots = engine.register_voter(&Voter { id, name, role })?;
                print_json(&serde_json::json!({ "voter_id": id, "ballots_created": ballots }))?;
            }
            VoterAction::Show { id } => print_json(&engine.get_voter(id)?)?,
            VoterAction::Ballots { id } => print_json(&engine.voter_ballots(id)?)?,
        },
        Command::Vote { action } => match action {
            VoteAction::Cast {
                voter,
                election,
                candidate,
            } => print_json(&node.cast_vote(voter, election, candidate).await?)?,
        },
        Command::Sweep => print_json(&node.sweep().await?)?,
        Command::Ledger { action } => match action {
            LedgerAction::Verify => {
                let Some(report) = node.verify_ledger()? else {
                    bail!("the configured ledger is external; only the local vote log can be verified");
                };
                let intact = report.is_intact();
                print_json(&LedgerVerification {
                    events: report.events,
                    head: report.head.to_string(),
                    intact,
                    broken_at: report.broken_at.map(|i| i.get()),
                    missing: report.missing.iter().map(|i| i.get()).collect(),
                })?;
                if !intact {
                    bail!("vote log chain verification failed");
                }
            }
        },
    }

    node.sync()?;
    Ok(())
}
