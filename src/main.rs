mod arena;
mod board;
mod engine;
mod error;
mod heuristic;
mod policy;
mod server;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use crate::arena::{run_match, AgentKind, MatchConfig};
use crate::engine::Cutoff;
use crate::error::Result;
use crate::heuristic::Preset;
use crate::policy::PolicyConfig;
use crate::server::{serve, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, global = true, default_value = "info")]
    log_level: log::Level,
    #[command(flatten)]
    search: SearchArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// JSON file with policy settings; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    depth: Option<i32>,
    #[arg(long, global = true)]
    opening_plies: Option<u32>,
    #[arg(long, global = true, value_enum)]
    heuristic: Option<Preset>,
    #[arg(long, global = true, value_enum)]
    cutoff: Option<Cutoff>,
}

impl SearchArgs {
    fn policy(&self) -> Result<PolicyConfig> {
        let mut policy = match &self.config {
            Some(path) => PolicyConfig::from_file(path)?,
            None => PolicyConfig::default(),
        };
        if let Some(depth) = self.depth { policy.search_depth = depth; }
        if let Some(plies) = self.opening_plies { policy.opening_plies = plies; }
        if let Some(heuristic) = self.heuristic { policy.heuristic = heuristic; }
        if let Some(cutoff) = self.cutoff { policy.cutoff = cutoff; }
        Ok(policy)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play against websocket clients
    Serve {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 999)]
        port: u16,
        #[arg(long, default_value_t = 150)]
        time_limit_ms: u64,
    },
    /// Pit the engine against another agent
    Play {
        #[arg(long, value_enum, default_value_t = Opponent::Greedy)]
        opponent: Opponent,
        /// Heuristic used when the opponent also searches
        #[arg(long, value_enum, default_value_t = Preset::Baseline)]
        opponent_heuristic: Preset,
        #[arg(long, default_value_t = 10)]
        rounds: u32,
        #[arg(long, default_value_t = 150)]
        time_limit_ms: u64,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Opponent {
    Random,
    Greedy,
    Search,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(args.log_level)?;

    let policy = args.search.policy()?;
    info!("Policy: {:?}", policy);

    match args.command {
        Command::Serve { host, port, time_limit_ms } => {
            let config = ServerConfig { policy, time_limit: Duration::from_millis(time_limit_ms) };
            serve(format!("{}:{}", host, port), config).await
        }
        Command::Play { opponent, opponent_heuristic, rounds, time_limit_ms, seed } => {
            let opponent = match opponent {
                Opponent::Random => AgentKind::Random,
                Opponent::Greedy => AgentKind::Greedy,
                Opponent::Search => AgentKind::Search(PolicyConfig { heuristic: opponent_heuristic, ..policy }),
            };
            let config = MatchConfig {
                rounds,
                time_limit: Duration::from_millis(time_limit_ms),
                seed: seed.unwrap_or_else(rand::random),
            };
            let summary = tokio::task::block_in_place(|| run_match([AgentKind::Search(policy), opponent], &config));
            info!("Engine won {} of {} games ({} forfeits)", summary.wins[0], summary.games, summary.forfeits[0]);
            println!("{}", serde_json::to_string(&summary)?);
            Ok(())
        }
    }
}
