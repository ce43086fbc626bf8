use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::board::{Action, Board};
use crate::engine::{GameState, Player};
use crate::policy::{Agent, GreedyPlayer, PolicyConfig, RandomPlayer, SearchPlayer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentKind {
    Random,
    Greedy,
    Search(PolicyConfig),
}

impl AgentKind {
    fn build(self, player: Player, seed: u64) -> Box<dyn Agent<Board>> {
        let rng = StdRng::seed_from_u64(seed);
        match self {
            AgentKind::Random => Box::new(RandomPlayer::new(rng)),
            AgentKind::Greedy => Box::new(GreedyPlayer::new(player)),
            AgentKind::Search(config) => Box::new(SearchPlayer::new(player, config, rng)),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MatchConfig {
    /// Games to play; the first mover alternates between the two agents.
    pub rounds: u32,
    pub time_limit: Duration,
    pub seed: u64,
}

/// Counts are indexed by agent, not by seat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub games: u32,
    pub wins: [u32; 2],
    pub forfeits: [u32; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Outcome {
    winner: Player,
    forfeit: bool,
    plies: u32,
}

pub fn run_match(agents: [AgentKind; 2], config: &MatchConfig) -> MatchSummary {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut summary = MatchSummary::default();
    for round in 0..config.rounds {
        // seat Player::One goes to agent `first`
        let first = (round % 2) as usize;
        let seats = [agents[first], agents[1 - first]];
        let outcome = play_game(seats, config.time_limit, &mut rng);
        let winner = (first + outcome.winner.index()) % 2;
        summary.games += 1;
        summary.wins[winner] += 1;
        if outcome.forfeit {
            summary.forfeits[1 - winner] += 1;
        }
        info!("game {}: agent {} ({:?}) won after {} plies{}",
            round + 1, winner, agents[winner], outcome.plies,
            if outcome.forfeit { " by forfeit" } else { "" });
    }
    summary
}

fn play_game(seats: [AgentKind; 2], time_limit: Duration, rng: &mut StdRng) -> Outcome {
    let mut board = Board::new();
    loop {
        let player = board.player();
        if board.terminal_test() {
            return Outcome { winner: player.opponent(), forfeit: false, plies: board.ply_count() };
        }
        let kind = seats[player.index()];
        let seed: u64 = rng.gen();
        let action = timed_action(move || kind.build(player, seed), &board, time_limit);
        match action {
            Some(action) if board.actions().contains(&action) => board = board.result(&action),
            other => {
                warn!("player {:?} forfeits at ply {}: delivered {:?}", player, board.ply_count(), other);
                return Outcome { winner: player.opponent(), forfeit: true, plies: board.ply_count() };
            }
        }
    }
}

/// Run an agent on its own thread and keep the last action it delivers
/// before `time_limit`. The worker is left to finish on its own.
fn timed_action<F>(make_agent: F, board: &Board, time_limit: Duration) -> Option<Action>
where
    F: FnOnce() -> Box<dyn Agent<Board>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Action>();
    let state = board.clone();
    thread::spawn(move || {
        let mut agent = make_agent();
        let mut sink = tx;
        if let Err(e) = agent.get_action(&state, &mut sink) {
            debug!("agent gave up at ply {}: {}", state.ply_count(), e);
        }
    });

    let deadline = Instant::now() + time_limit;
    let mut last = None;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(action) => last = Some(action),
            Err(RecvTimeoutError::Timeout) => {
                warn!("agent still running at ply {} after {:?}; abandoning its worker",
                    board.ply_count(), time_limit);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    last
}
