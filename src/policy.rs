use std::path::Path;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{AlphaBeta, Cutoff, GameState, Mobility, Player};
use crate::error::{Error, Result};
use crate::heuristic::{Heuristic, Preset};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Plies played at random before the search takes over.
    pub opening_plies: u32,
    pub search_depth: i32,
    pub heuristic: Preset,
    pub cutoff: Cutoff,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            opening_plies: 2,
            search_depth: 4,
            heuristic: Preset::OffensiveToDefensive,
            cutoff: Cutoff::Bound,
        }
    }
}

impl PolicyConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn phase(&self, ply_count: u32) -> Phase {
        if ply_count < self.opening_plies {
            Phase::Opening
        } else {
            Phase::Searching { depth: self.search_depth }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Opening,
    Searching { depth: i32 },
}

/// Where an agent publishes its candidate actions. The caller keeps the last one.
pub trait ActionSink<A> {
    fn put(&mut self, action: A) -> Result<()>;
}

impl<A> ActionSink<A> for Vec<A> {
    fn put(&mut self, action: A) -> Result<()> {
        self.push(action);
        Ok(())
    }
}

impl<A> ActionSink<A> for std::sync::mpsc::Sender<A> {
    fn put(&mut self, action: A) -> Result<()> {
        self.send(action).map_err(|_| Error::ChannelClosed)
    }
}

impl<A> ActionSink<A> for tokio::sync::mpsc::UnboundedSender<A> {
    fn put(&mut self, action: A) -> Result<()> {
        self.send(action).map_err(|_| Error::ChannelClosed)
    }
}

pub trait Agent<S: GameState> {
    fn get_action(&mut self, state: &S, sink: &mut dyn ActionSink<S::Action>) -> Result<()>;
}

/// Random placement for the opening plies, fixed-depth alpha-beta afterwards.
pub struct SearchPlayer<R> {
    player_id: Player,
    config: PolicyConfig,
    rng: R,
    /// Carried between turns for the driver; the search does not read it.
    pub context: Option<Value>,
}

impl<R: Rng> SearchPlayer<R> {
    pub fn new(player_id: Player, config: PolicyConfig, rng: R) -> Self {
        Self { player_id, config, rng, context: None }
    }
}

impl<S: Mobility, R: Rng> Agent<S> for SearchPlayer<R> {
    fn get_action(&mut self, state: &S, sink: &mut dyn ActionSink<S::Action>) -> Result<()> {
        let action = match self.config.phase(state.ply_count()) {
            Phase::Opening => state.actions().choose(&mut self.rng).cloned().ok_or(Error::NoLegalActions)?,
            Phase::Searching { depth } => {
                let mut engine = AlphaBeta::new(Heuristic::from(self.config.heuristic), self.config.cutoff);
                let action = engine.choose_action(state, depth, self.player_id)?;
                debug!("searched {} nodes at depth {}", engine.nodes(), depth);
                action
            }
        };
        debug!("player {:?} at ply {}: {:?}", self.player_id, state.ply_count(), action);
        sink.put(action)
    }
}

pub struct RandomPlayer<R> {
    rng: R,
}

impl<R: Rng> RandomPlayer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<S: GameState, R: Rng> Agent<S> for RandomPlayer<R> {
    fn get_action(&mut self, state: &S, sink: &mut dyn ActionSink<S::Action>) -> Result<()> {
        let action = state.actions().choose(&mut self.rng).cloned().ok_or(Error::NoLegalActions)?;
        sink.put(action)
    }
}

/// One-ply lookahead: move wherever it keeps the most liberties.
pub struct GreedyPlayer {
    player_id: Player,
}

impl GreedyPlayer {
    pub fn new(player_id: Player) -> Self {
        Self { player_id }
    }
}

impl<S: Mobility> Agent<S> for GreedyPlayer {
    fn get_action(&mut self, state: &S, sink: &mut dyn ActionSink<S::Action>) -> Result<()> {
        let mut best: Option<(S::Action, usize)> = None;
        for action in state.actions() {
            let score = state.result(&action).mobility(self.player_id);
            if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
                best = Some((action, score));
            }
        }
        let (action, _) = best.ok_or(Error::NoLegalActions)?;
        sink.put(action)
    }
}
