use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::{Mobility, Player};

/// Scores a non-terminal state cut off by the depth limit.
pub trait Evaluator<S> {
    fn evaluate(&self, state: &S, depth: i32, player: Player) -> f64;
}

/// Multiplier applied to a liberty count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weight {
    Constant(f64),
    /// `max(1, offset + scale * depth)`
    Depth { offset: i32, scale: i32 },
}

impl Weight {
    pub fn at(&self, depth: i32) -> f64 {
        match *self {
            Weight::Constant(w) => w,
            Weight::Depth { offset, scale } => offset.saturating_add(scale.saturating_mul(depth)).max(1) as f64,
        }
    }
}

/// Weighted mobility difference: `own * own_liberties - opp * opp_liberties`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heuristic {
    pub own: Weight,
    pub opp: Weight,
}

impl Heuristic {
    pub fn new(own: Weight, opp: Weight) -> Self {
        Self { own, opp }
    }

    pub fn score(&self, own_liberties: usize, opp_liberties: usize, depth: i32) -> f64 {
        self.own.at(depth) * own_liberties as f64 - self.opp.at(depth) * opp_liberties as f64
    }
}

impl Default for Heuristic {
    fn default() -> Self {
        Preset::default().into()
    }
}

impl<S: Mobility> Evaluator<S> for Heuristic {
    fn evaluate(&self, state: &S, depth: i32, player: Player) -> f64 {
        let own_liberties = state.mobility(player);
        let opp_liberties = state.mobility(player.opponent());
        self.score(own_liberties, opp_liberties, depth)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// own - opp
    Baseline,
    /// 2 * own - opp
    Defensive,
    /// own - 2 * opp
    Offensive,
    /// own - max(1, 4 - depth) * opp
    DefensiveToOffensive,
    /// own - max(1, depth) * opp
    #[default]
    OffensiveToDefensive,
}

impl From<Preset> for Heuristic {
    fn from(preset: Preset) -> Self {
        let one = Weight::Constant(1.0);
        let two = Weight::Constant(2.0);
        match preset {
            Preset::Baseline => Heuristic::new(one, one),
            Preset::Defensive => Heuristic::new(two, one),
            Preset::Offensive => Heuristic::new(one, two),
            Preset::DefensiveToOffensive => Heuristic::new(one, Weight::Depth { offset: 4, scale: -1 }),
            Preset::OffensiveToDefensive => Heuristic::new(one, Weight::Depth { offset: 0, scale: 1 }),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "baseline" => Ok(Preset::Baseline),
            "defensive" => Ok(Preset::Defensive),
            "offensive" => Ok(Preset::Offensive),
            "defensive-to-offensive" => Ok(Preset::DefensiveToOffensive),
            "offensive-to-defensive" => Ok(Preset::OffensiveToDefensive),
            _ => Err(format!("unknown heuristic: {}", s)),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Baseline => "baseline",
            Preset::Defensive => "defensive",
            Preset::Offensive => "offensive",
            Preset::DefensiveToOffensive => "defensive-to-offensive",
            Preset::OffensiveToDefensive => "offensive-to-defensive",
        };
        f.write_str(name)
    }
}
