use std::fmt;

use bitvec::prelude::*;
use lazy_static::lazy_static;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::{GameState, Mobility, Player};
use crate::error::{Error, Result};

pub const WIDTH: usize = 11;
pub const HEIGHT: usize = 9;
const CELLS: usize = WIDTH * HEIGHT;
pub type BitBoard = BitArr!(for CELLS, in u64, Lsb0);
// cells are indexed row-major from the top left corner: idx = y * WIDTH + x
// a set bit marks a cell nobody has visited yet

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[usize; 2]", into = "[usize; 2]")]
pub struct Cell {
    x: u8,
    y: u8,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Option<Self> {
        (x < WIDTH && y < HEIGHT).then(|| Self { x: x as u8, y: y as u8 })
    }

    fn from_index(idx: usize) -> Self {
        Self { x: (idx % WIDTH) as u8, y: (idx / WIDTH) as u8 }
    }

    pub fn index(self) -> usize {
        self.y as usize * WIDTH + self.x as usize
    }

    pub fn x(self) -> usize {
        self.x as usize
    }

    pub fn y(self) -> usize {
        self.y as usize
    }

    fn jump(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        let x = self.x as i32 + dx;
        let y = self.y as i32 + dy;
        if x < 0 || y < 0 {
            return None;
        }
        Self::new(x as usize, y as usize)
    }
}

impl TryFrom<[usize; 2]> for Cell {
    type Error = String;

    fn try_from([x, y]: [usize; 2]) -> std::result::Result<Self, Self::Error> {
        Cell::new(x, y).ok_or_else(|| format!("cell ({}, {}) is off the {}x{} board", x, y, WIDTH, HEIGHT))
    }
}

impl From<Cell> for [usize; 2] {
    fn from(cell: Cell) -> Self {
        [cell.x(), cell.y()]
    }
}

/// The eight knight jumps, clockwise from north-north-east.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Nne,
    Ene,
    Ese,
    Sse,
    Ssw,
    Wsw,
    Wnw,
    Nnw,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Nne,
        Direction::Ene,
        Direction::Ese,
        Direction::Sse,
        Direction::Ssw,
        Direction::Wsw,
        Direction::Wnw,
        Direction::Nnw,
    ];

    fn offset(self) -> (i32, i32) {
        match self {
            Direction::Nne => (1, -2),
            Direction::Ene => (2, -1),
            Direction::Ese => (2, 1),
            Direction::Sse => (1, 2),
            Direction::Ssw => (-1, 2),
            Direction::Wsw => (-2, 1),
            Direction::Wnw => (-2, -1),
            Direction::Nnw => (-1, -2),
        }
    }
}

lazy_static! {
    static ref KNIGHT_TARGETS: Vec<[Option<Cell>; 8]> = {
        (0..CELLS).map(|idx| {
            let cell = Cell::from_index(idx);
            Direction::ALL.map(|direction| cell.jump(direction))
        }).collect()
    };
}

/// A player places anywhere on their first turn and jumps like a knight after.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Place(Cell),
    Jump(Direction),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    open: BitBoard,
    locs: [Option<Cell>; 2],
    ply_count: u32,
}

impl Board {
    pub fn new() -> Self {
        let mut open: BitBoard = bitarr!(u64, Lsb0; 0; CELLS);
        open[..CELLS].fill(true);
        Self { open, locs: [None, None], ply_count: 0 }
    }

    /// Parse a position drawn as `HEIGHT` rows of `WIDTH` characters:
    /// `.` open, `#` closed, `1`/`2` the players' pieces.
    pub fn from_ascii(rows: &[&str], ply_count: u32) -> Result<Self> {
        if rows.len() != HEIGHT {
            return Err(Error::InvalidBoard(format!("expected {} rows, got {}", HEIGHT, rows.len())));
        }
        let mut board = Self { open: bitarr!(u64, Lsb0; 0; CELLS), locs: [None, None], ply_count };
        for (y, row) in rows.iter().enumerate() {
            let chars: Vec<char> = row.chars().collect();
            if chars.len() != WIDTH {
                return Err(Error::InvalidBoard(format!("row {} has {} cells, expected {}", y, chars.len(), WIDTH)));
            }
            for (x, ch) in chars.into_iter().enumerate() {
                let idx = y * WIDTH + x;
                let player = match ch {
                    '.' => { board.open.set(idx, true); continue; }
                    '#' => continue,
                    '1' => Player::One,
                    '2' => Player::Two,
                    _ => return Err(Error::InvalidBoard(format!("unexpected '{}' at ({}, {})", ch, x, y))),
                };
                if board.locs[player.index()].replace(Cell::from_index(idx)).is_some() {
                    return Err(Error::InvalidBoard(format!("player {:?} appears twice", player)));
                }
            }
        }
        // each player places on their first ply, so ply_count fixes who is on the board
        for player in [Player::One, Player::Two] {
            let placed = board.locs[player.index()].is_some();
            if placed != (ply_count as usize > player.index()) {
                return Err(Error::InvalidBoard(format!("player {:?} {} at ply {}",
                    player, if placed { "placed too early" } else { "missing" }, ply_count)));
            }
        }
        Ok(board)
    }

    pub fn is_open(&self, cell: Cell) -> bool {
        self.open[cell.index()]
    }

    fn open_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.open[..CELLS].iter_ones().map(Cell::from_index)
    }

    fn open_targets(&self, cell: Cell) -> impl Iterator<Item = (Direction, Cell)> + '_ {
        Direction::ALL.into_iter()
            .zip(KNIGHT_TARGETS[cell.index()])
            .filter_map(|(direction, target)| target.map(|t| (direction, t)))
            .filter(move |(_, target)| self.is_open(*target))
    }

    fn destination(&self, action: &Action) -> Option<Cell> {
        match *action {
            Action::Place(cell) => Some(cell),
            Action::Jump(direction) => self.locs[self.player().index()]?.jump(direction),
        }
    }

    /// Checked transition for actions that did not come from `actions()`.
    pub fn apply(&self, action: &Action) -> Result<Self> {
        if !self.actions().contains(action) {
            return Err(Error::IllegalAction(format!("{:?} for player {:?}", action, self.player())));
        }
        Ok(self.result(action))
    }

    /// The winner once the player to move is stuck.
    pub fn winner(&self) -> Option<Player> {
        self.terminal_test().then(|| self.player().opponent())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState for Board {
    type Action = Action;

    fn actions(&self) -> Vec<Action> {
        match self.loc(self.player()) {
            None => self.open_cells().map(Action::Place).collect(),
            Some(cell) => self.open_targets(cell).map(|(direction, _)| Action::Jump(direction)).collect(),
        }
    }

    fn result(&self, action: &Action) -> Self {
        let mut board = self.clone();
        match self.destination(action) {
            Some(cell) => {
                board.open.set(cell.index(), false);
                board.locs[self.player().index()] = Some(cell);
            }
            None => warn!("{:?} leads nowhere for player {:?}; passing", action, self.player()),
        }
        board.ply_count += 1;
        board
    }

    fn terminal_test(&self) -> bool {
        self.mobility(self.player()) == 0
    }

    fn utility(&self, player: Player) -> f64 {
        if !self.terminal_test() {
            0.0
        } else if player == self.player() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    }

    fn player(&self) -> Player {
        Player::from_ply(self.ply_count)
    }

    fn ply_count(&self) -> u32 {
        self.ply_count
    }
}

impl Mobility for Board {
    type Location = Cell;

    fn loc(&self, player: Player) -> Option<Cell> {
        self.locs[player.index()]
    }

    fn liberties(&self, loc: Option<Cell>) -> Vec<Cell> {
        match loc {
            None => self.open_cells().collect(),
            Some(cell) => self.open_targets(cell).map(|(_, target)| target).collect(),
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let idx = y * WIDTH + x;
                let ch = if self.locs[0].map(Cell::index) == Some(idx) {
                    '1'
                } else if self.locs[1].map(Cell::index) == Some(idx) {
                    '2'
                } else if self.open[idx] {
                    '.'
                } else {
                    '#'
                };
                write!(f, "{}", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
