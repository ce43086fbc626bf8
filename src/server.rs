use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::board::{Action, Board};
use crate::engine::{GameState, Player};
use crate::error::{Error, Result};
use crate::policy::{Agent, PolicyConfig, SearchPlayer};

#[derive(Clone, Copy, Debug)]
pub struct ServerConfig {
    pub policy: PolicyConfig,
    /// How long the engine may search before its last delivered action is played.
    pub time_limit: Duration,
}

pub async fn serve(address: String, config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on: {}", address);

    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(async move {
            if let Err(e) = accept_connection(stream, config).await {
                error!("Connection closed with error: {}", e);
            }
        });
    }

    Ok(())
}

/// Optional starting position sent along with "start".
#[derive(Deserialize)]
struct Position {
    rows: Vec<String>,
    #[serde(default)]
    ply_count: u32,
}

impl Position {
    fn to_board(&self) -> Result<Board> {
        let rows: Vec<&str> = self.rows.iter().map(String::as_str).collect();
        Board::from_ascii(&rows, self.ply_count)
    }
}

struct Game {
    started: bool,
    human: Player,
    board: Board,
    config: ServerConfig,
    rng: StdRng,
}

impl Game {
    fn new(config: ServerConfig) -> Self {
        Self {
            started: false,
            human: Player::One,
            board: Board::new(),
            config,
            rng: StdRng::from_entropy(),
        }
    }
}

async fn accept_connection(stream: TcpStream, config: ServerConfig) -> Result<()> {
    let addr = stream.peer_addr()?;
    info!("Peer address: {}", addr);

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection: {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let mut game = Game::new(config);

    while let Some(raw_message) = read.next().await {
        match raw_message {
            Ok(text_message) => {
                if !text_message.is_text() && !text_message.is_binary() { continue; }
                match serde_json::from_slice::<Value>(&text_message.into_data()) {
                    Ok(data) => {
                        info!("Received: {}", data);
                        let response = match handle_message(&mut game, data).await {
                            Ok(resp) => resp,
                            Err(e) => {
                                error!("Error handling message: {}", e);
                                json!({ "error": e.to_string() })
                            }
                        };
                        let response_str = response.to_string();
                        write.send(Message::text(response_str.clone())).await?;
                        info!("Sent: {}", response_str);
                    },
                    Err(e) => { error!("Error parsing JSON: {}", e); }
                }
            }
            Err(e) => { error!("Error reading websocket message: {}", e); }
        }
    }

    Ok(())
}

async fn handle_message(game: &mut Game, data: Value) -> Result<Value> {
    let map = data.as_object()
        .ok_or_else(|| Error::InvalidMessage("expected a JSON object".to_string()))?;

    // client message protocol: "start" (+ optional "position"), "move"
    // server message protocol: "move", "legal_moves", "error", "end"
    if map.contains_key("start") {
        let client_first = data["start"].as_bool()
            .ok_or_else(|| Error::InvalidMessage("expected boolean field: start".to_string()))?;
        let board = match map.get("position") {
            Some(position) => serde_json::from_value::<Position>(position.clone())?.to_board()?,
            None => Board::new(),
        };
        handle_start(game, client_first, board).await
    } else if map.contains_key("move") {
        if !game.started {
            return Err(Error::GameNotStarted);
        }
        let action: Action = serde_json::from_value(data["move"].clone())?;
        handle_move(game, action).await
    } else {
        Err(Error::InvalidMessage(data.to_string()))
    }
}

async fn handle_start(game: &mut Game, client_first: bool, board: Board) -> Result<Value> {
    game.started = true;
    game.human = if client_first { board.player() } else { board.player().opponent() };
    game.board = board;
    if let Some(game_over) = check_game_over(game) {
        return Ok(game_over);
    }
    if client_first {
        Ok(json!({ "legal_moves": game.board.actions() }))
    } else {
        make_engine_move(game).await
    }
}

async fn handle_move(game: &mut Game, action: Action) -> Result<Value> {
    if game.board.player() != game.human {
        return Err(Error::IllegalAction("not the client's turn".to_string()));
    }
    game.board = game.board.apply(&action)?;
    match check_game_over(game) {
        Some(game_over) => Ok(game_over),
        None => make_engine_move(game).await,
    }
}

async fn make_engine_move(game: &mut Game) -> Result<Value> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Action>();
    let board = game.board.clone();
    let mut player = SearchPlayer::new(game.human.opponent(), game.config.policy, StdRng::seed_from_u64(game.rng.gen()));
    tokio::task::spawn_blocking(move || {
        let mut sink = tx;
        if let Err(e) = player.get_action(&board, &mut sink) {
            error!("Engine failed to move: {}", e);
        }
    });

    // keep whatever arrived last when the clock runs out
    let mut selected = None;
    let finished = tokio::time::timeout(game.config.time_limit, async {
        while let Some(action) = rx.recv().await {
            selected = Some(action);
        }
    }).await;
    if finished.is_err() {
        warn!("Engine still searching at ply {} after {:?}; abandoning its worker",
            game.board.ply_count(), game.config.time_limit);
    }
    let selected_move = selected.ok_or(Error::NoActionInTime(game.config.time_limit))?;

    game.board = game.board.apply(&selected_move)?;
    debug!("Board after engine move:\n{}", game.board);
    match check_game_over(game) {
        Some(mut game_over) => {
            game_over["move"] = json!(selected_move);
            Ok(game_over)
        }
        None => Ok(json!({ "move": selected_move, "legal_moves": game.board.actions() })),
    }
}

fn check_game_over(game: &Game) -> Option<Value> {
    game.board.winner().map(|winner| json!({ "end": winner }))
}
