//! Tree Game Web API
//!
//! Serves one game session over JSON: start a game, play turns, let the
//! computer move, and ask for hints. The browser build talks to the WASM
//! bindings instead; this server is for clients that cannot load WASM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use treegame_core::{
    CellState, GameError, GameMode, GameSnapshot, GameState, Position, Role, Settings,
    StrategyCache,
};

// =============================================================================
// Session State
// =============================================================================

/// The one game this server is running
struct GameSession {
    game: GameState,
    /// Starting position, for reset
    start: Position,
    /// Moves played so far, oldest first
    history: Vec<HistoryEntryModel>,
    rng: StdRng,
}

impl GameSession {
    fn new(game: GameState, rng: StdRng) -> Self {
        Self {
            start: *game.position(),
            game,
            history: Vec::new(),
            rng,
        }
    }

    fn replace(&mut self, game: GameState) {
        self.start = *game.position();
        self.game = game;
        self.history.clear();
    }

    fn play(&mut self, mov: CellState, by_computer: bool) -> Result<(), GameError> {
        let side = self.game.side_to_move();
        let pointer = self.game.pointer();
        self.game.try_take_turn(mov)?;
        self.history.push(HistoryEntryModel {
            turn: self.game.turns(),
            side,
            pointer,
            mov,
            by_computer,
        });
        Ok(())
    }
}

/// Shared application state
struct AppStateInner {
    session: Mutex<GameSession>,
    cache: StrategyCache,
    settings: Settings,
}

impl AppStateInner {
    fn session(&self) -> MutexGuard<'_, GameSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type AppState = Arc<AppStateInner>;

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize)]
struct GameStateModel {
    #[serde(flatten)]
    snapshot: GameSnapshot,
    /// "Firefighter" or "Pyromaniac" once decided
    winner_name: Option<String>,
    mode_description: String,
    /// Whether the first move is due from the firefighter anyway
    trivial: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NewGameRequest {
    /// Mode name, description, or legacy code
    mode: Option<String>,
    /// Explicit starting board, e.g. "FTTF"
    notation: Option<String>,
    /// Overrides for the server's settings
    settings: Option<Settings>,
}

#[derive(Deserialize)]
struct MoveRequest {
    /// "Fire" or "Tree"
    #[serde(rename = "move")]
    mov: String,
}

#[derive(Serialize, Clone)]
struct HistoryEntryModel {
    turn: u64,
    side: Role,
    pointer: usize,
    #[serde(rename = "move")]
    mov: CellState,
    by_computer: bool,
}

#[derive(Serialize)]
struct HistoryModel {
    start: String,
    moves: Vec<HistoryEntryModel>,
}

#[derive(Serialize)]
struct HintModel {
    side_to_move: Role,
    best_move: CellState,
    /// Turns until the firefighter wins if both sides play perfectly
    perfect_play_distance: usize,
    immediate_win: bool,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize)]
struct ErrorModel {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorModel>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorModel {
            detail: detail.into(),
        }),
    )
}

fn game_error(e: GameError) -> ApiError {
    match e {
        GameError::InvalidArgument(_) | GameError::GameOver => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        GameError::Strategy { .. } => {
            error!(error = %e, "strategy failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn game_to_model(game: &GameState) -> GameStateModel {
    GameStateModel {
        snapshot: game.snapshot(),
        winner_name: game.winner().map(|role| role.to_string()),
        mode_description: game.mode().description().to_string(),
        trivial: game.is_trivial(),
    }
}

// =============================================================================
// API Endpoints
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<GameStateModel> {
    let session = state.session();
    Json(game_to_model(&session.game))
}

async fn new_game(
    State(state): State<AppState>,
    Json(req): Json<NewGameRequest>,
) -> ApiResult<GameStateModel> {
    let settings = req.settings.unwrap_or(state.settings);
    let mode = match req.mode.as_deref() {
        Some(mode) => mode.parse::<GameMode>().map_err(game_error)?,
        None => state.session().game.mode(),
    };

    let mut session = state.session();
    let game = match req.notation.as_deref() {
        Some(notation) => {
            settings.validate().map_err(game_error)?;
            let position: Position = notation.parse().map_err(game_error)?;
            let table = state.cache.get(position.len()).map_err(game_error)?;
            GameState::with_strategy(position, settings.game_config(mode), table)
        }
        None => settings.new_game(mode, &mut session.rng, &state.cache),
    }
    .map_err(game_error)?;

    info!(board = %game.position(), %mode, "new game");
    session.replace(game);
    Ok(Json(game_to_model(&session.game)))
}

async fn reset_game(State(state): State<AppState>) -> ApiResult<GameStateModel> {
    let mut session = state.session();
    let table = state.cache.get(session.start.len()).map_err(game_error)?;
    let game = GameState::with_strategy(session.start, session.game.config(), table)
        .map_err(game_error)?;
    session.replace(game);
    Ok(Json(game_to_model(&session.game)))
}

async fn make_move(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<GameStateModel> {
    let mov: CellState = req.mov.parse().map_err(game_error)?;
    let mut session = state.session();
    if session.game.is_computer_turn() {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("It is the computer's turn ({})", session.game.side_to_move()),
        ));
    }
    session.play(mov, false).map_err(game_error)?;
    Ok(Json(game_to_model(&session.game)))
}

async fn computer_move(State(state): State<AppState>) -> ApiResult<GameStateModel> {
    let mut session = state.session();
    if session.game.is_over() {
        return Err(game_error(GameError::GameOver));
    }
    if !session.game.is_computer_turn() {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("It is the human's turn ({})", session.game.side_to_move()),
        ));
    }

    let session = &mut *session;
    let mov = session
        .game
        .computer_move(&mut session.rng)
        .map_err(game_error)?;
    session.play(mov, true).map_err(game_error)?;
    Ok(Json(game_to_model(&session.game)))
}

async fn hint(State(state): State<AppState>) -> ApiResult<HintModel> {
    let session = state.session();
    let game = &session.game;
    if game.is_over() {
        return Err(game_error(GameError::GameOver));
    }
    Ok(Json(HintModel {
        side_to_move: game.side_to_move(),
        best_move: game.best_move().map_err(game_error)?,
        perfect_play_distance: game.perfect_play_distance().map_err(game_error)?,
        immediate_win: game.is_immediate_suppressor_win(),
    }))
}

async fn get_history(State(state): State<AppState>) -> Json<HistoryModel> {
    let session = state.session();
    Json(HistoryModel {
        start: session.start.to_string(),
        moves: session.history.clone(),
    })
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/game", get(get_game))
        .route("/new", post(new_game))
        .route("/reset", post(reset_game))
        .route("/move", post(make_move))
        .route("/computer-move", post(computer_move))
        .route("/hint", get(hint))
        .route("/history", get(get_history))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Main
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "treegame-api", version, about = "Tree Game web API")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Settings JSON (board sizes, repetition rule, difficulty)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Mode of the game created at startup
    #[arg(long, default_value = "HumanIsSuppressor")]
    mode: GameMode,

    /// Seed for reproducible games
    #[arg(long)]
    seed: Option<u64>,
}

fn build_state(settings: Settings, mode: GameMode, seed: Option<u64>) -> anyhow::Result<AppState> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let cache = StrategyCache::new();
    let game = settings.new_game(mode, &mut rng, &cache)?;
    Ok(Arc::new(AppStateInner {
        session: Mutex::new(GameSession::new(game, rng)),
        cache,
        settings,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Settings::from_json(&json)?
        }
        None => {
            warn!("no settings file given, using defaults");
            Settings::default()
        }
    };
    info!(?settings, mode = %args.mode, "starting session");

    let state = build_state(settings, args.mode, args.seed)?;
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("binding {}", args.addr))?;
    info!("Tree Game API running on http://{}", args.addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
