use std::fmt;

use rand::Rng;

use crate::stats::{FileStatsStore, RunStats, StatsStore};

// ============================================================================
// Configuration
// ============================================================================

pub const GRID_SIZE: usize = 8;

pub const EMPTY: u8 = 0;
pub const MAX_TIER: u8 = 7;
pub const MAX_GENERATED_TIER: u8 = 6;

// Scoring
pub const SCORE_PER_TILE: u32 = 10;

// Difficulty curve
pub const DIFFICULTY_CAP: f64 = 0.6;
pub const GAMES_PER_FULL_DIFFICULTY: f64 = 20.0;

// ============================================================================
// Errors
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameError {
    /// Coordinates outside the 8x8 grid.
    OutOfBounds { row: usize, col: usize },
    /// Placement targeting an occupied cell.
    InvalidMove { row: usize, col: usize },
    /// Operation not allowed in the current engine state.
    InvalidState,
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::OutOfBounds { row, col } => {
                write!(f, "coordinates ({row}, {col}) are outside the grid")
            }
            GameError::InvalidMove { row, col } => {
                write!(f, "cell ({row}, {col}) is already occupied")
            }
            GameError::InvalidState => write!(f, "operation not allowed in this state"),
        }
    }
}

impl std::error::Error for GameError {}

// ============================================================================
// Grid
// ============================================================================

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Grid {
    cells: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[EMPTY; GRID_SIZE]; GRID_SIZE],
        }
    }

    fn check_bounds(row: usize, col: usize) -> Result<(), GameError> {
        if row >= GRID_SIZE || col >= GRID_SIZE {
            return Err(GameError::OutOfBounds { row, col });
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Result<u8, GameError> {
        Self::check_bounds(row, col)?;
        Ok(self.cells[row][col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: u8) -> Result<(), GameError> {
        Self::check_bounds(row, col)?;
        debug_assert!(value <= MAX_TIER);
        self.cells[row][col] = value;
        Ok(())
    }

    pub fn is_empty(&self, row: usize, col: usize) -> Result<bool, GameError> {
        Ok(self.get(row, col)? == EMPTY)
    }

    /// In-bounds orthogonal neighbors in fixed up, down, left, right order.
    pub fn neighbors4(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(4);
        if row > 0 {
            out.push((row - 1, col));
        }
        if row + 1 < GRID_SIZE {
            out.push((row + 1, col));
        }
        if col > 0 {
            out.push((row, col - 1));
        }
        if col + 1 < GRID_SIZE {
            out.push((row, col + 1));
        }
        out
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|&cell| cell != EMPTY)
    }

    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|&&cell| cell != EMPTY)
            .count()
    }

    pub fn rows(&self) -> &[[u8; GRID_SIZE]; GRID_SIZE] {
        &self.cells
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Match Resolution
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MergeOutcome {
    /// Tier written back at the origin.
    pub tier: u8,
    /// Cells cleared by this merge, origin included.
    pub cleared: u32,
}

/// Performs one merge iteration rooted at `(row, col)`.
///
/// Collects the origin plus every orthogonal neighbor holding the same
/// value. With no matching neighbor nothing happens. Otherwise all matched
/// cells are cleared and the origin receives the next tier, capped at
/// [`MAX_TIER`] (two tier-7 tiles merge into a tier-7 tile but still count).
///
/// Chain reactions are produced by calling this again at the same origin:
/// the cascade follows a single lineage rooted at the placement site and
/// never re-checks the neighbor cells it cleared.
pub fn resolve_at(grid: &mut Grid, row: usize, col: usize) -> Option<MergeOutcome> {
    let value = grid.cells[row][col];
    if value == EMPTY {
        return None;
    }

    let mut matches = vec![(row, col)];
    for (nr, nc) in grid.neighbors4(row, col) {
        if grid.cells[nr][nc] == value {
            matches.push((nr, nc));
        }
    }

    if matches.len() == 1 {
        return None;
    }

    for &(r, c) in &matches {
        grid.cells[r][c] = EMPTY;
    }
    let merged = (value + 1).min(MAX_TIER);
    grid.cells[row][col] = merged;

    Some(MergeOutcome {
        tier: merged,
        cleared: matches.len() as u32,
    })
}

// ============================================================================
// Tile Generation
// ============================================================================

pub fn difficulty(games_played: u32) -> f64 {
    (f64::from(games_played) / GAMES_PER_FULL_DIFFICULTY).min(DIFFICULTY_CAP)
}

/// Inclusive tier range selected by the uniform draw `r` in `[0, 1)`.
///
/// The low band shrinks as difficulty grows, shifting probability mass
/// toward mid and high tiers. Tier 7 is never generated, only merged into.
pub fn tier_band(games_played: u32, r: f64) -> (u8, u8) {
    let d = difficulty(games_played);
    if r < 0.6 - d {
        (1, 3)
    } else if r < 0.9 - d / 2.0 {
        (4, 5)
    } else {
        (MAX_GENERATED_TIER, MAX_GENERATED_TIER)
    }
}

pub trait TileProvider {
    fn next_tile(&mut self, games_played: u32) -> u8;
}

struct RandomTileProvider;

impl TileProvider for RandomTileProvider {
    fn next_tile(&mut self, games_played: u32) -> u8 {
        let mut rng = rand::thread_rng();
        let r: f64 = rng.gen();
        let (lo, hi) = tier_band(games_played, r);
        if lo == hi {
            lo
        } else {
            rng.gen_range(lo..=hi)
        }
    }
}

pub struct SequenceTileProvider {
    tiles: Vec<u8>,
    index: usize,
}

impl SequenceTileProvider {
    pub fn new(tiles: Vec<u8>) -> Self {
        Self { tiles, index: 0 }
    }
}

impl TileProvider for SequenceTileProvider {
    fn next_tile(&mut self, _games_played: u32) -> u8 {
        let tile = self.tiles[self.index % self.tiles.len()];
        self.index += 1;
        tile
    }
}

// ============================================================================
// Score Tracking
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreTracker {
    pub score: u32,
}

impl ScoreTracker {
    pub fn record(&mut self, cleared: u32, merged_tier: u8, stats: &mut RunStats) {
        self.score += cleared * SCORE_PER_TILE;
        if self.score > stats.best_score {
            stats.best_score = self.score;
        }
        if merged_tier > stats.highest_tier {
            stats.highest_tier = merged_tier;
        }
    }
}

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameState {
    Active,
    GameOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameEvent {
    TilePlaced { row: usize, col: usize, tier: u8 },
    Merged { tier: u8, count: u32 },
    GameOver,
    GameRestarted,
}

// ============================================================================
// Game Engine
// ============================================================================

pub struct GameEngine {
    pub grid: Grid,
    pub pending_tile: u8,
    pub state: GameState,
    tracker: ScoreTracker,
    stats: RunStats,
    resolving: Option<(usize, usize)>,
    tile_provider: Box<dyn TileProvider>,
    stats_store: Box<dyn StatsStore>,
    events: Vec<GameEvent>,
}

impl GameEngine {
    pub fn new() -> Self {
        Self::with_parts(
            Box::new(RandomTileProvider),
            Box::new(FileStatsStore::default()),
        )
    }

    pub fn with_parts(
        mut tile_provider: Box<dyn TileProvider>,
        stats_store: Box<dyn StatsStore>,
    ) -> Self {
        let stats = stats_store.load();
        let pending_tile = tile_provider.next_tile(stats.games_played);

        Self {
            grid: Grid::new(),
            pending_tile,
            state: GameState::Active,
            tracker: ScoreTracker::default(),
            stats,
            resolving: None,
            tile_provider,
            stats_store,
            events: Vec::new(),
        }
    }

    pub fn score(&self) -> u32 {
        self.tracker.score
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn is_game_over(&self) -> bool {
        self.state == GameState::GameOver
    }

    /// True while a placed tile still has merge iterations pending.
    pub fn is_resolving(&self) -> bool {
        self.resolving.is_some()
    }

    /// Places the pending tile and resolves the full chain reaction before
    /// returning.
    pub fn place_tile(&mut self, row: usize, col: usize) -> Result<(), GameError> {
        self.place_tile_stepwise(row, col)?;
        while self.resolve_step() {}
        Ok(())
    }

    /// Places the pending tile and arms the resolver without running it, so
    /// a front-end can drive the chain one [`resolve_step`] at a time and
    /// draw frames in between.
    ///
    /// [`resolve_step`]: GameEngine::resolve_step
    pub fn place_tile_stepwise(&mut self, row: usize, col: usize) -> Result<(), GameError> {
        if self.state == GameState::GameOver || self.resolving.is_some() {
            return Err(GameError::InvalidState);
        }
        if !self.grid.is_empty(row, col)? {
            return Err(GameError::InvalidMove { row, col });
        }

        self.grid.set(row, col, self.pending_tile)?;
        self.events.push(GameEvent::TilePlaced {
            row,
            col,
            tier: self.pending_tile,
        });
        self.resolving = Some((row, col));
        Ok(())
    }

    /// Runs one merge iteration of the armed chain reaction.
    ///
    /// Returns true while the origin may merge again. The final call settles
    /// the placement: the next pending tile is generated and the terminal
    /// condition evaluated.
    pub fn resolve_step(&mut self) -> bool {
        let Some((row, col)) = self.resolving else {
            return false;
        };

        match resolve_at(&mut self.grid, row, col) {
            Some(outcome) => {
                self.tracker
                    .record(outcome.cleared, outcome.tier, &mut self.stats);
                self.events.push(GameEvent::Merged {
                    tier: outcome.tier,
                    count: outcome.cleared,
                });
                true
            }
            None => {
                self.resolving = None;
                self.finish_placement();
                false
            }
        }
    }

    fn finish_placement(&mut self) {
        self.pending_tile = self.tile_provider.next_tile(self.stats.games_played);

        if self.grid.is_full() {
            self.state = GameState::GameOver;
            self.events.push(GameEvent::GameOver);
            self.stats_store.save(&self.stats);
        }
    }

    /// Starts a fresh run. A reset always wins: any chain reaction still
    /// mid-flight is discarded before the new run is initialized.
    pub fn reset(&mut self) {
        self.resolving = None;

        self.grid = Grid::new();
        self.tracker = ScoreTracker::default();
        self.state = GameState::Active;

        self.stats.games_played += 1;
        self.stats_store.save(&self.stats);

        self.pending_tile = self.tile_provider.next_tile(self.stats.games_played);

        self.events.clear();
        self.events.push(GameEvent::GameRestarted);
    }

    /// Takes and clears all pending events
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;
    use crate::stats::MemoryStatsStore;

    /// Engine wired with a fixed tile sequence and an in-memory stats store.
    pub fn engine_with_tiles(tiles: Vec<u8>) -> GameEngine {
        GameEngine::with_parts(
            Box::new(SequenceTileProvider::new(tiles)),
            Box::new(MemoryStatsStore::default()),
        )
    }

    pub fn grid_with(cells: &[(usize, usize, u8)]) -> Grid {
        let mut grid = Grid::new();
        for &(row, col, tier) in cells {
            grid.set(row, col, tier).unwrap();
        }
        grid
    }

    /// Every cell occupied except the given one. Tiers alternate in a
    /// checkerboard so no two occupied neighbors ever match.
    pub fn full_grid_except(row: usize, col: usize) -> Grid {
        let mut grid = Grid::new();
        for r in 0..GRID_SIZE {
            for c in 0..GRID_SIZE {
                if (r, c) != (row, col) {
                    let tier = if (r + c) % 2 == 0 { 1 } else { 2 };
                    grid.set(r, c, tier).unwrap();
                }
            }
        }
        grid
    }
}
