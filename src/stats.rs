use std::path::PathBuf;

const STATS_FILE: &str = "stats.txt";

/// Cross-run statistics. `games_played` also drives the difficulty curve of
/// tile generation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RunStats {
    pub games_played: u32,
    pub best_score: u32,
    pub highest_tier: u8,
}

/// Persistence collaborator for [`RunStats`]. The engine treats saves as
/// fire-and-forget: a failing store must never surface into game state.
pub trait StatsStore {
    fn load(&self) -> RunStats;
    fn save(&mut self, stats: &RunStats);
}

/// Stores the three statistics fields whitespace-separated in a small text
/// file. A missing or unparseable file loads as all zeroes.
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for FileStatsStore {
    fn default() -> Self {
        Self::new(STATS_FILE)
    }
}

impl StatsStore for FileStatsStore {
    fn load(&self) -> RunStats {
        let contents = std::fs::read_to_string(&self.path).unwrap_or_default();
        let mut fields = contents.split_whitespace();
        let games_played = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let best_score = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let highest_tier = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        RunStats {
            games_played,
            best_score,
            highest_tier,
        }
    }

    fn save(&mut self, stats: &RunStats) {
        let line = format!(
            "{} {} {}",
            stats.games_played, stats.best_score, stats.highest_tier
        );
        let _ = std::fs::write(&self.path, line);
    }
}

/// In-memory store for tests and headless embedding.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryStatsStore {
    pub stats: RunStats,
}

impl MemoryStatsStore {
    pub fn new(stats: RunStats) -> Self {
        Self { stats }
    }
}

impl StatsStore for MemoryStatsStore {
    fn load(&self) -> RunStats {
        self.stats
    }

    fn save(&mut self, stats: &RunStats) {
        self.stats = *stats;
    }
}
