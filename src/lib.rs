pub mod game;
pub mod stats;
