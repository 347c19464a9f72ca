pub mod app;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod stats;
pub mod state;

pub use app::router;
pub use config::Config;
pub use db::Database;
pub use engine::{LongestStreakPolicy, StreakEngine};
pub use errors::{HabitError, HabitResult};
pub use state::AppState;
