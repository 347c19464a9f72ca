use crate::engine::StreakEngine;
use crate::errors::{AppError, HabitResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<StreakEngine>,
}

impl AppState {
    pub fn new(engine: StreakEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Runs a blocking engine call on tokio's blocking pool.
    pub async fn run<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&StreakEngine) -> HabitResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || op(&engine))
            .await
            .map_err(AppError::internal)?;
        Ok(result?)
    }
}
