use crate::errors::AppError;
use crate::models::{HabitHistory, HabitId, HabitView, NewHabit, Owner, ToggleOutcome, UserId};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Local, NaiveDate};

pub const USER_HEADER: &str = "x-user-id";

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_habits(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<HabitView>>, AppError> {
    let requester = requester(&headers)?;
    let today = today();
    let habits = state
        .run(move |engine| engine.list_habits_for_user(requester, today))
        .await?;
    Ok(Json(habits))
}

pub async fn create_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewHabit>,
) -> Result<(StatusCode, Json<HabitView>), AppError> {
    let requester = requester(&headers)?;
    let habit = state
        .run(move |engine| engine.create_habit(payload, Owner::User(requester)))
        .await?;
    let view = HabitView {
        habit,
        completed_today: false,
    };
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<HabitId>,
) -> Result<StatusCode, AppError> {
    let requester = requester(&headers)?;
    state
        .run(move |engine| engine.delete_habit(id, requester))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<HabitId>,
) -> Result<Json<ToggleOutcome>, AppError> {
    let requester = requester(&headers)?;
    let today = today();
    let outcome = state
        .run(move |engine| engine.toggle_habit(id, requester, today))
        .await?;
    Ok(Json(outcome))
}

pub async fn complete_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<HabitId>,
) -> Result<Json<ToggleOutcome>, AppError> {
    let requester = requester(&headers)?;
    let today = today();
    let outcome = state
        .run(move |engine| engine.complete_habit(id, requester, today))
        .await?;
    Ok(Json(outcome))
}

pub async fn undo_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<HabitId>,
) -> Result<Json<ToggleOutcome>, AppError> {
    let requester = requester(&headers)?;
    let today = today();
    let outcome = state
        .run(move |engine| engine.undo_habit(id, requester, today))
        .await?;
    Ok(Json(outcome))
}

pub async fn habit_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<HabitId>,
) -> Result<Json<HabitHistory>, AppError> {
    let requester = requester(&headers)?;
    let today = today();
    let history = state
        .run(move |engine| engine.habit_history(id, requester, today))
        .await?;
    Ok(Json(history))
}

fn requester(headers: &HeaderMap) -> Result<UserId, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(UserId)
        .ok_or_else(|| AppError::unauthorized(format!("missing or invalid {USER_HEADER} header")))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
