use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::models::{EventChanges, NewEvent};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.catalog().list_events().await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.catalog().get_event(id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(new): Json<NewEvent>,
) -> Result<Response, AppError> {
    let event = state.catalog().create_event(new).await?;
    Ok(created(event, "Event created"))
}

pub async fn update_event(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(changes): Json<EventChanges>,
) -> Result<Response, AppError> {
    let event = state.catalog().update_event(id, changes).await?;
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.catalog().delete_event(id).await?;
    Ok(empty_success("Event deleted"))
}
