use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::models::{NewTicketType, TicketTypeChanges};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_ticket_types(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket_types = state.store.list_ticket_types(event_id).await?;
    Ok(success(ticket_types, "Ticket types retrieved"))
}

pub async fn get_ticket_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket_type = state.ledger().get_ticket_type(id).await?;
    Ok(success(ticket_type, "Ticket type retrieved"))
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(event_id): Path<Uuid>,
    Json(new): Json<NewTicketType>,
) -> Result<Response, AppError> {
    let ticket_type = state.ledger().create_ticket_type(event_id, new).await?;
    Ok(created(ticket_type, "Ticket type created"))
}

pub async fn update_ticket_type(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(changes): Json<TicketTypeChanges>,
) -> Result<Response, AppError> {
    let ticket_type = state.ledger().update_ticket_type(id, changes).await?;
    Ok(success(ticket_type, "Ticket type updated"))
}

pub async fn delete_ticket_type(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.ledger().delete_ticket_type(id).await?;
    Ok(empty_success("Ticket type deleted"))
}
