use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{bookings, checkout, events, health_check, payments, ticket_types};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/checkout", post(checkout::create_checkout_session))
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::list_my_bookings),
        )
        .route("/bookings/:id", get(bookings::get_my_booking))
        .route("/admin/bookings", get(bookings::list_all_bookings))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/admin/events", post(events::create_event))
        .route(
            "/admin/events/:id",
            patch(events::update_event).delete(events::delete_event),
        )
        .route(
            "/events/:id/ticket-types",
            get(ticket_types::list_ticket_types),
        )
        .route("/ticket-types/:id", get(ticket_types::get_ticket_type))
        .route(
            "/admin/events/:id/ticket-types",
            post(ticket_types::create_ticket_type),
        )
        .route(
            "/admin/ticket-types/:id",
            patch(ticket_types::update_ticket_type).delete(ticket_types::delete_ticket_type),
        )
        .route("/payment/verify", get(payments::verify_payment))
        .route("/stripe/webhook", post(payments::stripe_webhook));

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state);

    create_security_headers_layer()
        .apply(router)
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
}
