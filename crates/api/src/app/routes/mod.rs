use axum::{
    Router,
    routing::{get, post},
};

pub mod credit_notes;
pub mod event_stream;
pub mod invoices;
pub mod payment_requests;
pub mod shipments;
pub mod system;
pub mod transactions;

/// Router for all endpoints that need a caller identity.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/shipments", shipments::router())
        .nest("/documents", shipments::documents_router())
        .nest("/payment-requests", payment_requests::router())
        .nest("/invoices", invoices::router())
        .route("/receipts", post(invoices::record_receipt))
        .nest("/credit-notes", credit_notes::router())
        .nest("/transactions", transactions::router())
        .route("/statement", get(transactions::statement))
        .nest("/events", event_stream::router())
}
