//! HTTP API Layer
//!
//! A thin axum adapter over [`LedgerService`]: every ledger operation is one
//! JSON endpoint, the bearer token's subject becomes the acting user, and
//! ledger errors map onto HTTP statuses in [`error::ApiError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(ledger, config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use rust_decimal::Decimal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use core_kernel::Money;
use domain_billing::{LedgerPort, LedgerService};

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{bills, payments, transactions, reconciliation, health};

/// Application state shared across handlers
pub struct AppState<P: LedgerPort> {
    pub ledger: LedgerService<P>,
    pub config: Arc<ApiConfig>,
}

impl<P: LedgerPort> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            config: self.config.clone(),
        }
    }
}

impl<P: LedgerPort> AppState<P> {
    pub fn new(ledger: LedgerService<P>, config: ApiConfig) -> Self {
        Self {
            ledger,
            config: Arc::new(config),
        }
    }

    /// Tags a request amount with the ledger currency
    pub fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.ledger.currency())
    }
}

/// Creates the main API router
///
/// Health routes are public; everything under `/api/v1` requires a bearer
/// token and is audit-logged.
pub fn create_router<P: LedgerPort>(state: AppState<P>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check::<P>));

    let bill_routes = Router::new()
        .route("/", post(bills::create_bill::<P>))
        .route("/due", get(bills::due_bills::<P>))
        .route("/:id", get(bills::get_bill::<P>).delete(bills::delete_bill::<P>))
        .route("/:id/cancel", post(bills::cancel_bill::<P>))
        .route("/:id/recalculate", post(bills::recalculate_bill::<P>));

    let payment_routes = Router::new()
        .route("/", post(payments::record_payment::<P>))
        .route(
            "/:id",
            get(payments::get_payment::<P>)
                .put(payments::amend_payment::<P>)
                .delete(payments::delete_payment::<P>),
        )
        .route("/:id/verify", post(payments::verify_payment::<P>))
        .route("/:id/cancel", post(payments::cancel_payment::<P>));

    let transaction_routes = Router::new()
        .route("/", post(transactions::create_transaction::<P>))
        .route("/:id", get(transactions::get_transaction::<P>))
        .route("/:id/items", post(transactions::add_item::<P>))
        .route("/:id/verify", post(transactions::verify_transaction::<P>))
        .route("/:id/cancel", post(transactions::cancel_transaction::<P>));

    let item_routes = Router::new().route(
        "/:id",
        put(transactions::update_item::<P>).delete(transactions::remove_item::<P>),
    );

    let reconciliation_routes = Router::new()
        .route("/batches", post(reconciliation::import_batch::<P>))
        .route("/batches/:id", get(reconciliation::get_batch::<P>))
        .route("/batches/:id/auto-match", post(reconciliation::run_auto_match::<P>))
        .route("/batches/:id/verify", post(reconciliation::verify_batch::<P>))
        .route("/lines/:id/candidates", get(reconciliation::line_candidates::<P>))
        .route("/lines/:id/match", post(reconciliation::match_line::<P>))
        .route("/lines/:id/unmatch", post(reconciliation::unmatch_line::<P>));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/bills", bill_routes)
        .nest("/payments", payment_routes)
        .nest("/transactions", transaction_routes)
        .nest("/transaction-items", item_routes)
        .nest("/reconciliation", reconciliation_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware::<P>))
                .layer(axum_middleware::from_fn(audit_middleware)),
        );

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
