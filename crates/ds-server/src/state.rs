//! Shared application state for the DiaStat server.
//!
//! Everything here is built once at startup and treated as read-only for
//! the life of the process; the stores take care of their own interior
//! locking for appends.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use ds_inference::predictor::RiskPredictor;

use crate::store::{AuditStore, UserStore};

/// Shared state available to all request handlers.
pub struct AppState {
    /// Fitted transform + trained model, loaded once at startup.
    pub predictor: RiskPredictor,

    /// Registered users.
    pub users: Box<dyn UserStore>,

    /// Raw questionnaire audit log.
    pub audit: Box<dyn AuditStore>,

    /// Server start time (for uptime reporting).
    pub started_at: Instant,

    /// In-flight request counter (for /v1/health).
    pub inflight: AtomicU64,

    /// Total requests served (for /v1/health).
    pub total_requests: AtomicU64,
}

impl AppState {
    pub fn new(
        predictor: RiskPredictor,
        users: Box<dyn UserStore>,
        audit: Box<dyn AuditStore>,
    ) -> Self {
        Self {
            predictor,
            users,
            audit,
            started_at: Instant::now(),
            inflight: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
        }
    }
}

/// Type alias used in axum handlers.
pub type SharedState = Arc<AppState>;
