//! HTTP route handlers for the DiaStat server.
//!
//! All endpoints accept/return JSON. Caller-correctable conditions come back
//! as 400 with a specific (but non-leaking) message; everything else is a
//! 500 with a generic message, full detail only in the server logs.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use ds_core::Error;
use ds_inference::predictor::Questionnaire;

use crate::openapi::openapi_spec;
use crate::state::SharedState;
use crate::store::StoredUser;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/predict", post(predict_handler))
        .route("/v1/health", get(health_handler))
        .route("/v1/openapi.json", get(openapi_handler))
}

/// Redirect to the API documentation.
async fn index_handler() -> Redirect {
    Redirect::to("/v1/openapi.json")
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_spec())
}

// ---------------------------------------------------------------------------
// POST /register
// ---------------------------------------------------------------------------

/// Request body for `/register`.
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    first_name: String,
    last_name: String,
    gender: String,
    email: String,
    phone: String,
    address: String,
    password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), String> {
        for (field, value, max) in
            [("first_name", &self.first_name, 50), ("last_name", &self.last_name, 50)]
        {
            if value.is_empty() || value.chars().count() > max {
                return Err(format!("{field} must be 1-{max} characters"));
            }
        }
        if self.gender != "Male" && self.gender != "Female" {
            return Err("gender must be 'Male' or 'Female'".to_string());
        }
        let (local, domain) = self.email.split_once('@').unwrap_or(("", ""));
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err("email is not a valid address".to_string());
        }
        if !(10..=15).contains(&self.phone.len())
            || !self.phone.bytes().all(|b| b.is_ascii_digit())
        {
            return Err("phone must be 10-15 digits".to_string());
        }
        if self.address.is_empty() || self.address.chars().count() > 100 {
            return Err("address must be 1-100 characters".to_string());
        }
        if self.password.chars().count() < 6 {
            return Err("password must be at least 6 characters".to_string());
        }
        Ok(())
    }
}

/// Response body for `/register`.
#[derive(Debug, Serialize)]
struct RegisterResponse {
    message: String,
    email: String,
}

async fn register_handler(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);
    state.total_requests.fetch_add(1, Ordering::Relaxed);

    req.validate().map_err(ApiError::bad_request)?;

    // bcrypt is deliberately slow; keep it off the async workers.
    let email = req.email.clone();
    let state2 = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
            .map_err(|e| Error::Computation(format!("password hashing failed: {e}")))?;
        state2.users.insert_user(StoredUser {
            first_name: req.first_name,
            last_name: req.last_name,
            gender: req.gender,
            email: req.email,
            phone: req.phone,
            address: req.address,
            password_hash,
        })
    })
    .await
    .map_err(|e| ApiError::internal_logged("registration task panicked", &e.to_string()))?;

    match result {
        Ok(()) => {
            tracing::info!(email = %email, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse { message: "User registered successfully".to_string(), email }),
            ))
        }
        Err(Error::Domain(message)) => Err(ApiError::bad_request(message)),
        Err(e) => Err(ApiError::internal_logged("An error occurred during registration", &e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// POST /login
// ---------------------------------------------------------------------------

/// Request body for `/login`.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Response body for `/login`.
#[derive(Debug, Serialize)]
struct LoginResponse {
    message: String,
    user: String,
}

/// One message for both unknown email and wrong password, so a caller
/// cannot probe which one failed.
const BAD_CREDENTIALS: &str = "Invalid email or password";

async fn login_handler(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);
    state.total_requests.fetch_add(1, Ordering::Relaxed);

    let state2 = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || -> Result<Option<String>, Error> {
        let user = match state2.users.find_user(&req.email)? {
            Some(user) => user,
            None => return Ok(None),
        };
        let ok = bcrypt::verify(&req.password, &user.password_hash)
            .map_err(|e| Error::Computation(format!("password verification failed: {e}")))?;
        Ok(ok.then_some(user.email))
    })
    .await
    .map_err(|e| ApiError::internal_logged("login task panicked", &e.to_string()))?;

    match result {
        Ok(Some(email)) => {
            tracing::info!(email = %email, "user logged in");
            Ok(Json(LoginResponse { message: "Login successful".to_string(), user: email }))
        }
        Ok(None) => Err(ApiError::bad_request(BAD_CREDENTIALS.to_string())),
        Err(e) => Err(ApiError::internal_logged("Login processing error", &e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// POST /predict
// ---------------------------------------------------------------------------

/// Response body for `/predict`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    diabetes_status: u8,
    recommendation: String,
    probability: f64,
}

async fn predict_handler(
    State(state): State<SharedState>,
    Json(questionnaire): Json<Questionnaire>,
) -> Result<Json<PredictResponse>, ApiError> {
    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);
    state.total_requests.fetch_add(1, Ordering::Relaxed);

    questionnaire.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;

    let assessment = state
        .predictor
        .assess(&questionnaire)
        .map_err(|e| ApiError::internal_logged("Prediction processing error", &e.to_string()))?;

    // Audit side effect: the raw questionnaire, not the prediction.
    state
        .audit
        .record_questionnaire(&questionnaire)
        .map_err(|e| ApiError::internal_logged("Prediction processing error", &e.to_string()))?;

    Ok(Json(PredictResponse {
        diabetes_status: assessment.status,
        recommendation: assessment.recommendation,
        probability: assessment.probability,
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_s: f64,
    inflight: u64,
    total_requests: u64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: ds_core::VERSION,
        uptime_s: state.started_at.elapsed().as_secs_f64(),
        inflight: state.inflight.load(Ordering::Relaxed),
        total_requests: state.total_requests.load(Ordering::Relaxed),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structured JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message }
    }

    /// 500 with a generic caller-facing message; the detail goes to the log
    /// only.
    fn internal_logged(message: &str, detail: &str) -> Self {
        tracing::error!(detail, "{message}");
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// RAII guard to decrement an atomic counter on drop.
struct DecrementOnDrop<'a>(&'a std::sync::atomic::AtomicU64);

impl Drop for DecrementOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::store::{MemoryAuditStore, MemoryUserStore};
    use ds_data::transform::{FittedTransform, StandardScaler};
    use ds_inference::model::RiskModel;
    use ds_inference::predictor::{RiskPredictor, FEATURE_ORDER};

    fn test_state() -> (SharedState, Arc<MemoryAuditStore>) {
        let transform = FittedTransform {
            feature_names: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            encoders: Vec::new(),
            scaler: StandardScaler { means: vec![0.0; 16], scales: vec![1.0; 16] },
        };
        // Weight only on the Polyuria flag: probability is sigmoid(2 * polyuria - 1).
        let mut weights = vec![0.0; 16];
        weights[2] = 2.0;
        let model = RiskModel::new(
            FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            -1.0,
            weights,
        )
        .unwrap();
        let predictor = RiskPredictor::new(transform, model).unwrap();

        let audit = Arc::new(MemoryAuditStore::default());
        let state = Arc::new(AppState::new(
            predictor,
            Box::new(MemoryUserStore::default()),
            Box::new(Arc::clone(&audit)),
        ));
        (state, audit)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            gender: "Female".into(),
            email: email.into(),
            phone: "0123456789".into(),
            address: "12 Analytical Way".into(),
            password: "engine-no-1".into(),
        }
    }

    fn questionnaire(polyuria: i64) -> Questionnaire {
        Questionnaire {
            age: 45,
            sex: 1,
            polyuria,
            polydipsia: 0,
            sudden_weight_loss: 0,
            weakness: 0,
            polyphagia: 0,
            genital_thrush: 0,
            visual_blurring: 0,
            itching: 0,
            irritability: 0,
            delayed_healing: 0,
            partial_paresis: 0,
            muscle_stiffness: 0,
            alopecia: 0,
            obesity: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_email_registration_returns_400() {
        let (state, _) = test_state();
        let (status, _) =
            register_handler(State(Arc::clone(&state)), Json(register_request("a@example.com")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = register_handler(State(state), Json(register_request("a@example.com")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Email already registered");
    }

    #[tokio::test]
    async fn invalid_register_fields_return_400() {
        let (state, _) = test_state();
        let mut req = register_request("b@example.com");
        req.phone = "12ab".into();
        let err = register_handler(State(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("phone"));
    }

    #[tokio::test]
    async fn login_does_not_leak_which_credential_failed() {
        let (state, _) = test_state();
        register_handler(State(Arc::clone(&state)), Json(register_request("a@example.com")))
            .await
            .unwrap();

        let wrong_password = login_handler(
            State(Arc::clone(&state)),
            Json(LoginRequest { email: "a@example.com".into(), password: "nope!!".into() }),
        )
        .await
        .unwrap_err();
        let unknown_email = login_handler(
            State(Arc::clone(&state)),
            Json(LoginRequest { email: "ghost@example.com".into(), password: "engine-no-1".into() }),
        )
        .await
        .unwrap_err();

        assert_eq!(wrong_password.status, StatusCode::BAD_REQUEST);
        assert_eq!(unknown_email.status, StatusCode::BAD_REQUEST);
        assert_eq!(wrong_password.message, unknown_email.message);

        let ok = login_handler(
            State(state),
            Json(LoginRequest { email: "a@example.com".into(), password: "engine-no-1".into() }),
        )
        .await
        .unwrap();
        assert_eq!(ok.0.user, "a@example.com");
    }

    #[tokio::test]
    async fn predict_returns_consistent_status_and_audits_the_request() {
        let (state, audit) = test_state();

        let with_symptom =
            predict_handler(State(Arc::clone(&state)), Json(questionnaire(1))).await.unwrap();
        let without_symptom =
            predict_handler(State(Arc::clone(&state)), Json(questionnaire(0))).await.unwrap();

        for response in [&with_symptom.0, &without_symptom.0] {
            assert!((0.0..=1.0).contains(&response.probability));
            assert_eq!(response.diabetes_status, u8::from(response.probability >= 0.5));
        }
        // sigmoid(1) ~ 0.73 -> high band; sigmoid(-1) ~ 0.27 -> low band.
        assert!(with_symptom.0.recommendation.starts_with("High Risk"));
        assert!(without_symptom.0.recommendation.starts_with("Low Risk"));

        assert_eq!(audit.len(), 2, "both raw questionnaires must be audited");
    }

    #[tokio::test]
    async fn predict_rejects_out_of_range_fields() {
        let (state, audit) = test_state();
        let mut q = questionnaire(0);
        q.age = 80;
        let err = predict_handler(State(state), Json(q)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(audit.is_empty(), "rejected requests must not be audited");
    }

    #[tokio::test]
    async fn health_reports_request_counters() {
        let (state, _) = test_state();
        predict_handler(State(Arc::clone(&state)), Json(questionnaire(0))).await.unwrap();
        let health = health_handler(State(state)).await;
        assert_eq!(health.0.status, "ok");
        assert_eq!(health.0.total_requests, 1);
        assert_eq!(health.0.inflight, 0);
    }
}
