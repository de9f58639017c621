//! Feedback Intake - validates customer submissions and records them in
//! Google Sheets, with attachments stored in Google Drive.

mod config;
mod error;
mod feedback;
mod form;
mod google;
mod service;
mod storage;
mod validation;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use config::Settings;
use error::{ApiResponse, AppError};
use feedback::{Complaint, ConsultationRequest, GeneralFeedback, Submission, WarrantyClaim};
use form::RawForm;
use google::{auth::GoogleAuth, drive::DriveClient, sheets::SheetsClient};
use service::FeedbackService;
use storage::GoogleStorage;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    feedback: Arc<FeedbackService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = config::load_env_file();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "feedback_intake=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = env_file {
        info!("Loaded environment from {:?}", path);
    }

    let settings = Settings::from_env()?;
    info!("Starting {}", settings.project_name);

    // One HTTP client for token exchange, Sheets and Drive
    let http = reqwest::Client::new();
    let auth = Arc::new(GoogleAuth::new(settings.google.credentials.clone(), http.clone()));
    let storage = GoogleStorage::new(
        SheetsClient::new(http.clone(), auth.clone(), settings.google.spreadsheet_id.clone()),
        DriveClient::new(http, auth),
        settings.google.drive_folder_id.clone(),
    );
    info!(
        "Google storage ready (spreadsheet={}, root folder={})",
        settings.google.spreadsheet_id, settings.google.drive_folder_id
    );

    let state = AppState {
        feedback: Arc::new(FeedbackService::new(Arc::new(storage), settings.timezone)),
    };

    let app = app(state, &settings.base_path)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&settings.allow_origins));

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Server listening on http://{}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes; the feedback endpoints sit under `base_path`.
fn app(state: AppState, base_path: &str) -> Router {
    let feedbacks = Router::new()
        .route("/feedbacks", post(submit::<GeneralFeedback>))
        .route("/feedbacks/consultation", post(submit::<ConsultationRequest>))
        .route("/feedbacks/warranty", post(submit::<WarrantyClaim>))
        .route("/feedbacks/complaint", post(submit::<Complaint>));

    let router = Router::new().route("/health", get(health));
    let router = if base_path.is_empty() {
        router.merge(feedbacks)
    } else {
        router.nest(base_path, feedbacks)
    };
    router.with_state(state)
}

/// Credentialed CORS. With no configured origins the request origin is
/// mirrored back, which is how `*` is honoured alongside credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Decode, validate and record one submission of category `T`.
async fn submit<T>(
    State(state): State<AppState>,
    form: RawForm,
) -> Result<Json<ApiResponse<&'static str>>, AppError>
where
    T: Submission + TryFrom<RawForm, Error = AppError>,
{
    let submission = T::try_from(form)?;
    info!(
        "Received {} submission ({} attachment(s))",
        T::CATEGORY,
        submission.attachments().len()
    );

    state.feedback.submit(&submission).await?;
    Ok(Json(ApiResponse::new(T::CATEGORY.success_message())))
}
