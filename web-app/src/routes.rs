//! HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sitecast_engine::{Engine, PreconditionError, SessionError};
use sitecast_ipc::{
    platform_name, CaptureMode, ErrorKind, ErrorResponse, LogsResponse, MessageResponse,
    PreviewRequest, PreviewResponse, StartStreamRequest, StatusReport,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, instrument, warn};

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

/// Build the control panel router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/preview", post(preview))
        .route("/start_stream", post(start_stream))
        .route("/stop_stream", post(stop_stream))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .route("/test_browser", get(test_browser))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A failed request, rendered as the JSON error shape.
#[derive(Debug)]
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PreconditionError::InvalidRequest(rejection.body_text()).into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(&self.0);

        if status.is_server_error() {
            error!(?kind, "Request failed: {}", self.0);
        } else {
            warn!(?kind, "Request rejected: {}", self.0);
        }

        (status, Json(ErrorResponse::new(self.0.to_string(), kind))).into_response()
    }
}

fn status_for(err: &SessionError) -> StatusCode {
    if err.is_conflict() {
        return StatusCode::CONFLICT;
    }
    match err.kind() {
        ErrorKind::Precondition => StatusCode::BAD_REQUEST,
        ErrorKind::Capability => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Launch | ErrorKind::Navigation | ErrorKind::Subprocess => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::RenderTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let ffmpeg_available = state.engine.encoder_available().await;
    let window_supported = state.engine.supports(CaptureMode::Window);

    let ffmpeg_status = if ffmpeg_available {
        r#"<span class="ok">FFmpeg available</span>"#
    } else {
        r#"<span class="bad">FFmpeg not found. Please install FFmpeg first.</span>"#
    };

    Html(
        INDEX_HTML
            .replace("{{FFMPEG_STATUS}}", ffmpeg_status)
            .replace("{{PLATFORM}}", &platform_name())
            .replace(
                "{{WINDOW_DISABLED}}",
                if window_supported { "" } else { "disabled" },
            ),
    )
}

#[instrument(skip_all)]
async fn preview(
    State(state): State<AppState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let Json(request) = payload?;
    let preview = state.engine.preview(&request.url).await?;
    Ok(Json(PreviewResponse::new(
        preview.screenshot.data_uri(),
        preview.url,
    )))
}

#[instrument(skip_all)]
async fn start_stream(
    State(state): State<AppState>,
    payload: Result<Json<StartStreamRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    debug!(mode = request.capture_mode.as_str(), "start_stream request");
    state
        .engine
        .start_stream(&request.stream_key, request.capture_mode)
        .await?;
    Ok(Json(MessageResponse::new("Streaming started")))
}

#[instrument(skip_all)]
async fn stop_stream(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    state.engine.stop_stream().await?;
    Ok(Json(MessageResponse::new("Streaming stopped")))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.engine.status().await)
}

async fn logs(State(state): State<AppState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        logs: state.engine.logs(),
    })
}

#[instrument(skip_all)]
async fn test_browser(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.engine.test_browser().await?;
    Ok(Json(MessageResponse::new(message)))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use sitecast_engine::testing::TestRig;
    use tower::ServiceExt;

    use super::*;

    fn app(rig: &TestRig) -> Router {
        router(AppState {
            engine: rig.engine.clone(),
        })
    }

    async fn call(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_preview_start_stop_flow() {
        let rig = TestRig::new();

        let (status, body) = call(
            app(&rig),
            Method::POST,
            "/preview",
            Some(json!({"url": "example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["url"], "https://example.com");
        assert!(body["screenshot"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        let (status, body) = call(
            app(&rig),
            Method::POST,
            "/start_stream",
            Some(json!({"stream_key": "abcd", "capture_mode": "desktop"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Streaming started");

        let (_, body) = call(app(&rig), Method::GET, "/status", None).await;
        assert_eq!(body["streaming"], true);
        assert_eq!(body["has_stream_key"], true);
        assert_eq!(body["current_url"], "https://example.com");
        assert_eq!(body["capture_mode"], "desktop");
        assert_eq!(body["state"], "Live");

        let (_, body) = call(app(&rig), Method::GET, "/logs", None).await;
        assert!(body["logs"].as_str().unwrap().contains("frame="));

        let (status, body) = call(app(&rig), Method::POST, "/stop_stream", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Streaming stopped");

        let (_, body) = call(app(&rig), Method::GET, "/status", None).await;
        assert_eq!(body["streaming"], false);
        assert_eq!(body["has_stream_key"], false);

        let (_, body) = call(app(&rig), Method::GET, "/logs", None).await;
        assert_eq!(body["logs"], "Encoder not running");
    }

    #[tokio::test]
    async fn test_start_without_preview_is_bad_request() {
        let rig = TestRig::new();

        let (status, body) = call(
            app(&rig),
            Method::POST,
            "/start_stream",
            Some(json!({"stream_key": "abcd"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "precondition");
        assert_eq!(body["error"], "No URL loaded. Preview a website first.");
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_conflict() {
        let rig = TestRig::new();

        let (status, body) = call(app(&rig), Method::POST, "/stop_stream", None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "No active stream");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_shape() {
        let rig = TestRig::new();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/preview")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(&rig).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "precondition");
    }

    #[tokio::test]
    async fn test_missing_encoder_is_unavailable() {
        let rig = TestRig::new();
        rig.encoder.set_behavior(|b| b.installed = false);
        rig.engine.preview("example.com").await.unwrap();

        let (status, body) = call(
            app(&rig),
            Method::POST,
            "/start_stream",
            Some(json!({"stream_key": "abcd"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "capability");

        let (_, body) = call(app(&rig), Method::GET, "/status", None).await;
        assert_eq!(body["ffmpeg_available"], false);
        assert_eq!(body["streaming"], false);
    }

    #[tokio::test]
    async fn test_preview_timeout_is_gateway_timeout() {
        let rig = TestRig::new();
        rig.browser.set_behavior(|b| b.time_out_load = true);

        let (status, body) = call(
            app(&rig),
            Method::POST,
            "/preview",
            Some(json!({"url": "slow.example"})),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["kind"], "render_timeout");
    }

    #[tokio::test]
    async fn test_browser_self_test_route() {
        let rig = TestRig::new();

        let (status, body) = call(app(&rig), Method::GET, "/test_browser", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "Browser test successful. Title: Example Domain"
        );
    }

    #[tokio::test]
    async fn test_index_reports_capabilities() {
        let rig = TestRig::new();
        rig.encoder.set_behavior(|b| {
            b.installed = false;
            b.supports_window = false;
        });

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app(&rig).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("FFmpeg not found"));
        assert!(html.contains(&platform_name()));
        assert!(html.contains(r#"value="window" disabled"#));
        assert!(!html.contains("{{"));
    }
}
