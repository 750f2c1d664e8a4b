//! HTTP ingest server.
//!
//! Routes:
//!
//! | method | path              | handler                      |
//! |--------|-------------------|------------------------------|
//! | POST   | `/api/update-bus` | photo + telemetry → estimate |
//! | GET    | `/health`         | liveness                     |
//! | GET    | `/`               | frontend index or a notice   |
//! | GET    | anything else     | static files                 |

mod error;
mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use headcount_core::Headcount;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    pub headcount: Arc<Headcount>,
    pub static_dir: PathBuf,
}

/// Build the application router from the estimator's server settings.
pub fn router(headcount: Arc<Headcount>) -> Router {
    let static_dir = headcount.config().static_dir();
    let max_upload = headcount.config().server.max_upload_mb * 1024 * 1024;
    let state = AppState {
        headcount,
        static_dir: static_dir.clone(),
    };

    Router::new()
        .route("/api/update-bus", post(handlers::update_bus))
        .route("/health", get(handlers::health))
        .route("/", get(handlers::index))
        .fallback_service(ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(headcount: Arc<Headcount>, addr: SocketAddr) -> anyhow::Result<()> {
    let static_dir = headcount.config().static_dir();
    if !static_dir.join("index.html").exists() {
        tracing::warn!(
            "Frontend build not found at {}; serving the API only",
            static_dir.display()
        );
    }

    let app = router(headcount);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Headcount listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use headcount_core::{
        BackendAdapter, BackendError, Config, Credential, CredentialPool, Dispatcher, ImageInput,
        MemorySink, UpdateSink,
    };
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "headcount-test-boundary";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    struct FixedAdapter(u32);

    #[async_trait]
    impl BackendAdapter for FixedAdapter {
        fn name(&self) -> &str {
            "fixed"
        }

        fn pool(&self) -> &str {
            "gemini"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn count_people(
            &self,
            _image: &ImageInput,
            _credential: &Credential,
        ) -> Result<u32, BackendError> {
            Ok(self.0)
        }
    }

    struct Harness {
        app: Router,
        sink: Arc<MemorySink>,
        static_dir: tempfile::TempDir,
    }

    fn harness_with(count: u32, max_upload_mb: usize) -> Harness {
        let static_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.static_dir = static_dir.path().to_string_lossy().into_owned();
        config.server.max_upload_mb = max_upload_mb;

        let mut pool = CredentialPool::new();
        pool.insert("gemini", ["test-key"]);
        let dispatcher = Dispatcher::new(vec![Arc::new(FixedAdapter(count))], Arc::new(pool));

        let sink = Arc::new(MemorySink::new());
        let store: Arc<dyn UpdateSink> = sink.clone();
        let headcount = Headcount::with_parts(config, dispatcher, Some(store));

        Harness {
            app: router(Arc::new(headcount)),
            sink,
            static_dir,
        }
    }

    fn harness(count: u32) -> Harness {
        harness_with(count, 20)
    }

    fn multipart_body(field: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"bus.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(field: &str, data: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/update-bus")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("bus-id", "NB-1234")
            .header("bus-lat", "6.9271")
            .header("bus-lng", "79.8612")
            .header("bus-speed", "32.5")
            .body(Body::from(multipart_body(field, data)))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_update_bus_returns_estimate_and_merges_record() {
        let h = harness(30);

        let resp = h.app.oneshot(upload_request("image", JPEG)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["people_count"], 30);
        assert_eq!(body["crowd_level"], "High");

        let record = h.sink.record("NB-1234").await.unwrap();
        assert_eq!(record["peopleCount"], 30);
        assert_eq!(record["crowdLevel"], "High");
        assert_eq!(record["lat"], 6.9271);
        assert_eq!(record["speed"], 32.5);
        assert!(record.contains_key("lastUpdated"));
    }

    #[tokio::test]
    async fn test_update_bus_without_image_field() {
        let h = harness(5);

        let resp = h.app.oneshot(upload_request("photo", JPEG)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(
            body["message"],
            "No image field named 'image' in form-data"
        );
        assert!(h.sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_bus_with_empty_image() {
        let h = harness(5);

        let resp = h.app.oneshot(upload_request("image", &[])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "Empty image data");
    }

    #[tokio::test]
    async fn test_update_bus_without_multipart_body() {
        let h = harness(5);
        let req = Request::builder()
            .method("POST")
            .uri("/api/update-bus")
            .header("content-type", "application/json")
            .header("bus-id", "NB-1234")
            .header("bus-lat", "6.9")
            .header("bus-lng", "79.8")
            .header("bus-speed", "0")
            .body(Body::from("{}"))
            .unwrap();

        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_bus_with_missing_header() {
        let h = harness(5);
        let req = Request::builder()
            .method("POST")
            .uri("/api/update-bus")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("bus-id", "NB-1234")
            .header("bus-lat", "6.9")
            .header("bus-lng", "79.8")
            .body(Body::from(multipart_body("image", JPEG)))
            .unwrap();

        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(resp).await["message"],
            "Missing header: bus-speed"
        );
        assert!(h.sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_bus_rejects_oversized_upload() {
        let h = harness_with(5, 1);
        let image = vec![0xFFu8; 2 * 1024 * 1024];

        let resp = h.app.oneshot(upload_request("image", &image)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(h.sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(0);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], headcount_core::VERSION);
        assert_eq!(body["persistence"], true);
    }

    #[tokio::test]
    async fn test_health_without_sink() {
        let dispatcher = Dispatcher::new(
            vec![Arc::new(FixedAdapter(0))],
            Arc::new(CredentialPool::new()),
        );
        let headcount = Headcount::with_parts(Config::default(), dispatcher, None);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = router(Arc::new(headcount)).oneshot(req).await.unwrap();
        assert_eq!(json_body(resp).await["persistence"], false);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let h = harness(0);
        let req = Request::builder()
            .uri("/health")
            .header("origin", "https://tracker.example")
            .body(Body::empty())
            .unwrap();

        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_root_without_frontend_build() {
        let h = harness(0);
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();

        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await["message"],
            "Headcount backend running. Frontend build not found."
        );
    }

    #[tokio::test]
    async fn test_root_and_assets_from_frontend_build() {
        let h = harness(0);
        std::fs::write(h.static_dir.path().join("index.html"), "<h1>Live buses</h1>").unwrap();
        std::fs::write(h.static_dir.path().join("app.js"), "console.log(1);").unwrap();

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&html[..], b"<h1>Live buses</h1>");

        let req = Request::builder().uri("/app.js").body(Body::empty()).unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder().uri("/missing.css").body(Body::empty()).unwrap();
        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
