//! Client for the face enrollment / verification backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use kiosk_types::{
    config::BackendConfig,
    frame::FrameBlob,
    wire::{
        ActionOutcome, ActionResponse, ImageRequest, PunchAction, RegisterRequest, RosterEntry,
        REGISTER_PATH, USERS_PATH,
    },
    KioskError, Result,
};
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Url,
};
use tracing::{debug, info, warn};

/// Image body for an outbound action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Sent as `{"image": "data:..."}` in a JSON body.
    DataUri(String),
    /// Sent as the `image` file part of a multipart form.
    Blob(FrameBlob),
}

impl ImagePayload {
    pub fn encoded_len(&self) -> usize {
        match self {
            ImagePayload::DataUri(uri) => uri.len(),
            ImagePayload::Blob(blob) => blob.len(),
        }
    }
}

/// Backend calls consumed by the kiosk workflows.
///
/// `Err` is reserved for transport failures and unreadable bodies; a
/// well-formed rejection comes back as [`ActionOutcome::Failure`].
#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    async fn register(&self, user_id: &str, name: &str, image: &ImagePayload) -> Result<ActionOutcome>;
    async fn punch(&self, action: PunchAction, image: &ImagePayload) -> Result<ActionOutcome>;
    /// `Ok(true)` when the backend answered with a success status.
    async fn delete_user(&self, user_id: &str) -> Result<bool>;
    async fn list_users(&self) -> Result<Vec<RosterEntry>>;
}

/// JSON-over-HTTP implementation backed by `reqwest`.
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| KioskError::Configuration(format!("http client: {err}")))?;
        Url::parse(&config.base_url).map_err(|err| {
            KioskError::Configuration(format!("invalid backend.base_url {}: {err}", config.base_url))
        })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn user_url(&self, user_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint(USERS_PATH))
            .map_err(|err| network_error(format!("invalid users url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| network_error("backend url cannot carry path segments"))?
            .push(user_id);
        Ok(url)
    }

    async fn send_action(&self, label: &str, request: RequestBuilder) -> Result<ActionOutcome> {
        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|err| network_error(format!("{label} request failed: {err}")))?;
        let status = response.status();
        let body: ActionResponse = response
            .json()
            .await
            .map_err(|err| network_error(format!("{label} response unreadable ({status}): {err}")))?;
        info!(
            "{} answered {} success={} in {}ms",
            label,
            status,
            body.success,
            started.elapsed().as_millis()
        );
        Ok(ActionOutcome::from(body))
    }
}

#[async_trait]
impl AttendanceBackend for HttpBackend {
    async fn register(&self, user_id: &str, name: &str, image: &ImagePayload) -> Result<ActionOutcome> {
        debug!("Registering {} with {} byte image", user_id, image.encoded_len());
        let url = self.endpoint(REGISTER_PATH);
        let request = match image {
            ImagePayload::DataUri(uri) => self.http.post(url).json(&RegisterRequest {
                user_id: user_id.to_string(),
                name: name.to_string(),
                image: uri.clone(),
            }),
            ImagePayload::Blob(blob) => {
                let form = Form::new()
                    .text("user_id", user_id.to_string())
                    .text("name", name.to_string())
                    .part("image", blob_part(blob)?);
                self.http.post(url).multipart(form)
            }
        };
        self.send_action("register", request).await
    }

    async fn punch(&self, action: PunchAction, image: &ImagePayload) -> Result<ActionOutcome> {
        debug!("Sending {} with {} byte image", action.label(), image.encoded_len());
        let url = self.endpoint(action.path());
        let request = match image {
            ImagePayload::DataUri(uri) => self.http.post(url).json(&ImageRequest { image: uri.clone() }),
            ImagePayload::Blob(blob) => self
                .http
                .post(url)
                .multipart(Form::new().part("image", blob_part(blob)?)),
        };
        self.send_action(action.label(), request).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let url = self.user_url(user_id)?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| network_error(format!("delete request failed: {err}")))?;
        let ok = response.status().is_success();
        if !ok {
            warn!("Delete of {} answered {}", user_id, response.status());
        }
        Ok(ok)
    }

    async fn list_users(&self) -> Result<Vec<RosterEntry>> {
        self.http
            .get(self.endpoint(USERS_PATH))
            .send()
            .await
            .map_err(|err| network_error(format!("list users request failed: {err}")))?
            .error_for_status()
            .map_err(|err| network_error(format!("list users rejected: {err}")))?
            .json()
            .await
            .map_err(|err| network_error(format!("list users response unreadable: {err}")))
    }
}

fn blob_part(blob: &FrameBlob) -> Result<Part> {
    Part::bytes(blob.bytes.clone())
        .file_name(blob.file_name())
        .mime_str(&blob.mime)
        .map_err(|err| network_error(format!("invalid image mime {}: {err}", blob.mime)))
}

pub fn network_error(message: impl Into<String>) -> KioskError {
    KioskError::NetworkFailure(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        extract::{Multipart, Path, State},
        http::StatusCode,
        routing::{delete, get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use tokio::{net::TcpListener, sync::Mutex};

    #[derive(Clone, Default)]
    struct ServerState {
        bodies: Arc<Mutex<Vec<Value>>>,
        deleted: Arc<Mutex<Vec<String>>>,
    }

    async fn handle_register(
        State(state): State<ServerState>,
        Json(body): Json<RegisterRequest>,
    ) -> Json<Value> {
        state
            .bodies
            .lock()
            .await
            .push(serde_json::to_value(&body).unwrap_or_default());
        Json(json!({"success": true, "message": format!("Registered {}.", body.name)}))
    }

    async fn handle_register_multipart(
        State(state): State<ServerState>,
        mut multipart: Multipart,
    ) -> Json<Value> {
        let mut fields = serde_json::Map::new();
        while let Some(field) = multipart.next_field().await.expect("read field") {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.expect("image bytes");
                fields.insert("image_len".into(), json!(bytes.len()));
                fields.insert("image_type".into(), json!(content_type));
            } else {
                fields.insert(name, json!(field.text().await.expect("text field")));
            }
        }
        state.bodies.lock().await.push(Value::Object(fields));
        Json(json!({"success": true, "message": "Registered."}))
    }

    async fn handle_punch_in(Json(body): Json<ImageRequest>) -> Json<Value> {
        assert!(body.image.starts_with("data:"));
        Json(json!({
            "success": true,
            "user_id": "u1",
            "name": "Alice",
            "message": "Punch-in recorded for Alice."
        }))
    }

    async fn handle_punch_out() -> (StatusCode, Json<Value>) {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "No matching face found."})),
        )
    }

    async fn handle_delete(
        State(state): State<ServerState>,
        Path(user_id): Path<String>,
    ) -> (StatusCode, Json<Value>) {
        if user_id == "missing" {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"success": false, "message": "User not found"})),
            );
        }
        state.deleted.lock().await.push(user_id);
        (StatusCode::OK, Json(json!({"success": true})))
    }

    async fn handle_list() -> Json<Value> {
        Json(json!([
            {"user_id": "u1", "name": "Alice"},
            {"user_id": "u2", "name": "Bob"}
        ]))
    }

    async fn spawn_backend(multipart_register: bool) -> (HttpBackend, ServerState) {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let state = ServerState::default();
        let register = if multipart_register {
            post(handle_register_multipart)
        } else {
            post(handle_register)
        };
        let app = Router::new()
            .route("/register", register)
            .route("/api/punch-in", post(handle_punch_in))
            .route("/api/punch-out", post(handle_punch_out))
            .route("/api/users", get(handle_list))
            .route("/api/users/:user_id", delete(handle_delete))
            .route("/garbage", post(|| async { "not json" }))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let backend = HttpBackend::new(&BackendConfig {
            base_url: format!("http://{addr}/"),
            timeout_ms: 5_000,
            ..BackendConfig::default()
        })
        .expect("backend");
        (backend, state)
    }

    #[tokio::test]
    async fn register_posts_json_body() {
        let (backend, state) = spawn_backend(false).await;
        let outcome = backend
            .register(
                "u1",
                "Alice",
                &ImagePayload::DataUri("data:image/jpeg;base64,AAAA".into()),
            )
            .await
            .expect("register");
        assert_eq!(outcome.message(), Some("Registered Alice."));

        let bodies = state.bodies.lock().await;
        assert_eq!(bodies[0]["user_id"], "u1");
        assert_eq!(bodies[0]["name"], "Alice");
        assert_eq!(bodies[0]["image"], "data:image/jpeg;base64,AAAA");
    }

    #[tokio::test]
    async fn register_posts_multipart_form() {
        let (backend, state) = spawn_backend(true).await;
        let blob = FrameBlob {
            mime: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
        };
        let outcome = backend
            .register("u2", "Bob", &ImagePayload::Blob(blob))
            .await
            .expect("register");
        assert!(outcome.is_success());

        let bodies = state.bodies.lock().await;
        assert_eq!(bodies[0]["user_id"], "u2");
        assert_eq!(bodies[0]["name"], "Bob");
        assert_eq!(bodies[0]["image_len"], 4);
        assert_eq!(bodies[0]["image_type"], "image/jpeg");
    }

    #[tokio::test]
    async fn punch_in_decodes_identity() {
        let (backend, _) = spawn_backend(false).await;
        let outcome = backend
            .punch(
                PunchAction::In,
                &ImagePayload::DataUri("data:image/jpeg;base64,AAAA".into()),
            )
            .await
            .expect("punch in");
        let ActionOutcome::Success { identity, message } = outcome else {
            panic!("expected success");
        };
        assert_eq!(identity.map(|i| i.label().to_string()).as_deref(), Some("Alice"));
        assert_eq!(message.as_deref(), Some("Punch-in recorded for Alice."));
    }

    #[tokio::test]
    async fn rejection_with_error_status_is_still_decoded() {
        let (backend, _) = spawn_backend(false).await;
        let outcome = backend
            .punch(
                PunchAction::Out,
                &ImagePayload::DataUri("data:image/jpeg;base64,AAAA".into()),
            )
            .await
            .expect("punch out");
        assert_eq!(
            outcome,
            ActionOutcome::Failure {
                message: Some("No matching face found.".into())
            }
        );
    }

    #[tokio::test]
    async fn unreadable_body_is_network_failure() {
        let (backend, _) = spawn_backend(false).await;
        let request = backend.http.post(backend.endpoint("/garbage"));
        let err = backend
            .send_action("garbage", request)
            .await
            .expect_err("should fail");
        assert!(matches!(err, KioskError::NetworkFailure(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let backend = HttpBackend::new(&BackendConfig {
            base_url: format!("http://{addr}"),
            timeout_ms: 1_000,
            ..BackendConfig::default()
        })
        .expect("backend");
        let err = backend
            .punch(
                PunchAction::In,
                &ImagePayload::DataUri("data:image/jpeg;base64,AAAA".into()),
            )
            .await
            .expect_err("should fail");
        assert!(matches!(err, KioskError::NetworkFailure(_)));
    }

    #[tokio::test]
    async fn delete_reports_status_and_encodes_id() {
        let (backend, state) = spawn_backend(false).await;
        assert!(backend.delete_user("jo smith").await.expect("delete"));
        assert!(!backend.delete_user("missing").await.expect("delete"));
        assert_eq!(state.deleted.lock().await.as_slice(), ["jo smith".to_string()]);
    }

    #[tokio::test]
    async fn list_users_returns_roster() {
        let (backend, _) = spawn_backend(false).await;
        let users = backend.list_users().await.expect("list");
        assert_eq!(
            users,
            vec![
                RosterEntry {
                    user_id: "u1".into(),
                    name: "Alice".into()
                },
                RosterEntry {
                    user_id: "u2".into(),
                    name: "Bob".into()
                },
            ]
        );
    }

    #[test]
    fn invalid_base_url_is_configuration_error() {
        let result = HttpBackend::new(&BackendConfig {
            base_url: "not a url".into(),
            ..BackendConfig::default()
        });
        assert!(matches!(result, Err(KioskError::Configuration(_))));
    }
}
