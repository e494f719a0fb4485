#![allow(dead_code)]

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use iotgate::config::{AuthConfig, AuthStrategy, Config, IdentityProviderConfig};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Level;

pub const SECRET: &str = "integration-secret";
pub const AUDIENCE: &str = "iot-broker";
pub const ISSUER: &str = "https://tenant.example.com/";

static INIT: std::sync::Once = std::sync::Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::INFO);

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// How the mock `/oauth/ro` endpoint answers.
#[derive(Clone)]
pub enum Reply {
    Json(StatusCode, Value),
    Raw(StatusCode, String),
    Stall(Duration),
}

pub struct MockProvider {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockProvider {
    pub async fn start(reply: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let app = Router::new().route(
            "/oauth/ro",
            post(move |Json(body): Json<Value>| {
                let recorded = Arc::clone(&recorded);
                let reply = reply.clone();
                async move {
                    recorded.lock().unwrap().push(body);
                    match reply {
                        Reply::Json(status, value) => (status, value.to_string()),
                        Reply::Raw(status, body) => (status, body),
                        Reply::Stall(delay) => {
                            tokio::time::sleep(delay).await;
                            (StatusCode::OK, "{}".to_string())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn config_for(base_url: &str, strategy: AuthStrategy) -> Config {
    Config {
        auth: AuthConfig { strategy },
        identity_provider: IdentityProviderConfig {
            base_url: base_url.to_string(),
            client_id: "client-123".to_string(),
            client_secret: SECRET.to_string(),
            audience: AUDIENCE.to_string(),
            issuer: ISSUER.to_string(),
            request_timeout_ms: 2000,
            allow_insecure_transport: true,
            ..IdentityProviderConfig::default()
        },
    }
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn sign(claims: &Value, secret: &str) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Token as a device would present it under the "JWT" username.
pub fn device_token(subject: &str, topics: Option<&[&str]>) -> String {
    let mut claims = json!({
        "user_id": subject,
        "aud": AUDIENCE,
        "iss": ISSUER,
        "exp": now() + 3600,
    });
    if let Some(topics) = topics {
        claims["topics"] = json!(topics);
    }
    sign(&claims, SECRET)
}
