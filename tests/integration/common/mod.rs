//! Shared fixtures for the end-to-end session scenarios
//!
//! - A wiremock server standing in for the REST backend
//! - Token minting with `jsonwebtoken`
//! - Client construction over a temporary token file

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use libris_app::{create_client, LibrisClient};
use libris_common::ClientConfig;
use serde_json::json;
use tempfile::TempDir;
use wiremock::MockServer;

pub const TEST_SIGNING_SECRET: &[u8] = b"integration-test-secret";

/// Mint an access token for `subject` expiring `ttl_seconds` from now
pub fn mint_token(subject: &str, role: &str, ttl_seconds: i64) -> String {
    let now = Utc::now();
    let claims = json!({
        "token_type": "access",
        "user_id": subject,
        "role": role,
        "iat": now.timestamp(),
        "exp": now.timestamp() + ttl_seconds,
        "jti": format!("{}-{}", subject, now.timestamp_nanos_opt().unwrap_or_default()),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SIGNING_SECRET),
    )
    .expect("Failed to encode JWT")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Backend mock plus a scratch directory for the token file
pub struct TestEnv {
    pub server: MockServer,
    pub dir: TempDir,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn token_file(&self) -> PathBuf {
        self.dir.path().join("tokens.json")
    }

    pub fn config(&self) -> ClientConfig {
        let base_url = format!("{}/api/", self.server.uri());
        let token_file = self.token_file().display().to_string();
        ClientConfig::from_lookup(|key| match key {
            "LIBRIS_API_BASE_URL" => Some(base_url.clone()),
            "LIBRIS_AUTH_PROVIDER" => Some("http".to_string()),
            "LIBRIS_TOKEN_FILE" => Some(token_file.clone()),
            _ => None,
        })
        .expect("Failed to build test config")
    }

    /// A fresh client over the shared token file, like a new process start
    pub fn client(&self) -> LibrisClient {
        create_client(self.config()).expect("Failed to create client")
    }

    /// Raw token file contents as JSON
    pub fn stored_tokens(&self) -> serde_json::Value {
        std::fs::read_to_string(self.token_file())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| json!({}))
    }
}
