//! Liveness and readiness.
//!
//! - GET /healthz  -> always `{"status":"ok"}`
//! - GET /readyz   -> provider ping plus a write/read/delete in the upload directory

use crate::services::gateway_service::GatewayService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

const PROBE_BYTES: &[u8] = b"readyz";

/// `GET /healthz`. Never touches the provider or the disk.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`
///
/// 200 when the provider answers and the upload directory is writable,
/// 503 otherwise. Each check is reported under its own key.
pub async fn readyz(State(service): State<GatewayService>) -> impl IntoResponse {
    let provider = service
        .provider()
        .ping()
        .await
        .map_err(|e| format!("error: {}", e));
    let disk = probe_upload_dir(&service.policy.upload_dir).await;

    let checks = HashMap::from([
        (service.provider().name(), CheckStatus::from(provider)),
        ("disk", CheckStatus::from(disk)),
    ]);
    let ready = checks.values().all(|check| check.ok);

    let (status, label) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    };
    (
        status,
        Json(ReadyResponse {
            status: label,
            checks,
        }),
    )
}

/// Write, read back and remove a scratch file in `dir`.
async fn probe_upload_dir(dir: &Path) -> Result<(), String> {
    let path = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    fs::write(&path, PROBE_BYTES)
        .await
        .map_err(|e| format!("could not write tmp file: {}", e))?;

    let read = fs::read(&path).await;
    let removed = fs::remove_file(&path).await;
    match read {
        Ok(bytes) if bytes == PROBE_BYTES => {}
        Ok(_) => return Err("file content mismatch".into()),
        Err(e) => return Err(format!("could not read tmp file: {}", e)),
    }
    removed.map_err(|e| format!("could not remove tmp file: {}", e))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl From<Result<(), String>> for CheckStatus {
    fn from(result: Result<(), String>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.err(),
        }
    }
}
