use crate::coerce;
use crate::errors::AppError;
use crate::models::Snapshot;
use axum::http::StatusCode;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{error, info};

pub fn resolve_data_path() -> Result<PathBuf, std::io::Error> {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(PathBuf::from("data/snapshot.json"))
}

/// Startup load. A missing or broken file yields an empty snapshot.
pub async fn load_snapshot(path: &Path) -> Snapshot {
    match read_snapshot(path).await {
        Ok(snapshot) => snapshot,
        Err(err) if err.status == StatusCode::NOT_FOUND => Snapshot::default(),
        Err(err) => {
            error!("failed to load snapshot: {err}");
            Snapshot::default()
        }
    }
}

/// Read and decode the snapshot file. Used by refresh, where failures go back to the caller.
pub async fn read_snapshot(path: &Path) -> Result<Snapshot, AppError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!(
                "snapshot file {} not found",
                path.display()
            )));
        }
        Err(err) => return Err(err.into()),
    };

    let snapshot: Snapshot = coerce::decode(serde_json::from_slice(&bytes)?)?;
    info!(
        clients = snapshot.clients.len(),
        movements = snapshot.movements.len(),
        churn = snapshot.churn.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("crm_dashboard_{name}_{}_{nanos}.json", std::process::id()));
        path
    }

    #[tokio::test]
    async fn missing_file_loads_empty_snapshot() {
        let path = temp_path("missing");
        assert_eq!(load_snapshot(&path).await, Snapshot::default());

        let err = read_snapshot(&path).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn broken_file_is_an_error_on_refresh_but_empty_on_startup() {
        let path = temp_path("broken");
        fs::write(&path, b"{ not json").await.unwrap();

        assert_eq!(load_snapshot(&path).await, Snapshot::default());
        let err = read_snapshot(&path).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn reads_collections_from_file() {
        let path = temp_path("valid");
        let payload = serde_json::json!({
            "clients": [{ "status": "Activo" }],
            "movements": [{ "type": "Venta", "date": "2026-01-01", "value": 10 }],
            "churn": [],
            "stats": { "clientes_sin_contacto_30d": 3 }
        });
        fs::write(&path, serde_json::to_vec(&payload).unwrap())
            .await
            .unwrap();

        let snapshot = read_snapshot(&path).await.unwrap();
        assert_eq!(snapshot.clients.len(), 1);
        assert_eq!(snapshot.movements.len(), 1);
        assert_eq!(snapshot.stats.contacts_with_no_recent_contact_30d, 3);

        let _ = fs::remove_file(&path).await;
    }
}
