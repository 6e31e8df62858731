//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;
use ts_rs::TS;

use crate::state::{AppState, ServiceStatus};

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ServiceInfo {
    name: String,
    status: ServiceStatus,
    /// Seconds since the status last changed.
    since_secs: u64,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    subscribers: usize,
    services: BTreeMap<String, ServiceInfo>,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status endpoint showing service health and build info
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut services = BTreeMap::new();

    for (name, svc_status, since_secs) in state.service_statuses.all() {
        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status: svc_status,
                since_secs,
            },
        );
    }

    Json(StatusResponse {
        status: overall_status(services.values().map(|s| &s.status)),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        subscribers: state.hub.subscriber_count(),
        services,
    })
}

/// Any error wins, then any service still starting. A disabled service does not
/// degrade the overall status.
fn overall_status<'a>(statuses: impl Iterator<Item = &'a ServiceStatus>) -> ServiceStatus {
    let mut any = false;
    let mut starting = false;
    for status in statuses {
        any = true;
        match status {
            ServiceStatus::Error => return ServiceStatus::Error,
            ServiceStatus::Starting => starting = true,
            ServiceStatus::Active | ServiceStatus::Disabled => {}
        }
    }

    if !any {
        ServiceStatus::Disabled
    } else if starting {
        ServiceStatus::Starting
    } else {
        ServiceStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status() {
        use ServiceStatus::*;
        assert_eq!(overall_status([].iter()), Disabled);
        assert_eq!(overall_status([Active, Disabled].iter()), Active);
        assert_eq!(overall_status([Starting, Active].iter()), Starting);
        assert_eq!(overall_status([Starting, Error, Active].iter()), Error);
    }
}
