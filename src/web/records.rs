//! Read access to stored records.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::data::models::MissingPerson;
use crate::state::AppState;
use crate::web::error::{ApiError, store_error};

const DEFAULT_RECENT_LIMIT: i64 = 50;
const MAX_RECENT_LIMIT: i64 = 200;

#[derive(Debug, Deserialize, Serialize, TS)]
#[ts(export)]
pub struct RecentParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecentResponse {
    pub records: Vec<MissingPerson>,
    pub count: usize,
}

fn clamp_limit(limit: Option<i64>) -> usize {
    limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT) as usize
}

/// Newest stored records first.
pub(super) async fn recent_records(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentResponse>, ApiError> {
    let records = state
        .store
        .recent(clamp_limit(params.limit))
        .await
        .map_err(|e| store_error("Recent records query", e))?;

    Ok(Json(RecentResponse {
        count: records.len(),
        records,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(75)), 75);
        assert_eq!(clamp_limit(Some(10_000)), 200);
    }
}
