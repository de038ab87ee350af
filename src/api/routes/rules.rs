//! Rule reload endpoint

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::{state::ApiState, types::RulesReloadResponse};

/// POST /api/v1/rules/reload
///
/// Reload enabled rules from the store. A store failure still answers 200:
/// the built-in rules are active and `degraded` is set.
pub async fn reload_rules(State(state): State<ApiState>) -> Json<RulesReloadResponse> {
    match state.engine.load_rules().await {
        Ok(active) => Json(RulesReloadResponse {
            active,
            degraded: false,
        }),
        Err(e) => {
            warn!("{}, built-in rules active", e);
            Json(RulesReloadResponse {
                active: state.engine.rules().len(),
                degraded: true,
            })
        }
    }
}
