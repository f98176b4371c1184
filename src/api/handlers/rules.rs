//! Rule application handler.

use axum::extract::{Extension, Path, State};
use axum::Json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::middleware::CallerIdentity;
use crate::api::types::ApplyRuleRequest;
use crate::domain::{ConfigId, RuleId};
use crate::engine::RuleOutcome;
use crate::server::AppState;

use super::with_deadline;

/// POST /api/v1/configs/:id/rules/:rule_id/apply - Apply a rule over a date
/// range, returning per-date outcomes.
pub async fn apply_rule(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((id, rule_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ApplyRuleRequest>,
) -> Result<Json<Vec<RuleOutcome>>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let rule_id = RuleId::from_uuid(rule_id);
    let outcomes = with_deadline(
        state.request_timeout,
        state.service.apply_rule(
            &config_id,
            &rule_id,
            request.start,
            request.end,
            &caller.actor,
        ),
    )
    .await?;
    Ok(Json(outcomes))
}
