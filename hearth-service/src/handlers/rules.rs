//! Rule handlers: CRUD, batch application and dry-run preview.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::{
    ActionKind, ConditionField, ConditionOperator, CreateRule, MatchType, RuleActionInput,
    RuleConditionInput, RuleScope, RuleWithParts, UpdateRule,
};
use crate::services::metrics::RULES_APPLIED_TOTAL;
use crate::services::rules::{self, EngineOutcome, TransactionPatch};
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// One condition in a rule create/update request.
#[derive(Debug, Deserialize)]
pub struct RuleConditionRequest {
    pub field: String,
    pub operator: String,
    pub value: String,
    pub value_max: Option<String>,
}

/// One action in a rule create/update request.
#[derive(Debug, Deserialize)]
pub struct RuleActionRequest {
    pub action_type: String,
    pub action_value: String,
}

/// Request to create a rule with nested conditions and actions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRuleRequest {
    #[validate(length(min = 1, message = "Rule name is required"))]
    pub name: String,
    #[serde(default = "default_match_type")]
    pub match_type: String,
    #[serde(default = "default_apply_to")]
    pub apply_to: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: Vec<RuleConditionRequest>,
    pub actions: Vec<RuleActionRequest>,
}

fn default_match_type() -> String {
    "all".to_string()
}

fn default_apply_to() -> String {
    "both".to_string()
}

fn default_is_active() -> bool {
    true
}

/// Request to patch a rule. Present conditions/actions replace the
/// existing parts wholesale.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRuleRequest {
    #[validate(length(min = 1, message = "Rule name cannot be empty"))]
    pub name: Option<String>,
    pub match_type: Option<String>,
    pub apply_to: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub conditions: Option<Vec<RuleConditionRequest>>,
    pub actions: Option<Vec<RuleActionRequest>>,
}

/// Request to run rules over stored transactions.
#[derive(Debug, Deserialize)]
pub struct ApplyRulesRequest {
    /// "existing" or "new"; ignored when transaction_id targets one row.
    pub scope: Option<String>,
    #[serde(default)]
    pub uncategorized_only: bool,
    pub account_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
}

/// Request to dry-run one rule.
#[derive(Debug, Deserialize, Default)]
pub struct PreviewRuleRequest {
    pub limit: Option<usize>,
}

/// Rule condition response.
#[derive(Debug, Serialize)]
pub struct RuleConditionResponse {
    pub condition_id: Uuid,
    pub field: String,
    pub operator: String,
    pub value: String,
    pub value_max: Option<String>,
    pub position: i32,
}

/// Rule action response.
#[derive(Debug, Serialize)]
pub struct RuleActionResponse {
    pub action_id: Uuid,
    pub action_type: String,
    pub action_value: String,
    pub position: i32,
}

/// Rule with its parts.
#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub rule_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub match_type: String,
    pub apply_to: String,
    pub priority: i32,
    pub is_active: bool,
    pub times_applied: i64,
    pub last_applied_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub conditions: Vec<RuleConditionResponse>,
    pub actions: Vec<RuleActionResponse>,
}

impl From<RuleWithParts> for RuleResponse {
    fn from(rule: RuleWithParts) -> Self {
        Self {
            rule_id: rule.rule.rule_id,
            organization_id: rule.rule.organization_id,
            name: rule.rule.name,
            match_type: rule.rule.match_type,
            apply_to: rule.rule.apply_to,
            priority: rule.rule.priority,
            is_active: rule.rule.is_active,
            times_applied: rule.rule.times_applied,
            last_applied_utc: rule.rule.last_applied_utc,
            created_utc: rule.rule.created_utc,
            updated_utc: rule.rule.updated_utc,
            conditions: rule
                .conditions
                .into_iter()
                .map(|c| RuleConditionResponse {
                    condition_id: c.condition_id,
                    field: c.field,
                    operator: c.operator,
                    value: c.value,
                    value_max: c.value_max,
                    position: c.position,
                })
                .collect(),
            actions: rule
                .actions
                .into_iter()
                .map(|a| RuleActionResponse {
                    action_id: a.action_id,
                    action_type: a.action_type,
                    action_value: a.action_value,
                    position: a.position,
                })
                .collect(),
        }
    }
}

/// Per-rule match count in an engine run.
#[derive(Debug, Serialize)]
pub struct RuleHitResponse {
    pub rule_id: Uuid,
    pub name: String,
    pub matched: u64,
}

/// Outcome of an engine run: how many transactions were evaluated, how
/// many matched some rule, and which rules fired.
#[derive(Debug, Serialize)]
pub struct RuleRunResponse {
    pub evaluated: u64,
    pub matched: u64,
    pub rules: Vec<RuleHitResponse>,
}

impl RuleRunResponse {
    pub fn from_outcome(outcome: &EngineOutcome) -> Self {
        Self {
            evaluated: outcome.evaluated,
            matched: outcome.matched(),
            rules: outcome
                .rule_hits
                .iter()
                .filter(|hit| hit.matched > 0)
                .map(|hit| RuleHitResponse {
                    rule_id: hit.rule_id,
                    name: hit.name.clone(),
                    matched: hit.matched,
                })
                .collect(),
        }
    }
}

/// One would-be change from a preview run.
#[derive(Debug, Serialize)]
pub struct PreviewPatchResponse {
    pub transaction_id: Uuid,
    pub category: Option<String>,
    pub merchant_name: Option<String>,
    pub add_labels: Vec<Uuid>,
    pub remove_labels: Vec<Uuid>,
}

impl From<TransactionPatch> for PreviewPatchResponse {
    fn from(patch: TransactionPatch) -> Self {
        Self {
            transaction_id: patch.transaction_id,
            category: patch.category,
            merchant_name: patch.merchant_name,
            add_labels: patch.add_labels,
            remove_labels: patch.remove_labels,
        }
    }
}

/// Preview result; nothing is persisted.
#[derive(Debug, Serialize)]
pub struct PreviewRuleResponse {
    pub evaluated: usize,
    pub matches: usize,
    pub patches: Vec<PreviewPatchResponse>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn validate_conditions(conditions: &[RuleConditionRequest]) -> Result<(), AppError> {
    for condition in conditions {
        if ConditionField::from_str(&condition.field).is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown condition field '{}'",
                condition.field
            )));
        }
        let operator = ConditionOperator::from_str(&condition.operator).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Unknown condition operator '{}'",
                condition.operator
            ))
        })?;
        if operator == ConditionOperator::Between && condition.value_max.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Operator 'between' requires value_max"
            )));
        }
    }

    Ok(())
}

fn validate_actions(actions: &[RuleActionRequest]) -> Result<(), AppError> {
    if actions.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Rule must have at least one action"
        )));
    }
    for action in actions {
        let kind = ActionKind::from_str(&action.action_type).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Unknown action type '{}'",
                action.action_type
            ))
        })?;
        match kind {
            ActionKind::AddLabel | ActionKind::RemoveLabel => {
                if Uuid::parse_str(&action.action_value).is_err() {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Action '{}' requires a label UUID as value",
                        action.action_type
                    )));
                }
            }
            ActionKind::SetCategory | ActionKind::SetMerchant => {
                if action.action_value.trim().is_empty() {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Action '{}' requires a non-empty value",
                        action.action_type
                    )));
                }
            }
        }
    }

    Ok(())
}

fn condition_inputs(conditions: Vec<RuleConditionRequest>) -> Vec<RuleConditionInput> {
    conditions
        .into_iter()
        .map(|c| RuleConditionInput {
            field: c.field,
            operator: c.operator,
            value: c.value,
            value_max: c.value_max,
        })
        .collect()
}

fn action_inputs(actions: Vec<RuleActionRequest>) -> Vec<RuleActionInput> {
    actions
        .into_iter()
        .map(|a| RuleActionInput {
            action_type: a.action_type,
            action_value: a.action_value,
        })
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a rule. A rule with no conditions is allowed but never fires.
///
/// POST /api/rules
pub async fn create_rule(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), AppError> {
    req.validate()?;

    if MatchType::from_str(&req.match_type).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "match_type must be 'all' or 'any'"
        )));
    }
    if RuleScope::from_str(&req.apply_to).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "apply_to must be one of 'new', 'existing', 'both', 'single'"
        )));
    }
    validate_conditions(&req.conditions)?;
    validate_actions(&req.actions)?;

    let rule = state
        .db
        .create_rule(&CreateRule {
            organization_id: org.organization_id,
            name: req.name,
            match_type: req.match_type,
            apply_to: req.apply_to,
            priority: req.priority,
            is_active: req.is_active,
            conditions: condition_inputs(req.conditions),
            actions: action_inputs(req.actions),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RuleResponse::from(rule))))
}

/// List rules in engine order: priority first, oldest first on ties.
///
/// GET /api/rules
pub async fn list_rules(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<RuleResponse>>, AppError> {
    let rules = state.db.list_rules(org.organization_id).await?;

    Ok(Json(rules.into_iter().map(RuleResponse::from).collect()))
}

/// Get a rule with its conditions and actions.
///
/// GET /api/rules/:rule_id
pub async fn get_rule(
    State(state): State<AppState>,
    org: OrgContext,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<RuleResponse>, AppError> {
    let rule = state.db.get_rule(org.organization_id, rule_id).await?;

    Ok(Json(RuleResponse::from(rule)))
}

/// Patch a rule. Given conditions/actions replace the stored parts.
///
/// PATCH /api/rules/:rule_id
pub async fn update_rule(
    State(state): State<AppState>,
    org: OrgContext,
    Path(rule_id): Path<Uuid>,
    Json(req): Json<UpdateRuleRequest>,
) -> Result<Json<RuleResponse>, AppError> {
    req.validate()?;

    if let Some(match_type) = &req.match_type {
        if MatchType::from_str(match_type).is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "match_type must be 'all' or 'any'"
            )));
        }
    }
    if let Some(apply_to) = &req.apply_to {
        if RuleScope::from_str(apply_to).is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "apply_to must be one of 'new', 'existing', 'both', 'single'"
            )));
        }
    }
    if let Some(conditions) = &req.conditions {
        validate_conditions(conditions)?;
    }
    if let Some(actions) = &req.actions {
        validate_actions(actions)?;
    }

    let rule = state
        .db
        .update_rule(
            org.organization_id,
            rule_id,
            &UpdateRule {
                name: req.name,
                match_type: req.match_type,
                apply_to: req.apply_to,
                priority: req.priority,
                is_active: req.is_active,
                conditions: req.conditions.map(condition_inputs),
                actions: req.actions.map(action_inputs),
            },
        )
        .await?;

    Ok(Json(RuleResponse::from(rule)))
}

/// Delete a rule; conditions and actions cascade.
///
/// DELETE /api/rules/:rule_id
pub async fn delete_rule(
    State(state): State<AppState>,
    org: OrgContext,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_rule(org.organization_id, rule_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Run rules over stored transactions and persist the matches, label
/// changes and rule statistics in one commit.
///
/// POST /api/rules/apply
pub async fn apply_rules(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<ApplyRulesRequest>,
) -> Result<Json<RuleRunResponse>, AppError> {
    let scope = if req.transaction_id.is_some() {
        RuleScope::Single
    } else {
        let scope_str = req.scope.as_deref().unwrap_or("existing");
        match RuleScope::from_str(scope_str) {
            Some(RuleScope::New) => RuleScope::New,
            Some(RuleScope::Existing) => RuleScope::Existing,
            _ => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "scope must be 'existing' or 'new'"
                )))
            }
        }
    };

    let rules = state.db.list_rules(org.organization_id).await?;
    let targets = state
        .db
        .list_rule_targets(
            org.organization_id,
            req.account_id,
            req.transaction_id,
            req.uncategorized_only,
        )
        .await?;

    let outcome = rules::evaluate(&rules, &targets, scope);

    match state.db.apply_rule_outcome(org.organization_id, &outcome).await {
        Ok(_) => {
            if outcome.matched() > 0 {
                RULES_APPLIED_TOTAL
                    .with_label_values(&["applied"])
                    .inc_by(outcome.matched() as f64);
            }
        }
        Err(e) => {
            RULES_APPLIED_TOTAL.with_label_values(&["error"]).inc();
            return Err(e);
        }
    }

    Ok(Json(RuleRunResponse::from_outcome(&outcome)))
}

/// Dry-run one rule over the organization's transactions, newest first,
/// ignoring the rule's scope and active flag. Nothing is persisted.
///
/// POST /api/rules/:rule_id/preview
pub async fn preview_rule(
    State(state): State<AppState>,
    org: OrgContext,
    Path(rule_id): Path<Uuid>,
    Json(req): Json<PreviewRuleRequest>,
) -> Result<Json<PreviewRuleResponse>, AppError> {
    let limit = req.limit.unwrap_or(100).clamp(1, 1000);

    let rule = state.db.get_rule(org.organization_id, rule_id).await?;
    let mut targets = state
        .db
        .list_rule_targets(org.organization_id, None, None, false)
        .await?;
    targets.truncate(limit);

    let patches = rules::preview(&rule, &targets);

    Ok(Json(PreviewRuleResponse {
        evaluated: targets.len(),
        matches: patches.len(),
        patches: patches.into_iter().map(PreviewPatchResponse::from).collect(),
    }))
}
