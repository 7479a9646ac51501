//! Rule matching engine for transaction categorization.
//!
//! Pure and synchronous: the engine evaluates conditions against in-memory
//! transaction views and returns patches describing what a matched rule
//! would change. It never touches the database; the persistence layer
//! applies patches and rule statistics in one transaction per batch.
//!
//! Malformed rule data (unknown field or operator, non-numeric value where
//! a number is required, unparsable date, invalid regex) makes a condition
//! evaluate false. It never aborts a batch.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    ActionKind, ConditionField, ConditionOperator, MatchType, RuleAction, RuleCondition,
    RuleScope, RuleWithParts, TransactionView,
};

/// What a matched rule would change on one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPatch {
    pub transaction_id: Uuid,
    pub rule_id: Uuid,
    pub category: Option<String>,
    pub merchant_name: Option<String>,
    pub add_labels: Vec<Uuid>,
    pub remove_labels: Vec<Uuid>,
}

impl TransactionPatch {
    fn new(transaction_id: Uuid, rule_id: Uuid) -> Self {
        Self {
            transaction_id,
            rule_id,
            category: None,
            merchant_name: None,
            add_labels: Vec::new(),
            remove_labels: Vec::new(),
        }
    }

    /// Whether applying this patch would change anything.
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.merchant_name.is_none()
            && self.add_labels.is_empty()
            && self.remove_labels.is_empty()
    }
}

/// Per-rule match count for one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct RuleHit {
    pub rule_id: Uuid,
    pub name: String,
    pub matched: u64,
}

/// Result of one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct EngineOutcome {
    pub evaluated: u64,
    pub patches: Vec<TransactionPatch>,
    pub rule_hits: Vec<RuleHit>,
}

impl EngineOutcome {
    pub fn matched(&self) -> u64 {
        self.patches.len() as u64
    }
}

/// The value a condition field extracts from a transaction.
enum FieldValue {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Int(i64),
    Id(Uuid),
}

fn extract_field(view: &TransactionView, field: ConditionField) -> Option<FieldValue> {
    match field {
        ConditionField::MerchantName => view.merchant_name.clone().map(FieldValue::Text),
        // Amount matches on magnitude so "groceries over $50" works for
        // expenses stored as negative amounts; amount_exact keeps the sign.
        ConditionField::Amount => Some(FieldValue::Number(view.amount.abs())),
        ConditionField::AmountExact => Some(FieldValue::Number(view.amount)),
        ConditionField::Category => view.category_primary.clone().map(FieldValue::Text),
        ConditionField::Description => view.description.clone().map(FieldValue::Text),
        ConditionField::Date => Some(FieldValue::Date(view.posted_date)),
        ConditionField::Month => Some(FieldValue::Int(i64::from(view.posted_date.month()))),
        ConditionField::Year => Some(FieldValue::Int(i64::from(view.posted_date.year()))),
        ConditionField::DayOfWeek => Some(FieldValue::Int(i64::from(
            view.posted_date.weekday().number_from_monday(),
        ))),
        ConditionField::AccountId => Some(FieldValue::Id(view.account_id)),
        ConditionField::AccountType => view
            .account_type
            .map(|t| FieldValue::Text(t.as_str().to_string())),
    }
}

/// Evaluate one condition against one transaction.
pub fn condition_matches(view: &TransactionView, condition: &RuleCondition) -> bool {
    let Some(field) = ConditionField::from_str(&condition.field) else {
        return false;
    };
    let Some(operator) = ConditionOperator::from_str(&condition.operator) else {
        return false;
    };
    let Some(actual) = extract_field(view, field) else {
        return false;
    };

    match actual {
        FieldValue::Text(text) => match_text(&text, operator, condition),
        FieldValue::Number(number) => match_ordered(
            number,
            operator,
            condition,
            |s: &str| s.trim().parse::<Decimal>().ok(),
        ),
        FieldValue::Date(date) => match_ordered(date, operator, condition, |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
        }),
        FieldValue::Int(int) => match_ordered(
            int,
            operator,
            condition,
            |s: &str| s.trim().parse::<i64>().ok(),
        ),
        FieldValue::Id(id) => match operator {
            ConditionOperator::Equals => Uuid::parse_str(condition.value.trim())
                .map(|expected| expected == id)
                .unwrap_or(false),
            _ => false,
        },
    }
}

fn match_text(text: &str, operator: ConditionOperator, condition: &RuleCondition) -> bool {
    let actual = text.to_lowercase();
    let expected = condition.value.to_lowercase();
    match operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::Contains => actual.contains(&expected),
        ConditionOperator::StartsWith => actual.starts_with(&expected),
        ConditionOperator::EndsWith => actual.ends_with(&expected),
        ConditionOperator::Regex => Regex::new(&condition.value)
            .map(|re| re.is_match(text))
            .unwrap_or(false),
        // Ordering operators do not apply to text fields.
        _ => false,
    }
}

/// Comparison for types with a total order (numbers, dates, integers).
/// `parse` turns the stored string value into the same type; parse failure
/// means no match.
fn match_ordered<T, F>(
    actual: T,
    operator: ConditionOperator,
    condition: &RuleCondition,
    parse: F,
) -> bool
where
    T: PartialOrd,
    F: Fn(&str) -> Option<T>,
{
    let Some(expected) = parse(&condition.value) else {
        return false;
    };
    match operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::GreaterThan => actual > expected,
        ConditionOperator::LessThan => actual < expected,
        ConditionOperator::Between => match condition.value_max.as_deref().and_then(parse) {
            Some(upper) => actual >= expected && actual <= upper,
            None => false,
        },
        _ => false,
    }
}

/// Whether a rule matches one transaction. A rule with no conditions never
/// fires; match_type=all requires every condition, match_type=any at least
/// one. Both short-circuit.
pub fn rule_matches(view: &TransactionView, rule: &RuleWithParts) -> bool {
    let Some(match_type) = rule.rule.parsed_match_type() else {
        return false;
    };
    if rule.conditions.is_empty() {
        return false;
    }
    match match_type {
        MatchType::All => rule
            .conditions
            .iter()
            .all(|c| condition_matches(view, c)),
        MatchType::Any => rule
            .conditions
            .iter()
            .any(|c| condition_matches(view, c)),
    }
}

/// Fold a matched rule's actions, in position order, into a patch.
/// Later actions on the same label win; an action value that should be a
/// label UUID but does not parse is skipped.
fn fold_actions(transaction_id: Uuid, rule_id: Uuid, actions: &[RuleAction]) -> TransactionPatch {
    let mut ordered: Vec<&RuleAction> = actions.iter().collect();
    ordered.sort_by_key(|a| a.position);

    let mut patch = TransactionPatch::new(transaction_id, rule_id);
    for action in ordered {
        match ActionKind::from_str(&action.action_type) {
            Some(ActionKind::SetCategory) => patch.category = Some(action.action_value.clone()),
            Some(ActionKind::SetMerchant) => {
                patch.merchant_name = Some(action.action_value.clone())
            }
            Some(ActionKind::AddLabel) => {
                if let Ok(label_id) = Uuid::parse_str(action.action_value.trim()) {
                    patch.remove_labels.retain(|l| *l != label_id);
                    if !patch.add_labels.contains(&label_id) {
                        patch.add_labels.push(label_id);
                    }
                }
            }
            Some(ActionKind::RemoveLabel) => {
                if let Ok(label_id) = Uuid::parse_str(action.action_value.trim()) {
                    patch.add_labels.retain(|l| *l != label_id);
                    if !patch.remove_labels.contains(&label_id) {
                        patch.remove_labels.push(label_id);
                    }
                }
            }
            None => {}
        }
    }
    patch
}

/// Run the engine over a batch of transactions.
///
/// Rules are filtered to active ones participating in `scope`, then ordered
/// by priority descending with created_utc and rule_id as explicit
/// tie-breaks, so runs are deterministic regardless of row order. Per
/// transaction the first matching rule claims it and contributes one patch;
/// later rules are not consulted.
pub fn evaluate(
    rules: &[RuleWithParts],
    transactions: &[TransactionView],
    scope: RuleScope,
) -> EngineOutcome {
    let mut candidates: Vec<&RuleWithParts> = rules
        .iter()
        .filter(|r| r.rule.is_active)
        .filter(|r| {
            r.rule
                .parsed_scope()
                .map(|s| s.participates(scope))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.rule
            .priority
            .cmp(&a.rule.priority)
            .then(a.rule.created_utc.cmp(&b.rule.created_utc))
            .then(a.rule.rule_id.cmp(&b.rule.rule_id))
    });

    let mut patches = Vec::new();
    let mut hits: Vec<u64> = vec![0; candidates.len()];

    for view in transactions {
        for (idx, rule) in candidates.iter().enumerate() {
            if rule_matches(view, rule) {
                patches.push(fold_actions(
                    view.transaction_id,
                    rule.rule.rule_id,
                    &rule.actions,
                ));
                hits[idx] += 1;
                break;
            }
        }
    }

    let rule_hits = candidates
        .iter()
        .zip(hits)
        .map(|(rule, matched)| RuleHit {
            rule_id: rule.rule.rule_id,
            name: rule.rule.name.clone(),
            matched,
        })
        .collect();

    EngineOutcome {
        evaluated: transactions.len() as u64,
        patches,
        rule_hits,
    }
}

/// Dry-run a single rule over a batch, ignoring its scope and active flag.
/// Used by the preview endpoint; nothing is persisted.
pub fn preview(rule: &RuleWithParts, transactions: &[TransactionView]) -> Vec<TransactionPatch> {
    transactions
        .iter()
        .filter(|view| rule_matches(view, rule))
        .map(|view| fold_actions(view.transaction_id, rule.rule.rule_id, &rule.actions))
        .collect()
}
