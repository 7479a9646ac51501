//! Categorization rule models for hearth-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    All,
    Any,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::All => "all",
            MatchType::Any => "any",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(MatchType::All),
            "any" => Some(MatchType::Any),
            _ => None,
        }
    }
}

/// Which engine runs a rule takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    New,
    Existing,
    Both,
    Single,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleScope::New => "new",
            RuleScope::Existing => "existing",
            RuleScope::Both => "both",
            RuleScope::Single => "single",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(RuleScope::New),
            "existing" => Some(RuleScope::Existing),
            "both" => Some(RuleScope::Both),
            "single" => Some(RuleScope::Single),
            _ => None,
        }
    }

    /// Whether a rule with this apply_to takes part in a run of `scope`.
    /// `both` joins every run; `single` rules only run when the caller
    /// targets one explicit transaction.
    pub fn participates(&self, scope: RuleScope) -> bool {
        match self {
            RuleScope::Both => true,
            other => *other == scope,
        }
    }
}

/// Transaction field a condition tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    MerchantName,
    Amount,
    AmountExact,
    Category,
    Description,
    Date,
    Month,
    Year,
    DayOfWeek,
    AccountId,
    AccountType,
}

impl ConditionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::MerchantName => "merchant_name",
            ConditionField::Amount => "amount",
            ConditionField::AmountExact => "amount_exact",
            ConditionField::Category => "category",
            ConditionField::Description => "description",
            ConditionField::Date => "date",
            ConditionField::Month => "month",
            ConditionField::Year => "year",
            ConditionField::DayOfWeek => "day_of_week",
            ConditionField::AccountId => "account_id",
            ConditionField::AccountType => "account_type",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "merchant_name" => Some(ConditionField::MerchantName),
            "amount" => Some(ConditionField::Amount),
            "amount_exact" => Some(ConditionField::AmountExact),
            "category" => Some(ConditionField::Category),
            "description" => Some(ConditionField::Description),
            "date" => Some(ConditionField::Date),
            "month" => Some(ConditionField::Month),
            "year" => Some(ConditionField::Year),
            "day_of_week" => Some(ConditionField::DayOfWeek),
            "account_id" => Some(ConditionField::AccountId),
            "account_type" => Some(ConditionField::AccountType),
            _ => None,
        }
    }
}

/// Comparison a condition applies to its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
    Regex,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::StartsWith => "starts_with",
            ConditionOperator::EndsWith => "ends_with",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Between => "between",
            ConditionOperator::Regex => "regex",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "equals" => Some(ConditionOperator::Equals),
            "contains" => Some(ConditionOperator::Contains),
            "starts_with" => Some(ConditionOperator::StartsWith),
            "ends_with" => Some(ConditionOperator::EndsWith),
            "greater_than" => Some(ConditionOperator::GreaterThan),
            "less_than" => Some(ConditionOperator::LessThan),
            "between" => Some(ConditionOperator::Between),
            "regex" => Some(ConditionOperator::Regex),
            _ => None,
        }
    }
}

/// What a matched rule does to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetCategory,
    AddLabel,
    RemoveLabel,
    SetMerchant,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SetCategory => "set_category",
            ActionKind::AddLabel => "add_label",
            ActionKind::RemoveLabel => "remove_label",
            ActionKind::SetMerchant => "set_merchant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "set_category" => Some(ActionKind::SetCategory),
            "add_label" => Some(ActionKind::AddLabel),
            "remove_label" => Some(ActionKind::RemoveLabel),
            "set_merchant" => Some(ActionKind::SetMerchant),
            _ => None,
        }
    }
}

/// A categorization rule. Conditions and actions live in their own tables
/// and cascade on delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rule {
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
}

impl Rule {
    pub fn parsed_match_type(&self) -> Option<MatchType> {
        MatchType::from_str(&self.match_type)
    }

    pub fn parsed_scope(&self) -> Option<RuleScope> {
        RuleScope::from_str(&self.apply_to)
    }
}

/// One condition of a rule. Field and operator are stored as strings and
/// parsed into the closed enums at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RuleCondition {
    pub condition_id: Uuid,
    pub rule_id: Uuid,
    pub field: String,
    pub operator: String,
    pub value: String,
    pub value_max: Option<String>,
    pub position: i32,
}

/// One action of a rule, applied in position order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RuleAction {
    pub action_id: Uuid,
    pub rule_id: Uuid,
    pub action_type: String,
    pub action_value: String,
    pub position: i32,
}

/// A rule together with its ordered conditions and actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleWithParts {
    pub rule: Rule,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

/// Condition input for rule create/update; position comes from list order.
#[derive(Debug, Clone)]
pub struct RuleConditionInput {
    pub field: String,
    pub operator: String,
    pub value: String,
    pub value_max: Option<String>,
}

/// Action input for rule create/update; position comes from list order.
#[derive(Debug, Clone)]
pub struct RuleActionInput {
    pub action_type: String,
    pub action_value: String,
}

/// Input for creating a rule with its parts.
#[derive(Debug, Clone)]
pub struct CreateRule {
    pub organization_id: Uuid,
    pub name: String,
    pub match_type: String,
    pub apply_to: String,
    pub priority: i32,
    pub is_active: bool,
    pub conditions: Vec<RuleConditionInput>,
    pub actions: Vec<RuleActionInput>,
}

/// Patch input for updating a rule. Scalar None leaves the column
/// unchanged; Some conditions/actions replace the existing parts wholesale.
#[derive(Debug, Clone, Default)]
pub struct UpdateRule {
    pub name: Option<String>,
    pub match_type: Option<String>,
    pub apply_to: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub conditions: Option<Vec<RuleConditionInput>>,
    pub actions: Option<Vec<RuleActionInput>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_participation() {
        assert!(RuleScope::Both.participates(RuleScope::New));
        assert!(RuleScope::Both.participates(RuleScope::Existing));
        assert!(RuleScope::Both.participates(RuleScope::Single));
        assert!(RuleScope::New.participates(RuleScope::New));
        assert!(!RuleScope::New.participates(RuleScope::Existing));
        assert!(!RuleScope::Existing.participates(RuleScope::New));
        assert!(RuleScope::Single.participates(RuleScope::Single));
        assert!(!RuleScope::Single.participates(RuleScope::Existing));
    }

    #[test]
    fn closed_enums_reject_unknown_strings() {
        assert!(MatchType::from_str("some").is_none());
        assert!(RuleScope::from_str("all").is_none());
        assert!(ConditionField::from_str("memo").is_none());
        assert!(ConditionOperator::from_str("like").is_none());
        assert!(ActionKind::from_str("delete").is_none());
    }

    #[test]
    fn enum_strings_round_trip() {
        for field in [
            "merchant_name",
            "amount",
            "amount_exact",
            "category",
            "description",
            "date",
            "month",
            "year",
            "day_of_week",
            "account_id",
            "account_type",
        ] {
            assert_eq!(ConditionField::from_str(field).unwrap().as_str(), field);
        }
        for op in [
            "equals",
            "contains",
            "starts_with",
            "ends_with",
            "greater_than",
            "less_than",
            "between",
            "regex",
        ] {
            assert_eq!(ConditionOperator::from_str(op).unwrap().as_str(), op);
        }
    }
}
