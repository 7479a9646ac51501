//! Investment holding model for hearth-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A position in one symbol. Prices are caller-updated; there is no
/// market-data integration in this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub holding_id: Uuid,
    pub organization_id: Uuid,
    pub account_id: Option<Uuid>,
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub last_price: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Holding {
    pub fn market_value(&self) -> Decimal {
        (self.quantity * self.last_price).round_dp(2)
    }

    pub fn cost_basis(&self) -> Decimal {
        (self.quantity * self.average_cost).round_dp(2)
    }

    pub fn unrealized_gain(&self) -> Decimal {
        self.market_value() - self.cost_basis()
    }

    /// Gain as a percent of cost basis; zero basis reports zero.
    pub fn gain_percent(&self) -> Decimal {
        let basis = self.cost_basis();
        if basis == Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.unrealized_gain() / basis * Decimal::ONE_HUNDRED).round_dp(2)
    }
}
