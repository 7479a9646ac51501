//! Debt payoff projection and strategy comparison.
//!
//! Pure and synchronous, like the rule engine: everything here operates on
//! in-memory `DebtAccount` views and returns plain data for the API layer
//! to serialize. No I/O, no shared state.
//!
//! Snowball and avalanche run one synchronized month-by-month simulation
//! over the whole debt set: every month each open debt accrues interest and
//! receives its minimum payment, then the surplus (extra payment plus the
//! minimums freed by already-cleared debts) goes to the first open debt in
//! strategy order, rolling over within the month when it clears that debt.
//! Simulating the months together, rather than projecting each debt in
//! isolation with a freed-minimums constant, is what keeps avalanche's
//! total interest at or below snowball's for any debt set.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::DebtAccount;

/// Hard cap on projected months (100 years). A debt still open at the cap
/// is reported as never paying off, not as taking 1200 months.
pub const MAX_PROJECTION_MONTHS: u32 = 1200;

/// One month of a projected amortization.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub month: u32,
    pub payment: Decimal,
    pub interest: Decimal,
    pub balance: Decimal,
}

/// Projection for a single debt.
///
/// `months_to_payoff` is None when the debt never amortizes under the
/// projected payments; `total_interest` then reports interest accrued up to
/// the projection cap and the schedule is omitted.
#[derive(Debug, Clone, Serialize)]
pub struct DebtProjection {
    pub account_id: Uuid,
    pub name: String,
    pub months_to_payoff: Option<u32>,
    pub total_interest: Decimal,
    pub schedule: Vec<ScheduleEntry>,
}

/// Totals for one payoff strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResult {
    pub total_months: Option<u32>,
    pub total_interest: Decimal,
    pub debt_free_date: Option<NaiveDate>,
    pub debts: Vec<DebtProjection>,
}

/// All three strategies side by side, with savings versus the
/// current-pace baseline. Deltas are None when either side never pays off.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyComparison {
    pub snowball: StrategyResult,
    pub avalanche: StrategyResult,
    pub current_pace: StrategyResult,
    pub snowball_interest_saved: Option<Decimal>,
    pub snowball_months_saved: Option<i64>,
    pub avalanche_interest_saved: Option<Decimal>,
    pub avalanche_months_saved: Option<i64>,
}

fn monthly_rate(debt: &DebtAccount) -> Decimal {
    debt.interest_rate / Decimal::ONE_HUNDRED / Decimal::from(12)
}

/// Amortize one debt in isolation with a fixed monthly budget of
/// minimum + extra + freed minimums. Interest accrues first, then the
/// payment applies, clamped so the final month never overpays.
pub fn project(
    debt: &DebtAccount,
    extra_payment: Decimal,
    freed_minimums: Decimal,
) -> DebtProjection {
    let rate = monthly_rate(debt);
    let budget = debt.minimum_payment + extra_payment + freed_minimums;

    let mut balance = debt.balance;
    let mut total_interest = Decimal::ZERO;
    let mut schedule = Vec::new();
    let mut months_to_payoff = if balance <= Decimal::ZERO {
        Some(0)
    } else {
        None
    };

    let mut month = 0;
    while balance > Decimal::ZERO && month < MAX_PROJECTION_MONTHS {
        month += 1;
        let interest = (balance * rate).round_dp(2);
        balance += interest;
        total_interest += interest;
        let payment = budget.min(balance);
        balance -= payment;
        schedule.push(ScheduleEntry {
            month,
            payment,
            interest,
            balance,
        });
        if balance <= Decimal::ZERO {
            months_to_payoff = Some(month);
        }
    }

    if months_to_payoff.is_none() {
        schedule.clear();
    }

    DebtProjection {
        account_id: debt.account_id,
        name: debt.name.clone(),
        months_to_payoff,
        total_interest,
        schedule,
    }
}

struct SimDebt<'a> {
    debt: &'a DebtAccount,
    rate: Decimal,
    balance: Decimal,
    total_interest: Decimal,
    months_to_payoff: Option<u32>,
    schedule: Vec<ScheduleEntry>,
    month_interest: Decimal,
    month_payment: Decimal,
}

/// Synchronized simulation over debts in the given order. Debts that start
/// at zero balance are carried through as already paid off and contribute
/// nothing to the freed-minimums pool.
fn simulate(ordered: &[&DebtAccount], extra_payment: Decimal) -> Vec<DebtProjection> {
    let mut sims: Vec<SimDebt> = ordered
        .iter()
        .map(|debt| SimDebt {
            debt,
            rate: monthly_rate(debt),
            balance: debt.balance,
            total_interest: Decimal::ZERO,
            months_to_payoff: if debt.balance <= Decimal::ZERO {
                Some(0)
            } else {
                None
            },
            schedule: Vec::new(),
            month_interest: Decimal::ZERO,
            month_payment: Decimal::ZERO,
        })
        .collect();

    for month in 1..=MAX_PROJECTION_MONTHS {
        if sims.iter().all(|s| s.balance <= Decimal::ZERO) {
            break;
        }

        // Minimums freed by debts that cleared in earlier months. A debt
        // that started at zero was never part of the budget; a debt that
        // never clears never frees anything.
        let mut surplus = extra_payment
            + sims
                .iter()
                .filter(|s| s.balance <= Decimal::ZERO && s.debt.balance > Decimal::ZERO)
                .map(|s| s.debt.minimum_payment)
                .sum::<Decimal>();

        for s in sims.iter_mut() {
            if s.balance <= Decimal::ZERO {
                continue;
            }
            let interest = (s.balance * s.rate).round_dp(2);
            s.balance += interest;
            s.total_interest += interest;
            s.month_interest = interest;
            s.month_payment = Decimal::ZERO;
        }

        // Minimum payments, clamped on the final month; the unused part of
        // a clamped minimum joins the surplus for this month.
        for s in sims.iter_mut() {
            if s.balance <= Decimal::ZERO {
                continue;
            }
            let payment = s.debt.minimum_payment.min(s.balance);
            s.balance -= payment;
            s.month_payment += payment;
            surplus += s.debt.minimum_payment - payment;
        }

        // Surplus targets the first open debt in strategy order and rolls
        // over within the month when it clears one.
        for s in sims.iter_mut() {
            if surplus <= Decimal::ZERO {
                break;
            }
            if s.balance <= Decimal::ZERO {
                continue;
            }
            let payment = surplus.min(s.balance);
            s.balance -= payment;
            s.month_payment += payment;
            surplus -= payment;
        }

        for s in sims.iter_mut() {
            if s.month_payment > Decimal::ZERO || s.month_interest > Decimal::ZERO {
                s.schedule.push(ScheduleEntry {
                    month,
                    payment: s.month_payment,
                    interest: s.month_interest,
                    balance: s.balance,
                });
            }
            s.month_interest = Decimal::ZERO;
            s.month_payment = Decimal::ZERO;
            if s.balance <= Decimal::ZERO && s.months_to_payoff.is_none() {
                s.months_to_payoff = Some(month);
            }
        }
    }

    sims.into_iter()
        .map(|s| {
            let schedule = if s.months_to_payoff.is_some() {
                s.schedule
            } else {
                Vec::new()
            };
            DebtProjection {
                account_id: s.debt.account_id,
                name: s.debt.name.clone(),
                months_to_payoff: s.months_to_payoff,
                total_interest: s.total_interest,
                schedule,
            }
        })
        .collect()
}

fn build_result(
    projections: Vec<DebtProjection>,
    has_active: bool,
    today: NaiveDate,
) -> StrategyResult {
    let total_months = projections
        .iter()
        .fold(Some(0u32), |acc, p| match (acc, p.months_to_payoff) {
            (Some(a), Some(m)) => Some(a.max(m)),
            _ => None,
        });
    let total_interest = projections
        .iter()
        .map(|p| p.total_interest)
        .sum::<Decimal>();
    let debt_free_date = if has_active {
        total_months.and_then(|m| today.checked_add_months(Months::new(m)))
    } else {
        None
    };

    StrategyResult {
        total_months,
        total_interest,
        debt_free_date,
        debts: projections,
    }
}

fn has_active(debts: &[DebtAccount]) -> bool {
    debts.iter().any(|d| d.balance > Decimal::ZERO)
}

/// Smallest balance first; ties keep the caller's order.
pub fn calculate_snowball(
    debts: &[DebtAccount],
    extra_payment: Decimal,
    today: NaiveDate,
) -> StrategyResult {
    let mut ordered: Vec<&DebtAccount> = debts.iter().collect();
    ordered.sort_by(|a, b| a.balance.cmp(&b.balance));
    build_result(simulate(&ordered, extra_payment), has_active(debts), today)
}

/// Highest rate first; ties keep the caller's order.
pub fn calculate_avalanche(
    debts: &[DebtAccount],
    extra_payment: Decimal,
    today: NaiveDate,
) -> StrategyResult {
    let mut ordered: Vec<&DebtAccount> = debts.iter().collect();
    ordered.sort_by(|a, b| b.interest_rate.cmp(&a.interest_rate));
    build_result(simulate(&ordered, extra_payment), has_active(debts), today)
}

/// Baseline: minimum payments only, no reordering, no extra payment and no
/// freed-minimum redirection.
pub fn calculate_current_pace(debts: &[DebtAccount], today: NaiveDate) -> StrategyResult {
    let projections = debts
        .iter()
        .map(|d| project(d, Decimal::ZERO, Decimal::ZERO))
        .collect();
    build_result(projections, has_active(debts), today)
}

fn savings(strategy: &StrategyResult, baseline: &StrategyResult) -> (Option<Decimal>, Option<i64>) {
    match (strategy.total_months, baseline.total_months) {
        (Some(s), Some(b)) => (
            Some(baseline.total_interest - strategy.total_interest),
            Some(i64::from(b) - i64::from(s)),
        ),
        _ => (None, None),
    }
}

/// Run all three strategies and report them side by side.
pub fn compare_strategies(
    debts: &[DebtAccount],
    extra_payment: Decimal,
    today: NaiveDate,
) -> StrategyComparison {
    let snowball = calculate_snowball(debts, extra_payment, today);
    let avalanche = calculate_avalanche(debts, extra_payment, today);
    let current_pace = calculate_current_pace(debts, today);

    let (snowball_interest_saved, snowball_months_saved) = savings(&snowball, &current_pace);
    let (avalanche_interest_saved, avalanche_months_saved) = savings(&avalanche, &current_pace);

    StrategyComparison {
        snowball,
        avalanche,
        current_pace,
        snowball_interest_saved,
        snowball_months_saved,
        avalanche_interest_saved,
        avalanche_months_saved,
    }
}
