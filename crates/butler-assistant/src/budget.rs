//! Budget threshold checks for the expense flow.
//!
//! A category without a budget row, or with `NULL` limits, behaves as if
//! both limits were [`DEFAULT_LIMIT`], which in practice never warns.

use rust_decimal::Decimal;

use crate::lines;

/// Stand-in for a missing budget or per-transaction cap.
pub const DEFAULT_LIMIT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Limits configured for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetLimits {
    /// Monthly budget.
    pub max_budget: Decimal,
    /// Largest single transaction before the assistant remarks on it.
    pub max_tx: Decimal,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_budget: DEFAULT_LIMIT,
            max_tx: DEFAULT_LIMIT,
        }
    }
}

impl BudgetLimits {
    /// Build limits from nullable columns, substituting [`DEFAULT_LIMIT`].
    pub fn from_columns(max_budget: Option<Decimal>, max_tx: Option<Decimal>) -> Self {
        Self {
            max_budget: max_budget.unwrap_or(DEFAULT_LIMIT),
            max_tx: max_tx.unwrap_or(DEFAULT_LIMIT),
        }
    }
}

/// Evaluates spend against [`BudgetLimits`] with a warning threshold.
#[derive(Debug, Clone, Copy)]
pub struct BudgetCheck {
    warn_threshold: Decimal,
}

impl BudgetCheck {
    /// Warn once usage reaches `warn_threshold` (a share, e.g. `0.8`).
    pub const fn new(warn_threshold: Decimal) -> Self {
        Self { warn_threshold }
    }

    /// Warning shown before the amount is asked, when the month's spend so
    /// far sits between the threshold and the full budget.
    pub fn before_amount(
        &self,
        category: &str,
        spent: Decimal,
        limits: &BudgetLimits,
    ) -> Option<String> {
        let usage = usage(spent, limits.max_budget)?;
        (self.warn_threshold..=Decimal::ONE).contains(&usage).then(|| {
            format!(
                "Master, might I warn you that we are at {} of our {category} budget. ({} of {})",
                format_percent(usage),
                format_money(spent),
                format_money(limits.max_budget),
            )
        })
    }

    /// Remarks on a freshly entered amount: a shame line when it exceeds
    /// the per-transaction cap, then a warning when it pushes the month
    /// past the threshold.
    pub fn after_amount(
        &self,
        category: &str,
        spent: Decimal,
        amount: Decimal,
        limits: &BudgetLimits,
    ) -> Vec<String> {
        let mut remarks = Vec::new();
        if amount > limits.max_tx {
            remarks.push(lines::pick(&lines::LINES_SHAME).to_owned());
        }
        if let Some(usage) = usage(spent.saturating_add(amount), limits.max_budget)
            .filter(|usage| *usage >= self.warn_threshold)
        {
            remarks.push(format!(
                "By the way, this transaction puts us at {} of our allocated budget for {category}",
                format_percent(usage),
            ));
        }
        remarks
    }
}

/// Share of `budget` used by `spent`; `None` for a zero budget.
fn usage(spent: Decimal, budget: Decimal) -> Option<Decimal> {
    spent.checked_div(budget)
}

/// Format an amount with thousands separators and two decimals.
pub fn format_money(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (sign, digits) = fixed
        .strip_prefix('-')
        .map_or(("", fixed.as_str()), |rest| ("-", rest));
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, "00"));

    let reversed: Vec<char> = whole.chars().rev().collect();
    let mut groups: Vec<String> = reversed
        .chunks(3)
        .map(|chunk| chunk.iter().rev().collect())
        .collect();
    groups.reverse();
    format!("{sign}{}.{frac}", groups.join(","))
}

/// Format a share as a percentage with one decimal.
pub fn format_percent(share: Decimal) -> String {
    let percent = share.saturating_mul(Decimal::ONE_HUNDRED).round_dp(1);
    format!("{percent:.1}%")
}
