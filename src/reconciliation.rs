use crate::config::{ReconciliationRefs, DEFAULT_TOLERANCE};
use crate::schema::{MergedStatement, Period};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named equality between two independently derived numbers.
///
/// Both sides are closures so a rule can read any merged statement, or any
/// combination of them, at the moment it is checked.
pub struct ReconciliationRule<'a> {
    pub name: String,
    left: Box<dyn Fn() -> f64 + 'a>,
    right: Box<dyn Fn() -> f64 + 'a>,
    pub tolerance: f64,
}

impl fmt::Debug for ReconciliationRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationRule")
            .field("name", &self.name)
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl<'a> ReconciliationRule<'a> {
    /// Creates a rule using [`DEFAULT_TOLERANCE`].
    pub fn new(
        name: impl Into<String>,
        left: impl Fn() -> f64 + 'a,
        right: impl Fn() -> f64 + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            left: Box::new(left),
            right: Box::new(right),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn check(&self) -> ReconciliationOutcome {
        let left = (self.left)();
        let right = (self.right)();
        let gap = (left - right).abs();

        let status = if !gap.is_finite() {
            ReconciliationStatus::Incomparable
        } else if gap > self.tolerance || self.tolerance.is_nan() {
            ReconciliationStatus::Mismatch
        } else if gap == 0.0 {
            ReconciliationStatus::Exact
        } else {
            ReconciliationStatus::WithinTolerance
        };

        ReconciliationOutcome {
            name: self.name.clone(),
            ok: status.is_ok(),
            gap,
            left,
            right,
            tolerance: self.tolerance,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Both sides are identical.
    Exact,
    /// The sides differ by no more than the rule's tolerance.
    WithinTolerance,
    /// The sides differ by more than the tolerance.
    Mismatch,
    /// One side is not a finite number, typically because it reads a line that
    /// is absent from the statement.
    Incomparable,
}

impl ReconciliationStatus {
    pub fn is_ok(self) -> bool {
        matches!(
            self,
            ReconciliationStatus::Exact | ReconciliationStatus::WithinTolerance
        )
    }

    fn symbol(self) -> &'static str {
        match self {
            ReconciliationStatus::Exact => "OK",
            ReconciliationStatus::WithinTolerance => "~",
            ReconciliationStatus::Mismatch => "MISMATCH",
            ReconciliationStatus::Incomparable => "N/A",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub name: String,
    pub ok: bool,
    pub gap: f64,
    pub left: f64,
    pub right: f64,
    pub tolerance: f64,
    pub status: ReconciliationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub outcomes: Vec<ReconciliationOutcome>,
}

impl ReconciliationReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok)
    }

    pub fn get(&self, name: &str) -> Option<&ReconciliationOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReconciliationOutcome> + '_ {
        self.outcomes.iter().filter(|o| !o.ok)
    }

    /// Percentage of passing checks, rounded down. An empty report scores 100.
    pub fn coherence_score(&self) -> u8 {
        if self.outcomes.is_empty() {
            return 100;
        }
        let passed = self.outcomes.iter().filter(|o| o.ok).count();
        (passed * 100 / self.outcomes.len()) as u8
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Reconciliation Report\n\n");
        output.push_str(&format!(
            "**Coherence score:** {}% ({} of {} checks passed)\n\n",
            self.coherence_score(),
            self.outcomes.iter().filter(|o| o.ok).count(),
            self.outcomes.len()
        ));

        output.push_str("| Check | Status | Left | Right | Gap | Tolerance |\n");
        output.push_str("|---|---|---:|---:|---:|---:|\n");
        for outcome in &self.outcomes {
            output.push_str(&format!(
                "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
                outcome.name,
                outcome.status.symbol(),
                outcome.left,
                outcome.right,
                outcome.gap,
                outcome.tolerance
            ));
        }

        output
    }
}

/// Runs every rule. A failed check is reported with its numeric gap, never raised.
pub fn reconcile(rules: &[ReconciliationRule<'_>]) -> ReconciliationReport {
    let outcomes: Vec<ReconciliationOutcome> = rules.iter().map(ReconciliationRule::check).collect();

    for outcome in outcomes.iter().filter(|o| !o.ok) {
        warn!(
            "Reconciliation '{}' failed: {} vs {} (gap {}, tolerance {})",
            outcome.name, outcome.left, outcome.right, outcome.gap, outcome.tolerance
        );
    }
    debug!(
        "Reconciled {} rules, {} failed",
        outcomes.len(),
        outcomes.iter().filter(|o| !o.ok).count()
    );

    ReconciliationReport { outcomes }
}

fn period_suffix(period: Period) -> &'static str {
    match period {
        Period::Current => "current",
        Period::Prior => "prior",
    }
}

/// Value of a line in the first of `statements` that defines it, or NaN when
/// none does so the rule reports as incomparable.
///
/// A statement may be split over several catalogues (assets and liabilities
/// of the balance sheet), so every catalogue of the kind is searched.
fn line_value(statements: &[&MergedStatement], line_ref: &str, period: Period) -> f64 {
    statements
        .iter()
        .find_map(|s| s.value(line_ref, period))
        .unwrap_or(f64::NAN)
}

/// Total assets must equal total liabilities plus equity.
pub fn balance_sheet_equilibrium<'a>(
    balance_sheet: &'a [&'a MergedStatement],
    refs: &'a ReconciliationRefs,
    period: Period,
    tolerance: f64,
) -> ReconciliationRule<'a> {
    ReconciliationRule::new(
        format!("balance_sheet_equilibrium/{}", period_suffix(period)),
        move || line_value(balance_sheet, &refs.total_assets, period),
        move || line_value(balance_sheet, &refs.total_liabilities_and_equity, period),
    )
    .with_tolerance(tolerance)
}

/// The net result carried into the cash-flow statement must equal the income
/// statement's final net result.
pub fn net_result_agreement<'a>(
    cash_flow: &'a [&'a MergedStatement],
    income_statement: &'a [&'a MergedStatement],
    refs: &'a ReconciliationRefs,
    period: Period,
    tolerance: f64,
) -> ReconciliationRule<'a> {
    ReconciliationRule::new(
        format!("net_result_agreement/{}", period_suffix(period)),
        move || line_value(cash_flow, &refs.cash_flow_net_result, period),
        move || line_value(income_statement, &refs.income_statement_net_result, period),
    )
    .with_tolerance(tolerance)
}

pub fn treasury_roll_forward<'a>(
    cash_flow: &'a [&'a MergedStatement],
    refs: &'a ReconciliationRefs,
    period: Period,
    tolerance: f64,
) -> ReconciliationRule<'a> {
    ReconciliationRule::new(
        format!("treasury_roll_forward/{}", period_suffix(period)),
        move || line_value(cash_flow, &refs.closing_treasury, period),
        move || {
            line_value(cash_flow, &refs.opening_treasury, period)
                + line_value(cash_flow, &refs.net_treasury_variation, period)
        },
    )
    .with_tolerance(tolerance)
}

/// Balance-sheet equilibrium, net-result agreement and treasury roll-forward
/// for one period. Each argument holds every evaluated catalogue of that kind.
pub fn standard_rules<'a>(
    balance_sheet: &'a [&'a MergedStatement],
    income_statement: &'a [&'a MergedStatement],
    cash_flow: &'a [&'a MergedStatement],
    refs: &'a ReconciliationRefs,
    period: Period,
    tolerance: f64,
) -> Vec<ReconciliationRule<'a>> {
    vec![
        balance_sheet_equilibrium(balance_sheet, refs, period, tolerance),
        net_result_agreement(cash_flow, income_statement, refs, period, tolerance),
        treasury_roll_forward(cash_flow, refs, period, tolerance),
    ]
}
