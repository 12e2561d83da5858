use crate::engine::EvaluationStats;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrialBalanceEntry {
    #[schemars(description = "Ledger account code, 2 to 12 digits (e.g. '601', '4011000')")]
    pub account_code: String,

    #[schemars(description = "Optional account label. Display only, never used in computation.")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[schemars(description = "Total debit movements for the period")]
    #[serde(default)]
    pub debit: f64,

    #[schemars(description = "Total credit movements for the period")]
    #[serde(default)]
    pub credit: f64,
}

impl TrialBalanceEntry {
    pub fn new(account_code: impl Into<String>, debit: f64, credit: f64) -> Self {
        Self {
            account_code: account_code.into(),
            label: None,
            debit,
            credit,
        }
    }
}

/// A read-only snapshot of the ledger for one reporting period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrialBalance {
    #[schemars(description = "Closing date of the reporting period, if known")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,

    pub entries: Vec<TrialBalanceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceTotals {
    pub total_debit: f64,
    pub total_credit: f64,
}

impl TrialBalanceTotals {
    pub fn difference(&self) -> f64 {
        (self.total_debit - self.total_credit).abs()
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        self.difference() <= tolerance
    }
}

impl TrialBalance {
    pub fn new(entries: Vec<TrialBalanceEntry>) -> Self {
        Self {
            period_end: None,
            entries,
        }
    }

    pub fn with_period_end(mut self, period_end: NaiveDate) -> Self {
        self.period_end = Some(period_end);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sums debit and credit columns over every entry, malformed codes included.
    pub fn totals(&self) -> TrialBalanceTotals {
        self.entries.iter().fold(
            TrialBalanceTotals {
                total_debit: 0.0,
                total_credit: 0.0,
            },
            |acc, e| TrialBalanceTotals {
                total_debit: acc.total_debit + e.debit,
                total_credit: acc.total_credit + e.credit,
            },
        )
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TrialBalance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementKind {
    #[schemars(description = "Statement of financial position (assets vs liabilities and equity)")]
    BalanceSheet,

    #[schemars(description = "Statement of profit or loss for the period")]
    IncomeStatement,

    #[schemars(description = "Statement of cash flows (treasury movements for the period)")]
    CashFlow,

    #[schemars(description = "Explanatory note table backed by the trial balance")]
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Current,
    Prior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedValue {
    #[serde(rename = "ref")]
    pub line_ref: String,
    pub current: f64,
    pub prior: f64,
}

impl MergedValue {
    pub fn get(&self, period: Period) -> f64 {
        match period {
            Period::Current => self.current,
            Period::Prior => self.prior,
        }
    }
}

/// The evaluated values of one catalogue, current and prior period side by side.
///
/// Headings never appear here. `order` keeps the catalogue's row order so a
/// renderer can walk the values without consulting the catalogue again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedStatement {
    pub catalogue: String,
    pub statement: StatementKind,
    pub order: Vec<String>,
    pub values: BTreeMap<String, MergedValue>,
    pub current_stats: EvaluationStats,
    pub prior_stats: EvaluationStats,
}

impl MergedStatement {
    pub fn get(&self, line_ref: &str) -> Option<&MergedValue> {
        self.values.get(line_ref)
    }

    pub fn value(&self, line_ref: &str, period: Period) -> Option<f64> {
        self.values.get(line_ref).map(|v| v.get(period))
    }

    pub fn current(&self, line_ref: &str) -> Option<f64> {
        self.value(line_ref, Period::Current)
    }

    pub fn prior(&self, line_ref: &str) -> Option<f64> {
        self.value(line_ref, Period::Prior)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = &MergedValue> + '_ {
        self.order.iter().filter_map(|r| self.values.get(r))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
