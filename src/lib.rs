//! # Statement Engine
//!
//! Builds the standard financial statements (balance sheet, income statement,
//! cash-flow statement, note tables) from a flat trial balance, and cross-checks
//! them against each other.
//!
//! ## Core Concepts
//!
//! - **Trial Balance**: Ledger accounts with their debit and credit totals for one period
//! - **Bucket**: Accounts selected by code prefix and netted on the debit or credit side.
//!   Buckets may overlap; an account can feed several lines
//! - **Catalogue**: Ordered line items of one statement. Leaves read a bucket, derived
//!   lines sum other lines (including other derived lines), headings are display only
//! - **Overrides**: Manual leaf values entered by the user; derived lines are always recomputed
//! - **Reconciliation**: Named equalities between statements (assets = liabilities + equity,
//!   cash-flow net result = income-statement net result, treasury roll-forward),
//!   reported with their numeric gap
//!
//! Every call is pure: inputs are passed explicitly and nothing is cached between calls.
//!
//! ## Example
//!
//! ```rust
//! use statement_engine::*;
//!
//! let catalogue = Catalogue::new(
//!     "compte-de-resultat",
//!     StatementKind::IncomeStatement,
//!     vec![
//!         LineItemDef::leaf("TA", BucketRule::credit_net("sales", &["701"])),
//!         LineItemDef::leaf("RA", BucketRule::credit_net("purchases", &["601"])),
//!         LineItemDef::sum("XA", &["TA", "RA"]),
//!     ],
//! );
//!
//! let current = TrialBalance::new(vec![
//!     TrialBalanceEntry::new("701", 0.0, 1000.0),
//!     TrialBalanceEntry::new("601", 400.0, 0.0),
//! ]);
//!
//! let engine = StatementEngine::new(EngineConfig::default());
//! let merged = engine
//!     .evaluate_statement(&catalogue, &current, None, &StatementOverrides::default())
//!     .unwrap();
//!
//! assert_eq!(merged.current("XA"), Some(600.0));
//! ```

pub mod catalogue;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod overrides;
pub mod reconciliation;
pub mod schema;
pub mod utils;

#[cfg(test)]
mod engine_props;

pub use catalogue::{BucketRule, Catalogue, FormulaTerm, LineItemDef, LineItemKind, Side, Sign};
pub use classifier::{classify, BucketClassifier, ClassificationWarning, PrefixIndex};
pub use config::{EngineConfig, MissingRefPolicy, ReconciliationRefs, DEFAULT_TOLERANCE};
pub use engine::{evaluate, EvaluationPlan, EvaluationStats, Evaluator, PeriodEvaluation};
pub use error::{Result, StatementError};
pub use ingestion::*;
pub use overrides::{OverrideMap, StatementOverrides};
pub use reconciliation::{
    reconcile, standard_rules, ReconciliationOutcome, ReconciliationReport, ReconciliationRule,
    ReconciliationStatus,
};
pub use schema::*;

use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Everything needed to produce one filing: the statements' catalogues, the
/// trial balances, and the user's manual edits per catalogue name.
#[derive(Debug, Clone, Default)]
pub struct FilingInput {
    pub catalogues: Vec<Catalogue>,
    pub current: TrialBalance,
    pub prior: Option<TrialBalance>,
    pub overrides: BTreeMap<String, StatementOverrides>,
}

#[derive(Debug)]
pub struct FilingOutput {
    /// Successfully evaluated statements, keyed by catalogue name.
    pub statements: BTreeMap<String, MergedStatement>,
    /// Catalogues that could not be evaluated, with the structural error.
    pub failures: Vec<(String, StatementError)>,
    pub current_warnings: Vec<ClassificationWarning>,
    pub prior_warnings: Vec<ClassificationWarning>,
    /// Standard cross-statement checks when configured: the current period,
    /// plus the prior period when a prior snapshot was supplied.
    pub reconciliation: Option<ReconciliationReport>,
}

/// Every statement of the given kind, in catalogue-name order. A balance sheet
/// is often split into an assets and a liabilities catalogue.
fn statements_of(
    statements: &BTreeMap<String, MergedStatement>,
    kind: StatementKind,
) -> Vec<&MergedStatement> {
    statements.values().filter(|s| s.statement == kind).collect()
}

impl FilingOutput {
    /// First statement of the given kind, in catalogue-name order.
    pub fn statement(&self, kind: StatementKind) -> Option<&MergedStatement> {
        self.statements.values().find(|s| s.statement == kind)
    }

    pub fn statements_of(&self, kind: StatementKind) -> Vec<&MergedStatement> {
        statements_of(&self.statements, kind)
    }

    pub fn warning_count(&self) -> usize {
        self.current_warnings.len() + self.prior_warnings.len()
    }
}

pub struct StatementEngine {
    config: EngineConfig,
}

impl StatementEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluates a single catalogue against its own prefix indexes.
    pub fn evaluate_statement(
        &self,
        catalogue: &Catalogue,
        current: &TrialBalance,
        prior: Option<&TrialBalance>,
        overrides: &StatementOverrides,
    ) -> Result<MergedStatement> {
        let current_index = PrefixIndex::build(current);
        let prior_index = prior.map(PrefixIndex::build);
        self.evaluate_indexed(catalogue, &current_index, prior_index.as_ref(), overrides)
    }

    fn evaluate_indexed(
        &self,
        catalogue: &Catalogue,
        current: &PrefixIndex,
        prior: Option<&PrefixIndex>,
        overrides: &StatementOverrides,
    ) -> Result<MergedStatement> {
        let evaluator = Evaluator::new(catalogue, self.config.missing_refs)?;
        Ok(evaluator.evaluate(
            current,
            prior.map(|p| p as &dyn BucketClassifier),
            overrides,
        ))
    }

    /// Evaluates every catalogue of the filing and runs the configured checks.
    ///
    /// Each trial balance is indexed once and shared by all catalogues. A
    /// catalogue with a structural error is reported in `failures` and does not
    /// stop the others.
    pub fn process(&self, input: &FilingInput) -> Result<FilingOutput> {
        self.config.validate()?;

        info!(
            "Processing filing with {} catalogues ({} current entries, prior snapshot: {})",
            input.catalogues.len(),
            input.current.len(),
            input.prior.is_some()
        );

        let totals = input.current.totals();
        if !totals.is_balanced(self.config.default_tolerance) {
            warn!(
                "Current trial balance does not balance: debit {} vs credit {}",
                totals.total_debit, totals.total_credit
            );
        }

        let current_index = PrefixIndex::build(&input.current);
        let prior_index = input.prior.as_ref().map(PrefixIndex::build);

        let no_overrides = StatementOverrides::default();
        let mut statements = BTreeMap::new();
        let mut failures = Vec::new();

        for catalogue in &input.catalogues {
            let overrides = input.overrides.get(&catalogue.name).unwrap_or(&no_overrides);
            match self.evaluate_indexed(catalogue, &current_index, prior_index.as_ref(), overrides) {
                Ok(merged) => {
                    statements.insert(catalogue.name.clone(), merged);
                }
                Err(e) => {
                    warn!("Catalogue '{}' could not be evaluated: {}", catalogue.name, e);
                    failures.push((catalogue.name.clone(), e));
                }
            }
        }

        let reconciliation = self.config.reconciliation.as_ref().map(|refs| {
            let balance_sheet = statements_of(&statements, StatementKind::BalanceSheet);
            let income_statement = statements_of(&statements, StatementKind::IncomeStatement);
            let cash_flow = statements_of(&statements, StatementKind::CashFlow);
            let (balance_sheet, income_statement, cash_flow) =
                (&balance_sheet[..], &income_statement[..], &cash_flow[..]);
            let tolerance = self.config.default_tolerance;

            let periods: &[Period] = if input.prior.is_some() {
                &[Period::Current, Period::Prior]
            } else {
                &[Period::Current]
            };

            let rules: Vec<ReconciliationRule<'_>> = periods
                .iter()
                .flat_map(move |&period| {
                    standard_rules(
                        balance_sheet,
                        income_statement,
                        cash_flow,
                        refs,
                        period,
                        tolerance,
                    )
                })
                .collect();
            let report = reconcile(&rules);
            debug!("Coherence score: {}%", report.coherence_score());
            report
        });

        let output = FilingOutput {
            statements,
            failures,
            current_warnings: current_index.warnings().to_vec(),
            prior_warnings: prior_index
                .as_ref()
                .map(|p| p.warnings().to_vec())
                .unwrap_or_default(),
            reconciliation,
        };

        Ok(output)
    }
}

pub fn process_filing(config: &EngineConfig, input: &FilingInput) -> Result<FilingOutput> {
    StatementEngine::new(config.clone()).process(input)
}
