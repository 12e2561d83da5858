use crate::error::{Result, StatementError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default reconciliation tolerance, in currency units.
///
/// Statements are usually displayed rounded to whole units, so two totals that
/// were derived independently may legitimately disagree by one unit.
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// What the evaluator does when a formula references a line the catalogue never defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingRefPolicy {
    /// Fail the statement with `StatementError::MissingRef`.
    #[default]
    Strict,

    /// Read the undefined line as zero and report it in the evaluation stats.
    /// Meant for catalogues that are still being authored.
    Lenient,
}

/// Line refs read by the standard cross-statement checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReconciliationRefs {
    #[schemars(description = "Balance sheet grand total of assets (e.g. 'BZ')")]
    pub total_assets: String,

    #[schemars(description = "Balance sheet grand total of liabilities and equity (e.g. 'DZ')")]
    pub total_liabilities_and_equity: String,

    #[schemars(description = "Cash-flow line carrying the net result of the period (e.g. 'FA')")]
    pub cash_flow_net_result: String,

    #[schemars(description = "Income statement final net result total (e.g. 'XI')")]
    pub income_statement_net_result: String,

    #[schemars(description = "Cash-flow opening net treasury (e.g. 'ZA')")]
    pub opening_treasury: String,

    #[schemars(description = "Cash-flow net treasury variation of the period (e.g. 'ZG')")]
    pub net_treasury_variation: String,

    #[schemars(description = "Cash-flow closing net treasury (e.g. 'ZH')")]
    pub closing_treasury: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    pub missing_refs: MissingRefPolicy,

    #[schemars(description = "Tolerance, in currency units, applied to reconciliation checks that do not set their own")]
    #[serde(default = "default_tolerance")]
    pub default_tolerance: f64,

    #[schemars(description = "Refs for the standard cross-statement checks. Checks are skipped when absent.")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationRefs>,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            missing_refs: MissingRefPolicy::default(),
            default_tolerance: DEFAULT_TOLERANCE,
            reconciliation: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tolerance(self.default_tolerance)
    }

    pub fn with_missing_refs(mut self, policy: MissingRefPolicy) -> Self {
        self.missing_refs = policy;
        self
    }

    pub fn with_reconciliation(mut self, refs: ReconciliationRefs) -> Self {
        self.reconciliation = Some(refs);
        self
    }
}

pub fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(StatementError::InvalidTolerance(tolerance));
    }
    Ok(())
}
