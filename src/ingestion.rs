use crate::error::{Result, StatementError};
use crate::schema::{TrialBalance, TrialBalanceEntry};
use log::info;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// One CSV row as exported by the accounting package. Amount cells may be blank.
#[derive(Debug, Deserialize)]
struct TrialBalanceRow {
    account_code: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    debit: Option<String>,
    #[serde(default)]
    credit: Option<String>,
}

fn parse_amount(raw: Option<&str>, line: u64, column: &str) -> Result<f64> {
    let Some(cell) = raw.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(0.0);
    };
    let normalized: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
    let amount = normalized.parse::<f64>().map_err(|_| {
        StatementError::Import(format!(
            "line {}: {} amount '{}' is not a number",
            line, column, cell
        ))
    })?;
    if !amount.is_finite() {
        return Err(StatementError::Import(format!(
            "line {}: {} amount '{}' is not a finite number",
            line, column, cell
        )));
    }
    Ok(amount)
}

/// Reads a trial balance from CSV with the header `account_code,debit,credit`
/// and an optional `label` column.
///
/// Account codes are kept verbatim; malformed codes are reported later by the
/// classifier rather than rejected here.
pub fn read_trial_balance_csv<R: Read>(reader: R) -> Result<TrialBalance> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in csv_reader.deserialize::<TrialBalanceRow>() {
        let row = record?;
        // Header is line 1.
        let line = entries.len() as u64 + 2;
        entries.push(TrialBalanceEntry {
            account_code: row.account_code,
            label: row.label.filter(|l| !l.is_empty()),
            debit: parse_amount(row.debit.as_deref(), line, "debit")?,
            credit: parse_amount(row.credit.as_deref(), line, "credit")?,
        });
    }

    info!("Imported {} trial balance rows from CSV", entries.len());
    Ok(TrialBalance::new(entries))
}

pub fn load_trial_balance_csv(path: impl AsRef<Path>) -> Result<TrialBalance> {
    let file = std::fs::File::open(path)?;
    read_trial_balance_csv(file)
}

pub fn read_trial_balance_json(json: &str) -> Result<TrialBalance> {
    let trial_balance: TrialBalance = serde_json::from_str(json)?;
    info!(
        "Imported {} trial balance rows from JSON",
        trial_balance.entries.len()
    );
    Ok(trial_balance)
}
