use crate::error::{Result, StatementError};
use crate::schema::StatementKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    #[schemars(description = "Sums debit minus credit (assets, expenses)")]
    DebitNet,

    #[schemars(description = "Sums credit minus debit (liabilities, equity, revenue)")]
    CreditNet,

    #[schemars(
        description = "Sums only the entries with a debit balance, each as debit minus credit (bank accounts shown as assets)"
    )]
    DebitBalances,

    #[schemars(
        description = "Sums only the entries with a credit balance, each as credit minus debit (bank overdrafts shown as liabilities)"
    )]
    CreditBalances,
}

impl Side {
    /// Contribution of a single entry to a bucket on this side.
    pub fn apply(self, debit: f64, credit: f64) -> f64 {
        match self {
            Side::DebitNet => debit - credit,
            Side::CreditNet => credit - debit,
            Side::DebitBalances => (debit - credit).max(0.0),
            Side::CreditBalances => (credit - debit).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BucketRule {
    #[schemars(description = "Bucket name, for diagnostics only")]
    pub name: String,

    #[schemars(
        description = "Account-code prefixes. An entry belongs to the bucket when its code starts with any of them. Buckets may overlap each other."
    )]
    pub prefixes: Vec<String>,

    pub side: Side,
}

impl BucketRule {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, prefixes: &[S], side: Side) -> Self {
        Self {
            name: name.into(),
            prefixes: prefixes.iter().map(|p| p.as_ref().to_string()).collect(),
            side,
        }
    }

    pub fn debit_net<S: AsRef<str>>(name: impl Into<String>, prefixes: &[S]) -> Self {
        Self::new(name, prefixes, Side::DebitNet)
    }

    pub fn credit_net<S: AsRef<str>>(name: impl Into<String>, prefixes: &[S]) -> Self {
        Self::new(name, prefixes, Side::CreditNet)
    }

    pub fn debit_balances<S: AsRef<str>>(name: impl Into<String>, prefixes: &[S]) -> Self {
        Self::new(name, prefixes, Side::DebitBalances)
    }

    pub fn credit_balances<S: AsRef<str>>(name: impl Into<String>, prefixes: &[S]) -> Self {
        Self::new(name, prefixes, Side::CreditBalances)
    }

    pub fn matches(&self, account_code: &str) -> bool {
        let code = account_code.trim();
        self.prefixes.iter().map(|p| p.trim()).any(|p| !p.is_empty() && code.starts_with(p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Sign {
    #[default]
    #[serde(rename = "+")]
    Plus,

    #[serde(rename = "-")]
    Minus,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Sign::Plus
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormulaTerm {
    #[serde(rename = "ref")]
    pub line_ref: String,

    #[serde(default, skip_serializing_if = "Sign::is_default")]
    pub sign: Sign,
}

impl FormulaTerm {
    pub fn plus(line_ref: impl Into<String>) -> Self {
        Self {
            line_ref: line_ref.into(),
            sign: Sign::Plus,
        }
    }

    pub fn minus(line_ref: impl Into<String>) -> Self {
        Self {
            line_ref: line_ref.into(),
            sign: Sign::Minus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItemKind {
    /// Backed by a trial-balance bucket. Without a bucket the leaf is manual-only
    /// and evaluates to zero unless overridden.
    Leaf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bucket: Option<BucketRule>,
    },

    /// Signed sum of other line items, leaves or derived.
    Derived { formula: Vec<FormulaTerm> },

    /// Display only.
    Heading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItemDef {
    #[schemars(description = "Short code, unique within the catalogue (e.g. 'TA', 'XA')")]
    #[serde(rename = "ref")]
    pub line_ref: String,

    #[schemars(description = "Display label, never used in computation")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub kind: LineItemKind,

    #[schemars(
        description = "Set to '-' for lines that are conventionally subtracted wherever they are referenced, even when the formula writes them with '+'"
    )]
    #[serde(default, skip_serializing_if = "Sign::is_default")]
    pub sign: Sign,
}

impl LineItemDef {
    pub fn leaf(line_ref: impl Into<String>, bucket: BucketRule) -> Self {
        Self {
            line_ref: line_ref.into(),
            label: None,
            kind: LineItemKind::Leaf {
                bucket: Some(bucket),
            },
            sign: Sign::Plus,
        }
    }

    pub fn manual(line_ref: impl Into<String>) -> Self {
        Self {
            line_ref: line_ref.into(),
            label: None,
            kind: LineItemKind::Leaf { bucket: None },
            sign: Sign::Plus,
        }
    }

    pub fn derived(line_ref: impl Into<String>, formula: Vec<FormulaTerm>) -> Self {
        Self {
            line_ref: line_ref.into(),
            label: None,
            kind: LineItemKind::Derived { formula },
            sign: Sign::Plus,
        }
    }

    /// Derived total that adds every listed ref.
    pub fn sum<S: AsRef<str>>(line_ref: impl Into<String>, refs: &[S]) -> Self {
        Self::derived(
            line_ref,
            refs.iter().map(|r| FormulaTerm::plus(r.as_ref())).collect(),
        )
    }

    pub fn heading(line_ref: impl Into<String>) -> Self {
        Self {
            line_ref: line_ref.into(),
            label: None,
            kind: LineItemKind::Heading,
            sign: Sign::Plus,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, LineItemKind::Leaf { .. })
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.kind, LineItemKind::Derived { .. })
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.kind, LineItemKind::Heading)
    }

    pub fn bucket(&self) -> Option<&BucketRule> {
        match &self.kind {
            LineItemKind::Leaf { bucket } => bucket.as_ref(),
            _ => None,
        }
    }

    pub fn formula(&self) -> Option<&[FormulaTerm]> {
        match &self.kind {
            LineItemKind::Derived { formula } => Some(formula),
            _ => None,
        }
    }
}

/// One statement as an ordered list of line items, normally loaded from a
/// versioned JSON data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Catalogue {
    #[schemars(description = "Catalogue name (e.g. 'bilan-actif', 'compte-de-resultat')")]
    pub name: String,

    #[schemars(description = "Version of the catalogue data file")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub statement: StatementKind,

    #[schemars(description = "Line items in display order")]
    pub items: Vec<LineItemDef>,
}

impl Catalogue {
    pub fn new(name: impl Into<String>, statement: StatementKind, items: Vec<LineItemDef>) -> Self {
        Self {
            name: name.into(),
            version: None,
            statement,
            items,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalogue: Catalogue = serde_json::from_str(json)?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Catalogue)
    }

    pub fn get(&self, line_ref: &str) -> Option<&LineItemDef> {
        self.items.iter().find(|i| i.line_ref == line_ref)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LineItemDef> + '_ {
        self.items.iter().filter(|i| i.is_leaf())
    }

    pub fn derived(&self) -> impl Iterator<Item = &LineItemDef> + '_ {
        self.items.iter().filter(|i| i.is_derived())
    }

    /// Refs of every item that carries a value, in catalogue order.
    pub fn value_refs(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.is_heading())
            .map(|i| i.line_ref.clone())
            .collect()
    }

    /// Index from ref to item position. Fails on duplicate refs.
    pub fn index(&self) -> Result<BTreeMap<&str, usize>> {
        let mut index = BTreeMap::new();
        for (pos, item) in self.items.iter().enumerate() {
            if index.insert(item.line_ref.as_str(), pos).is_some() {
                return Err(StatementError::DuplicateRef {
                    catalogue: self.name.clone(),
                    line_ref: item.line_ref.clone(),
                });
            }
        }
        Ok(index)
    }

    /// Checks the rules that hold whatever the missing-ref policy is: unique,
    /// non-empty refs, non-empty formulas, and no formula pointing at a heading.
    /// Undefined refs and cycles are the evaluator's concern.
    pub fn validate(&self) -> Result<()> {
        if let Some(item) = self.items.iter().find(|i| i.line_ref.trim().is_empty()) {
            return Err(StatementError::InvalidCatalogue(format!(
                "catalogue '{}' has a line item with an empty ref (label: {:?})",
                self.name, item.label
            )));
        }

        let index = self.index()?;

        for item in &self.items {
            let Some(formula) = item.formula() else {
                continue;
            };
            if formula.is_empty() {
                return Err(StatementError::InvalidCatalogue(format!(
                    "derived line '{}' in catalogue '{}' has an empty formula",
                    item.line_ref, self.name
                )));
            }
            for term in formula {
                if let Some(&pos) = index.get(term.line_ref.as_str()) {
                    if self.items[pos].is_heading() {
                        return Err(StatementError::HeadingReference {
                            catalogue: self.name.clone(),
                            referenced_by: item.line_ref.clone(),
                            heading: term.line_ref.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
