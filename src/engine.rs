use crate::catalogue::{BucketRule, Catalogue};
use crate::classifier::BucketClassifier;
use crate::config::MissingRefPolicy;
use crate::error::{Result, StatementError};
use crate::overrides::{OverrideMap, StatementOverrides};
use crate::schema::{MergedStatement, MergedValue};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStats {
    /// Number of times the classifier was consulted (one per non-overridden bucketed leaf).
    pub classifier_calls: usize,
    /// Number of derived formulas summed.
    pub derived_evaluations: usize,
    /// Number of leaves whose value came from the override map.
    pub overrides_applied: usize,
    /// Override entries that were not applied because they target a derived
    /// line, a heading, or an unknown ref.
    pub ignored_overrides: Vec<String>,
    /// Undefined refs that were read as zero under the lenient policy.
    pub unresolved_refs: Vec<String>,
}

/// Values of one catalogue for one period, keyed by line ref.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodEvaluation {
    pub values: BTreeMap<String, f64>,
    pub stats: EvaluationStats,
}

impl PeriodEvaluation {
    pub fn get(&self, line_ref: &str) -> Option<f64> {
        self.values.get(line_ref).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Validated dependency order of a catalogue's derived lines. Built once per
/// catalogue; a structural error is raised here, before any value is computed.
#[derive(Debug, Clone)]
pub struct EvaluationPlan<'a> {
    catalogue: &'a Catalogue,
    index: BTreeMap<&'a str, usize>,
    derived_order: Vec<usize>,
    unresolved: BTreeSet<String>,
}

impl<'a> EvaluationPlan<'a> {
    /// Validates the catalogue and orders its derived lines so that every line
    /// comes after the derived lines its formula references.
    ///
    /// Fails with [`StatementError::Cycle`] naming the cycle's refs in the order
    /// they reference each other, and under the strict policy with
    /// [`StatementError::MissingRef`] for the first undefined ref.
    pub fn build(catalogue: &'a Catalogue, policy: MissingRefPolicy) -> Result<Self> {
        catalogue.validate()?;
        let index = catalogue.index()?;
        let items = &catalogue.items;

        let mut marks = vec![Mark::Unvisited; items.len()];
        let mut derived_order = Vec::new();
        let mut unresolved = BTreeSet::new();

        for start in 0..items.len() {
            if !items[start].is_derived() || marks[start] != Mark::Unvisited {
                continue;
            }

            // Iterative DFS: (item position, next formula term to visit).
            marks[start] = Mark::InProgress;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(top) = stack.last_mut() {
                let (pos, next) = *top;
                let formula = items[pos].formula().unwrap_or(&[]);

                if next == formula.len() {
                    marks[pos] = Mark::Done;
                    derived_order.push(pos);
                    stack.pop();
                    continue;
                }
                top.1 += 1;

                let term = &formula[next];
                let Some(&dep) = index.get(term.line_ref.as_str()) else {
                    match policy {
                        MissingRefPolicy::Strict => {
                            return Err(StatementError::MissingRef {
                                catalogue: catalogue.name.clone(),
                                referenced_by: items[pos].line_ref.clone(),
                                missing: term.line_ref.clone(),
                            });
                        }
                        MissingRefPolicy::Lenient => {
                            unresolved.insert(term.line_ref.clone());
                            continue;
                        }
                    }
                };

                if !items[dep].is_derived() {
                    continue;
                }

                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        let from = stack.iter().position(|&(p, _)| p == dep).unwrap_or(0);
                        let cycle = stack[from..]
                            .iter()
                            .map(|&(p, _)| items[p].line_ref.clone())
                            .collect();
                        return Err(StatementError::Cycle {
                            catalogue: catalogue.name.clone(),
                            cycle,
                        });
                    }
                    Mark::Done => {}
                }
            }
        }

        if !unresolved.is_empty() {
            warn!(
                "Catalogue '{}' references undefined lines {:?}; they will read as zero",
                catalogue.name, unresolved
            );
        }

        Ok(Self {
            catalogue,
            index,
            derived_order,
            unresolved,
        })
    }

    pub fn catalogue(&self) -> &'a Catalogue {
        self.catalogue
    }

    /// Derived refs in evaluation order.
    pub fn derived_order(&self) -> Vec<&'a str> {
        self.derived_order
            .iter()
            .map(|&p| self.catalogue.items[p].line_ref.as_str())
            .collect()
    }

    pub fn unresolved_refs(&self) -> impl Iterator<Item = &str> + '_ {
        self.unresolved.iter().map(String::as_str)
    }

    /// Weight with which a referenced line enters a formula: its own sign,
    /// or `+1` for an unresolved ref.
    fn item_factor(&self, line_ref: &str) -> f64 {
        self.index
            .get(line_ref)
            .map_or(1.0, |&p| self.catalogue.items[p].sign.factor())
    }
}

/// Evaluates one catalogue. Holds no state between calls beyond the
/// precomputed plan, so the same evaluator can be reused for any number of
/// trial balances and override maps.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    plan: EvaluationPlan<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalogue: &'a Catalogue, policy: MissingRefPolicy) -> Result<Self> {
        Ok(Self {
            plan: EvaluationPlan::build(catalogue, policy)?,
        })
    }

    pub fn plan(&self) -> &EvaluationPlan<'a> {
        &self.plan
    }

    pub fn evaluate_period(
        &self,
        classifier: &dyn BucketClassifier,
        overrides: &OverrideMap,
    ) -> PeriodEvaluation {
        let catalogue = self.plan.catalogue;
        let mut values: BTreeMap<String, f64> = BTreeMap::new();
        let mut stats = EvaluationStats::default();

        for item in catalogue.leaves() {
            let value = if let Some(manual) = overrides.get(&item.line_ref) {
                stats.overrides_applied += 1;
                manual
            } else if let Some(bucket) = item.bucket() {
                stats.classifier_calls += 1;
                classifier.classify(bucket)
            } else {
                0.0
            };
            values.insert(item.line_ref.clone(), value);
        }

        stats.ignored_overrides = overrides.inapplicable(catalogue);
        if !stats.ignored_overrides.is_empty() {
            warn!(
                "Ignoring overrides for non-leaf lines {:?} in catalogue '{}'",
                stats.ignored_overrides, catalogue.name
            );
        }

        for &pos in &self.plan.derived_order {
            let item = &catalogue.items[pos];
            let total: f64 = item
                .formula()
                .unwrap_or(&[])
                .iter()
                .map(|term| {
                    let value = values.get(&term.line_ref).copied().unwrap_or(0.0);
                    term.sign.factor() * self.plan.item_factor(&term.line_ref) * value
                })
                .sum();
            stats.derived_evaluations += 1;
            values.insert(item.line_ref.clone(), total + 0.0);
        }

        stats.unresolved_refs = self.plan.unresolved.iter().cloned().collect();

        PeriodEvaluation { values, stats }
    }

    /// Evaluates the current and prior columns independently and merges them.
    /// A missing prior snapshot classifies every bucket as zero, so the prior
    /// column then only reflects prior-period overrides.
    pub fn evaluate(
        &self,
        current: &dyn BucketClassifier,
        prior: Option<&dyn BucketClassifier>,
        overrides: &StatementOverrides,
    ) -> MergedStatement {
        let catalogue = self.plan.catalogue;
        info!(
            "Evaluating catalogue '{}' ({} lines, {} derived)",
            catalogue.name,
            catalogue.items.len(),
            self.plan.derived_order.len()
        );

        let empty = |_: &BucketRule| 0.0;
        let prior_classifier: &dyn BucketClassifier = match prior {
            Some(classifier) => classifier,
            None => &empty,
        };
        let current_eval = self.evaluate_period(current, &overrides.current);
        let prior_eval = self.evaluate_period(prior_classifier, &overrides.prior);

        debug!(
            "Catalogue '{}': current {:?}, prior {:?}",
            catalogue.name, current_eval.stats, prior_eval.stats
        );

        let order = catalogue.value_refs();
        let values = order
            .iter()
            .map(|r| {
                let merged = MergedValue {
                    line_ref: r.clone(),
                    current: current_eval.get(r).unwrap_or(0.0),
                    prior: prior_eval.get(r).unwrap_or(0.0),
                };
                (r.clone(), merged)
            })
            .collect();

        MergedStatement {
            catalogue: catalogue.name.clone(),
            statement: catalogue.statement,
            order,
            values,
            current_stats: current_eval.stats,
            prior_stats: prior_eval.stats,
        }
    }
}

/// Evaluates a catalogue under the strict missing-ref policy.
pub fn evaluate(
    catalogue: &Catalogue,
    current: &dyn BucketClassifier,
    prior: Option<&dyn BucketClassifier>,
    overrides: &StatementOverrides,
) -> Result<MergedStatement> {
    Ok(Evaluator::new(catalogue, MissingRefPolicy::Strict)?.evaluate(current, prior, overrides))
}
