use crate::catalogue::{BucketRule, Side};
use crate::schema::{TrialBalance, TrialBalanceEntry};
use crate::utils::{account_code_problem, normalize_prefixes};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A trial-balance entry that was skipped because its account code is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationWarning {
    pub account_code: String,
    pub reason: String,
}

/// Anything that can turn a bucket rule into a number.
///
/// The evaluator only sees this trait, so tests can substitute a closure and
/// production code can use a [`PrefixIndex`].
pub trait BucketClassifier {
    fn classify(&self, rule: &BucketRule) -> f64;
}

impl<F> BucketClassifier for F
where
    F: Fn(&BucketRule) -> f64,
{
    fn classify(&self, rule: &BucketRule) -> f64 {
        self(rule)
    }
}

impl BucketClassifier for TrialBalance {
    fn classify(&self, rule: &BucketRule) -> f64 {
        classify(&self.entries, rule)
    }
}

/// Sums the bucket's side over every well-formed entry matching one of its
/// prefixes. Scans the whole slice on every call and caches nothing.
///
/// Buckets may overlap: a parent bucket (`24`) and a child bucket (`244`) both
/// include an entry coded `2441`. Within one bucket an entry is counted once.
pub fn classify(entries: &[TrialBalanceEntry], rule: &BucketRule) -> f64 {
    let total: f64 = entries
        .iter()
        .filter(|e| account_code_problem(&e.account_code).is_none())
        .filter(|e| rule.matches(&e.account_code))
        .map(|e| rule.side.apply(e.debit, e.credit))
        .sum();
    // An empty f64 sum is -0.0.
    total + 0.0
}

/// Collects a warning for every entry whose account code is malformed.
pub fn scan_account_codes(entries: &[TrialBalanceEntry]) -> Vec<ClassificationWarning> {
    entries
        .iter()
        .filter_map(|e| {
            account_code_problem(&e.account_code).map(|reason| ClassificationWarning {
                account_code: e.account_code.clone(),
                reason,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
struct PrefixNode {
    debit: f64,
    credit: f64,
    debit_balances: f64,
    credit_balances: f64,
    entries: usize,
    children: BTreeMap<char, PrefixNode>,
}

impl PrefixNode {
    fn add(&mut self, entry: &TrialBalanceEntry) {
        self.debit += entry.debit;
        self.credit += entry.credit;
        self.debit_balances += Side::DebitBalances.apply(entry.debit, entry.credit);
        self.credit_balances += Side::CreditBalances.apply(entry.debit, entry.credit);
        self.entries += 1;
    }

    fn total(&self, side: Side) -> f64 {
        match side {
            Side::DebitNet | Side::CreditNet => side.apply(self.debit, self.credit),
            Side::DebitBalances => self.debit_balances,
            Side::CreditBalances => self.credit_balances,
        }
    }
}

/// Prefix trie over one trial-balance snapshot.
///
/// Every node stores the totals of all entries whose code starts with the
/// node's path: debit, credit, and the per-entry debit and credit balances.
/// A bucket lookup costs one walk per prefix whatever the number of entries.
#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    root: PrefixNode,
    warnings: Vec<ClassificationWarning>,
}

impl PrefixIndex {
    pub fn build(trial_balance: &TrialBalance) -> Self {
        Self::from_entries(&trial_balance.entries)
    }

    pub fn from_entries(entries: &[TrialBalanceEntry]) -> Self {
        let mut index = PrefixIndex::default();

        for entry in entries {
            if let Some(reason) = account_code_problem(&entry.account_code) {
                warn!(
                    "Skipping trial balance entry '{}': {}",
                    entry.account_code, reason
                );
                index.warnings.push(ClassificationWarning {
                    account_code: entry.account_code.clone(),
                    reason,
                });
                continue;
            }
            index.insert(entry);
        }

        debug!(
            "Indexed {} trial balance entries ({} skipped)",
            index.root.entries,
            index.warnings.len()
        );

        index
    }

    fn insert(&mut self, entry: &TrialBalanceEntry) {
        let mut node = &mut self.root;
        node.add(entry);
        for c in entry.account_code.trim().chars() {
            node = node.children.entry(c).or_default();
            node.add(entry);
        }
    }

    fn node(&self, prefix: &str) -> Option<&PrefixNode> {
        prefix
            .chars()
            .try_fold(&self.root, |node, c| node.children.get(&c))
    }

    /// Number of indexed entries whose code starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.node(prefix).map_or(0, |n| n.entries)
    }

    pub fn indexed_entries(&self) -> usize {
        self.root.entries
    }

    pub fn warnings(&self) -> &[ClassificationWarning] {
        &self.warnings
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl BucketClassifier for PrefixIndex {
    fn classify(&self, rule: &BucketRule) -> f64 {
        let total: f64 = normalize_prefixes(&rule.prefixes)
            .iter()
            .filter_map(|p| self.node(p))
            .map(|n| n.total(rule.side))
            .sum();
        total + 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Side;

    fn sample_entries() -> Vec<TrialBalanceEntry> {
        vec![
            TrialBalanceEntry::new("244", 100.0, 0.0),
            TrialBalanceEntry::new("2451", 250.0, 50.0),
            TrialBalanceEntry::new("701", 0.0, 1000.0),
            TrialBalanceEntry::new("601", 400.0, 0.0),
            TrialBalanceEntry::new("5641", 0.0, 30.0),
            TrialBalanceEntry::new("521", 80.0, 0.0),
        ]
    }

    #[test]
    fn test_classify_debit_and_credit_net() {
        let entries = sample_entries();

        let sales = BucketRule::credit_net("sales", &["701"]);
        assert_eq!(classify(&entries, &sales), 1000.0);

        let purchases = BucketRule::debit_net("purchases", &["601"]);
        assert_eq!(classify(&entries, &purchases), 400.0);

        let purchases_signed = BucketRule::credit_net("purchases", &["601"]);
        assert_eq!(classify(&entries, &purchases_signed), -400.0);
    }

    #[test]
    fn test_classify_empty_match_is_zero() {
        let entries = sample_entries();
        let rule = BucketRule::debit_net("nothing", &["99"]);
        assert_eq!(classify(&entries, &rule), 0.0);
        assert_eq!(classify(&[], &rule), 0.0);
    }

    #[test]
    fn test_overlapping_buckets_both_include_entry() {
        let entries = vec![TrialBalanceEntry::new("244", 100.0, 0.0)];
        let parent = BucketRule::debit_net("parent", &["24"]);
        let child = BucketRule::debit_net("child", &["244"]);

        assert!(classify(&entries, &parent) >= 100.0);
        assert_eq!(classify(&entries, &child), 100.0);

        let index = PrefixIndex::from_entries(&entries);
        assert!(index.classify(&parent) >= 100.0);
        assert_eq!(index.classify(&child), 100.0);
    }

    #[test]
    fn test_nested_prefixes_in_one_bucket_count_once() {
        let entries = sample_entries();
        let rule = BucketRule::new("bank overdrafts", &["56", "564"], Side::CreditNet);

        assert_eq!(classify(&entries, &rule), 30.0);
        assert_eq!(PrefixIndex::from_entries(&entries).classify(&rule), 30.0);
    }

    #[test]
    fn test_malformed_codes_are_skipped_and_reported() {
        let mut entries = sample_entries();
        entries.push(TrialBalanceEntry::new("7O1", 0.0, 999.0));
        entries.push(TrialBalanceEntry::new("", 5.0, 0.0));
        entries.push(TrialBalanceEntry::new("7", 0.0, 1.0));

        let sales = BucketRule::credit_net("sales", &["7"]);
        assert_eq!(classify(&entries, &sales), 1000.0);

        let index = PrefixIndex::from_entries(&entries);
        assert_eq!(index.classify(&sales), 1000.0);
        assert_eq!(index.warning_count(), 3);
        assert_eq!(index.indexed_entries(), 6);
        assert_eq!(scan_account_codes(&entries).len(), 3);
    }

    #[test]
    fn test_prefix_index_matches_linear_scan() {
        let entries = sample_entries();
        let index = PrefixIndex::from_entries(&entries);
        let rules = vec![
            BucketRule::debit_net("fixed assets", &["24"]),
            BucketRule::debit_net("equipment", &["244", "246"]),
            BucketRule::credit_net("revenue", &["70", "71"]),
            BucketRule::debit_net("treasury", &["5"]),
            BucketRule::credit_net("unknown", &["8"]),
        ];

        for rule in &rules {
            let linear = classify(&entries, rule);
            let indexed = index.classify(rule);
            assert!(
                (linear - indexed).abs() < 1e-9,
                "{}: linear {} vs indexed {}",
                rule.name,
                linear,
                indexed
            );
        }
    }

    #[test]
    fn test_empty_bucket_is_positive_zero() {
        let entries = sample_entries();
        let rule = BucketRule::debit_net("nothing", &["99"]);

        let linear = classify(&entries, &rule);
        let indexed = PrefixIndex::from_entries(&entries).classify(&rule);
        assert!(linear.is_sign_positive());
        assert!(indexed.is_sign_positive());
        assert_eq!(serde_json::to_string(&indexed).unwrap(), "0.0");
    }

    #[test]
    fn test_padded_prefix_agrees_between_scan_and_index() {
        let entries = vec![TrialBalanceEntry::new("244", 100.0, 0.0)];
        let rule = BucketRule::debit_net("padded", &["24 "]);

        assert_eq!(classify(&entries, &rule), 100.0);
        assert_eq!(PrefixIndex::from_entries(&entries).classify(&rule), 100.0);
    }

    #[test]
    fn test_overdraft_split_by_balance_direction() {
        let entries = vec![
            TrialBalanceEntry::new("5211", 1500.0, 200.0),
            TrialBalanceEntry::new("5212", 100.0, 400.0),
            TrialBalanceEntry::new("571", 80.0, 0.0),
        ];
        let index = PrefixIndex::from_entries(&entries);

        let cash = BucketRule::debit_balances("cash", &["52", "57"]);
        let overdrafts = BucketRule::credit_balances("overdrafts", &["52"]);
        let net = BucketRule::debit_net("net treasury", &["52", "57"]);

        assert_eq!(classify(&entries, &cash), 1380.0);
        assert_eq!(index.classify(&cash), 1380.0);
        assert_eq!(classify(&entries, &overdrafts), 300.0);
        assert_eq!(index.classify(&overdrafts), 300.0);
        assert_eq!(index.classify(&net), 1080.0);
        assert_eq!(index.classify(&cash) - index.classify(&overdrafts), index.classify(&net));
    }

    #[test]
    fn test_prefix_counts() {
        let index = PrefixIndex::from_entries(&sample_entries());
        assert_eq!(index.count("24"), 2);
        assert_eq!(index.count("2451"), 1);
        assert_eq!(index.count("9"), 0);
        assert_eq!(index.count(""), 6);
    }

    #[test]
    fn test_closure_and_trial_balance_classifiers() {
        let tb = TrialBalance::new(sample_entries());
        let rule = BucketRule::credit_net("sales", &["701"]);
        assert_eq!(BucketClassifier::classify(&tb, &rule), 1000.0);

        let fixed = |_: &BucketRule| 42.0;
        assert_eq!(fixed.classify(&rule), 42.0);
    }
}
