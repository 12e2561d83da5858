use proptest::prelude::*;

use crate::catalogue::{BucketRule, Catalogue, LineItemDef};
use crate::classifier::{classify, BucketClassifier, PrefixIndex};
use crate::config::MissingRefPolicy;
use crate::engine::Evaluator;
use crate::overrides::{OverrideMap, StatementOverrides};
use crate::reconciliation::{reconcile, ReconciliationRule};
use crate::schema::{StatementKind, TrialBalance, TrialBalanceEntry};

/// Whole-unit amounts keep every sum exact in f64.
fn amount() -> impl Strategy<Value = f64> {
    (0i64..1_000_000i64).prop_map(|units| units as f64)
}

/// Account codes drawn from a small set of classes so prefixes actually collide.
fn account_code() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("24"), Just("244"), Just("28"), Just("60"), Just("70"), Just("701")],
        0u32..100,
    )
        .prop_map(|(class, suffix)| format!("{}{}", class, suffix))
}

fn entry() -> impl Strategy<Value = TrialBalanceEntry> {
    (account_code(), amount(), amount())
        .prop_map(|(code, debit, credit)| TrialBalanceEntry::new(code, debit, credit))
}

fn trial_balance() -> impl Strategy<Value = TrialBalance> {
    prop::collection::vec(entry(), 0..40).prop_map(TrialBalance::new)
}

fn income_catalogue() -> Catalogue {
    Catalogue::new(
        "compte-de-resultat",
        StatementKind::IncomeStatement,
        vec![
            LineItemDef::leaf("TA", BucketRule::credit_net("sales", &["701"])),
            LineItemDef::leaf("TB", BucketRule::credit_net("other-sales", &["70"])),
            LineItemDef::leaf("RA", BucketRule::credit_net("purchases", &["60"])),
            LineItemDef::sum("XA", &["TA", "RA"]),
            LineItemDef::sum("XB", &["XA", "TB"]),
            LineItemDef::leaf("FX", BucketRule::debit_net("fixed-assets", &["24", "28"])),
        ],
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The trie index and the linear scan agree on every bucket.
    #[test]
    fn prop_index_matches_linear_scan(tb in trial_balance()) {
        let index = PrefixIndex::build(&tb);
        let rules = [
            BucketRule::debit_net("a", &["24"]),
            BucketRule::debit_net("b", &["244", "28"]),
            BucketRule::credit_net("c", &["70", "701"]),
            BucketRule::credit_net("d", &["6"]),
            BucketRule::debit_net("padded", &["24 ", " 70"]),
            BucketRule::debit_balances("e", &["24", "244"]),
            BucketRule::credit_balances("f", &["70", " 28"]),
        ];

        for rule in &rules {
            prop_assert_eq!(index.classify(rule), classify(&tb.entries, rule));
        }
    }

    /// A prefix nested under another prefix of the same bucket adds nothing.
    #[test]
    fn prop_nested_prefix_counted_once(tb in trial_balance()) {
        let index = PrefixIndex::build(&tb);
        let parent = BucketRule::debit_net("parent", &["24"]);
        let redundant = BucketRule::debit_net("redundant", &["24", "244", "2441"]);

        prop_assert_eq!(index.classify(&parent), index.classify(&redundant));
        prop_assert_eq!(classify(&tb.entries, &parent), classify(&tb.entries, &redundant));
    }

    /// Splitting a bucket by balance direction loses nothing: debit balances
    /// minus credit balances is the net debit.
    #[test]
    fn prop_balance_sides_partition_net(tb in trial_balance()) {
        let index = PrefixIndex::build(&tb);
        let prefixes = ["24", "60"];

        let debit = index.classify(&BucketRule::debit_balances("debit", &prefixes));
        let credit = index.classify(&BucketRule::credit_balances("credit", &prefixes));
        let net = index.classify(&BucketRule::debit_net("net", &prefixes));

        prop_assert!(debit >= 0.0 && credit >= 0.0);
        prop_assert_eq!(debit - credit, net);
    }

    /// Overlapping buckets each see the shared entries.
    #[test]
    fn prop_overlapping_buckets_are_independent(tb in trial_balance()) {
        let index = PrefixIndex::build(&tb);
        let parent = index.classify(&BucketRule::credit_net("parent", &["70"]));
        let child = index.classify(&BucketRule::credit_net("child", &["701"]));
        let rest: f64 = tb
            .entries
            .iter()
            .filter(|e| e.account_code.starts_with("70") && !e.account_code.starts_with("701"))
            .map(|e| e.credit - e.debit)
            .sum();

        prop_assert_eq!(parent, child + rest);
    }

    /// Same inputs, same statement.
    #[test]
    fn prop_evaluation_is_deterministic(
        current in trial_balance(),
        prior in trial_balance(),
        edit in amount(),
    ) {
        let catalogue = income_catalogue();
        let evaluator = Evaluator::new(&catalogue, MissingRefPolicy::Strict).unwrap();
        let current = PrefixIndex::build(&current);
        let prior = PrefixIndex::build(&prior);
        let overrides = StatementOverrides::current_only(OverrideMap::from([("RA", -edit)]));

        let first = evaluator.evaluate(&current, Some(&prior as &dyn BucketClassifier), &overrides);
        let second = evaluator.evaluate(&current, Some(&prior as &dyn BucketClassifier), &overrides);
        prop_assert_eq!(first, second);
    }

    /// Overriding a leaf moves exactly the lines that depend on it, by exactly
    /// the difference.
    #[test]
    fn prop_override_propagates_to_dependents_only(tb in trial_balance(), manual in amount()) {
        let catalogue = income_catalogue();
        let evaluator = Evaluator::new(&catalogue, MissingRefPolicy::Strict).unwrap();
        let index = PrefixIndex::build(&tb);

        let base = evaluator.evaluate_period(&index, &OverrideMap::new());
        let edited = evaluator.evaluate_period(&index, &OverrideMap::from([("TA", manual)]));

        let delta = manual - base.get("TA").unwrap();
        prop_assert_eq!(edited.get("TA"), Some(manual));
        prop_assert_eq!(edited.get("XA").unwrap(), base.get("XA").unwrap() + delta);
        prop_assert_eq!(edited.get("XB").unwrap(), base.get("XB").unwrap() + delta);
        prop_assert_eq!(edited.get("RA"), base.get("RA"));
        prop_assert_eq!(edited.get("TB"), base.get("TB"));
        prop_assert_eq!(edited.get("FX"), base.get("FX"));
    }

    /// Every line of the catalogue except headings receives a value.
    #[test]
    fn prop_every_line_is_valued(tb in trial_balance()) {
        let catalogue = income_catalogue();
        let evaluator = Evaluator::new(&catalogue, MissingRefPolicy::Strict).unwrap();
        let merged = evaluator.evaluate(&PrefixIndex::build(&tb), None, &StatementOverrides::default());

        let refs: Vec<String> = merged.iter().map(|v| v.line_ref.clone()).collect();
        prop_assert_eq!(refs, catalogue.value_refs());
    }

    /// The coherence score is the share of passing checks and stays within 0..=100.
    #[test]
    fn prop_coherence_score_bounded(gaps in prop::collection::vec(0i64..5, 1..12)) {
        let rules: Vec<ReconciliationRule<'_>> = gaps
            .iter()
            .enumerate()
            .map(|(i, &gap)| {
                ReconciliationRule::new(format!("rule-{}", i), move || gap as f64, || 0.0)
                    .with_tolerance(1.0)
            })
            .collect();
        let report = reconcile(&rules);

        let passing = gaps.iter().filter(|&&g| g <= 1).count();
        prop_assert_eq!(report.failures().count(), gaps.len() - passing);
        prop_assert_eq!(report.coherence_score() as usize, passing * 100 / gaps.len());
        prop_assert!(report.coherence_score() <= 100);
    }
}

#[test]
fn test_props_catalogue_is_well_formed() {
    let catalogue = income_catalogue();
    assert!(catalogue.validate().is_ok());
    assert_eq!(catalogue.leaves().count(), 4);
    assert_eq!(catalogue.derived().count(), 2);
}
