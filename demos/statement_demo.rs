use statement_engine::{
    load_trial_balance_csv, process_filing, Catalogue, EngineConfig, FilingInput, OverrideMap,
    ReconciliationRefs, StatementOverrides,
};
use std::collections::BTreeMap;

fn main() {
    let catalogues = ["bilan", "compte-de-resultat", "flux-de-tresorerie"]
        .iter()
        .map(|name| Catalogue::from_path(format!("data/catalogues/{}.json", name)))
        .collect::<Result<Vec<_>, _>>()
        .expect("catalogues should load");

    let current = load_trial_balance_csv("data/trial_balance_2024.csv")
        .expect("current trial balance should load");
    let prior = load_trial_balance_csv("data/trial_balance_2023.csv")
        .expect("prior trial balance should load");

    let mut overrides = BTreeMap::new();
    overrides.insert(
        "flux-de-tresorerie".to_string(),
        StatementOverrides::current_only(OverrideMap::from([
            ("ZA", 500.0),
            ("FB", -300.0),
            ("FF", 100.0),
        ])),
    );

    let config = EngineConfig::default().with_reconciliation(ReconciliationRefs {
        total_assets: "BZ".to_string(),
        total_liabilities_and_equity: "DZ".to_string(),
        cash_flow_net_result: "FA".to_string(),
        income_statement_net_result: "XI".to_string(),
        opening_treasury: "ZA".to_string(),
        net_treasury_variation: "ZG".to_string(),
        closing_treasury: "ZH".to_string(),
    });

    let input = FilingInput {
        catalogues,
        current,
        prior: Some(prior),
        overrides,
    };
    let output = process_filing(&config, &input).expect("filing should process");

    for catalogue in &input.catalogues {
        let Some(statement) = output.statements.get(&catalogue.name) else {
            continue;
        };
        println!("== {} ==", catalogue.name);
        for item in &catalogue.items {
            let label = item.label.as_deref().unwrap_or("");
            match statement.get(&item.line_ref) {
                Some(value) => println!(
                    "  {:<4} {:<52} {:>12.2} {:>12.2}",
                    item.line_ref, label, value.current, value.prior
                ),
                None => println!("  {}", label),
            }
        }
        println!();
    }

    for (name, error) in &output.failures {
        println!("Catalogue {} failed: {}", name, error);
    }

    if let Some(report) = &output.reconciliation {
        println!("{}", report.to_markdown());
    }
}
