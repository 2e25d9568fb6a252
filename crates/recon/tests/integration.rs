use std::path::{Path, PathBuf};

use listcheck_recon::engine::{reconcile, reconcile_with, run, ReconInput, ReconOptions};
use listcheck_recon::load::{load_csv_table, load_mapping_csv};
use listcheck_recon::{
    CompositeKey, FieldMapping, KeyFields, MappingTable, ReconConfig, ReconReport, Table, Value,
};
use proptest::prelude::*;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read(dir: &Path, file: &str) -> String {
    let path = dir.join(file);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load_input(dir: &Path, config: &ReconConfig) -> ReconInput {
    let from_file = match &config.mapping.file {
        Some(file) => load_mapping_csv(&read(dir, file)).unwrap().into_entries(),
        None => Vec::new(),
    };
    ReconInput {
        authority_primary: load_csv_table("authority_primary", &read(dir, &config.datasets.authority_primary))
            .unwrap(),
        authority_rules: load_csv_table("authority_rules", &read(dir, &config.datasets.authority_rules)).unwrap(),
        counterpart: load_csv_table("counterpart", &read(dir, &config.datasets.counterpart)).unwrap(),
        mapping: config.mapping_table(from_file).unwrap(),
    }
}

fn load_and_run(config_toml: &str) -> ReconReport {
    let config = ReconConfig::from_toml(config_toml).unwrap();
    let input = load_input(&fixtures_dir(), &config);
    run(&config, &input).unwrap()
}

fn keys_of(table: &Table, identity: &str, grouping: &str) -> Vec<String> {
    table
        .records()
        .map(|r| {
            let id = r.get(identity).map(Value::key_text).unwrap_or_default();
            let group = r.get(grouping).map(Value::key_text).unwrap_or_default();
            format!("{id}|{group}")
        })
        .collect()
}

// -------------------------------------------------------------------------
// Fixture runs
// -------------------------------------------------------------------------

#[test]
fn whitelist_partitions() {
    let toml = read(&fixtures_dir(), "whitelist.recon.toml");
    let report = load_and_run(&toml);
    let result = &report.result;

    assert_eq!(report.meta.config_name, "CCP vs AT whitelist");
    assert_eq!(keys_of(&result.authority_only, "symbol", "exchange"), vec!["BP|LSE"]);
    assert_eq!(keys_of(&result.counterpart_only, "symbol", "exchange"), vec!["TSLA|NASDAQ"]);
    assert_eq!(
        result.common,
        vec![
            CompositeKey::from("AAPL|NASDAQ"),
            CompositeKey::from("MSFT|NASDAQ"),
            CompositeKey::from("VOD|LSE"),
            CompositeKey::from("SAP|XETRA"),
        ]
    );
    assert_eq!(result.mismatched.len(), 1);
    assert_eq!(result.mismatched[0].key.as_str(), "MSFT|NASDAQ");

    let s = &result.statistics;
    assert_eq!(s.authority_records, 5);
    assert_eq!(s.counterpart_records, 5);
    assert_eq!(s.authority_only, 1);
    assert_eq!(s.counterpart_only, 1);
    assert_eq!(s.common, 4);
    assert_eq!(s.mismatched, 1);
    assert_eq!(s.mapped_fields, 4);
    assert_eq!(s.authority_only_fields, 2);
    assert_eq!(s.total_action_required, 3);
    assert!(s.is_balanced());
    assert!(result.integrity.is_clean());
}

#[test]
fn whitelist_aligned_columns() {
    let toml = read(&fixtures_dir(), "whitelist.recon.toml");
    let report = load_and_run(&toml);
    assert_eq!(
        report.result.authority_only.columns,
        vec![
            "symbol",
            "exchange",
            "min_order",
            "max_qty",
            "short_sell",
            "price_band",
            "authority_only_security_name",
            "authority_only_isin",
            "action",
        ]
    );
    assert_eq!(
        report.result.authority_only.get(0, "authority_only_security_name"),
        Some(&Value::text("BP plc"))
    );
    assert_eq!(report.result.authority_only.get(0, "short_sell"), Some(&Value::text("N")));
}

#[test]
fn whitelist_mismatch_detail() {
    let toml = read(&fixtures_dir(), "whitelist.recon.toml");
    let report = load_and_run(&toml);
    let m = &report.result.mismatched[0];
    assert_eq!(m.fields.len(), 1);
    assert_eq!(m.fields[0].authority_field, "minimum_order_value");
    assert_eq!(m.fields[0].counterpart_field, "min_order");
    assert_eq!(m.describe_fields(), "min_order (authority: 100, counterpart: 50)");

    let table = report.result.mismatched_table();
    assert_eq!(table.columns, vec!["symbol", "exchange", "mismatched_fields", "action"]);
    assert_eq!(table.get(0, "symbol"), Some(&Value::text("MSFT")));
}

#[test]
fn duplicate_rule_rows_abort_the_run() {
    let toml = read(&fixtures_dir(), "whitelist.recon.toml")
        .replace("ccp_market_rules.csv", "ccp_market_rules_dup.csv");
    let config = ReconConfig::from_toml(&toml).unwrap();
    let input = load_input(&fixtures_dir(), &config);
    let err = run(&config, &input).unwrap_err();
    assert_eq!(err.kind(), "CardinalityError");
    assert!(err.to_string().contains("'NASDAQ'"));
}

#[test]
fn json_contract() {
    let toml = read(&fixtures_dir(), "whitelist.recon.toml");
    let report = load_and_run(&toml);
    let json = serde_json::to_value(&report).unwrap();

    for field in [
        "meta",
        "key_fields",
        "authority_only",
        "counterpart_only",
        "common",
        "mismatched",
        "fields",
        "statistics",
        "integrity",
    ] {
        assert!(json.get(field).is_some(), "missing top-level field '{field}'");
    }
    assert_eq!(json["statistics"]["total_action_required"], 3);
    assert_eq!(json["common"][0], "AAPL|NASDAQ");
    assert_eq!(json["mismatched"][0]["fields"][0]["authority_value"], 100);
}

#[test]
fn config_and_data_from_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("primary.csv"), "symbol,exchange,min_order\nAAPL,NASDAQ,100\n").unwrap();
    std::fs::write(dir.path().join("rules.csv"), "").unwrap();
    std::fs::write(dir.path().join("at.csv"), "symbol,exchange,min_order\nAAPL,NASDAQ,100\n").unwrap();
    let config = ReconConfig::from_toml(
        r#"
name = "temp"
[datasets]
authority_primary = "primary.csv"
authority_rules = "rules.csv"
counterpart = "at.csv"
[[mapping.fields]]
authority = "min_order"
counterpart = "min_order"
"#,
    )
    .unwrap();
    let input = load_input(dir.path(), &config);
    let report = run(&config, &input).unwrap();
    assert_eq!(report.result.common, vec![CompositeKey::from("AAPL|NASDAQ")]);
    assert!(report.result.mismatched.is_empty());
}

// -------------------------------------------------------------------------
// Behavioural properties on small literal inputs
// -------------------------------------------------------------------------

fn min_order_mapping() -> MappingTable {
    MappingTable::new(vec![FieldMapping::mapped("min_order", "min_order")]).unwrap()
}

fn side(text: &str) -> Table {
    load_csv_table("side", text).unwrap()
}

#[test]
fn case_sensitive_identity() {
    let result = reconcile(
        &side("symbol,exchange,min_order\nAAPL,NASDAQ,1\n"),
        &Table::default(),
        &side("symbol,exchange,min_order\naapl,NASDAQ,1\n"),
        &min_order_mapping(),
        &KeyFields::new("symbol", "exchange"),
    )
    .unwrap();
    assert!(result.common.is_empty());
    assert_eq!(result.authority_only.len(), 1);
    assert_eq!(result.counterpart_only.len(), 1);
}

#[test]
fn empty_identity_matches_as_sentinel() {
    let result = reconcile(
        &side("symbol,exchange,min_order\n,LSE,1\n"),
        &Table::default(),
        &side("symbol,exchange,min_order\n,LSE,1\n"),
        &min_order_mapping(),
        &KeyFields::new("symbol", "exchange"),
    )
    .unwrap();
    assert_eq!(result.common, vec![CompositeKey::from("nan|LSE")]);
    assert_eq!(result.integrity.counterpart.sentinel_keys, 1);
    assert!(!result.integrity.is_clean());
}

#[test]
fn differing_identity_columns() {
    let result = reconcile(
        &side("symbol,exchange,min_order\nAAPL,NASDAQ,1\n"),
        &Table::default(),
        &side("ticker,exchange,min_order\nAAPL,NASDAQ,1\n"),
        &min_order_mapping(),
        &KeyFields::new("symbol", "exchange").with_counterpart_identity("ticker"),
    )
    .unwrap();
    assert_eq!(result.common.len(), 1);
}

#[test]
fn mapped_counterpart_field_absent_is_skipped() {
    let mapping = MappingTable::new(vec![
        FieldMapping::mapped("min_order", "min_order"),
        FieldMapping::mapped("lot", "lot_size"),
    ])
    .unwrap();
    let result = reconcile(
        &side("symbol,exchange,min_order,lot\nA,X,1,10\n"),
        &Table::default(),
        &side("symbol,exchange,min_order\nA,X,1\n"),
        &mapping,
        &KeyFields::new("symbol", "exchange"),
    )
    .unwrap();
    assert!(result.mismatched.is_empty());
    assert_eq!(result.fields.skipped.len(), 1);
    assert_eq!(result.fields.skipped[0].counterpart, "lot_size");
}

// -------------------------------------------------------------------------
// Property tests
// -------------------------------------------------------------------------

fn config_128() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

const SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "aapl", "VOD", ""];
const EXCHANGES: [&str; 2] = ["NASDAQ", "LSE"];

/// (symbol, exchange, min_order, notes) rows drawn from a small alphabet so
/// keys collide across and within sides.
fn arb_rows() -> impl Strategy<Value = Vec<(usize, usize, i64, String)>> {
    prop::collection::vec((0..SYMBOLS.len(), 0..EXCHANGES.len(), 0i64..3, "[a-c]{0,2}"), 0..12)
}

fn to_table(rows: &[(usize, usize, i64, String)]) -> Table {
    let mut text = String::from("symbol,exchange,min_order,notes\n");
    for (s, e, v, n) in rows {
        text.push_str(&format!("{},{},{},{}\n", SYMBOLS[*s], EXCHANGES[*e], v, n));
    }
    side(&text)
}

proptest! {
    #![proptest_config(config_128())]

    #[test]
    fn accounting_identity(a in arb_rows(), c in arb_rows()) {
        let authority = to_table(&a);
        let counterpart = to_table(&c);
        let result = reconcile(
            &authority,
            &Table::default(),
            &counterpart,
            &min_order_mapping(),
            &KeyFields::new("symbol", "exchange"),
        )
        .unwrap();
        let s = &result.statistics;

        prop_assert_eq!(s.authority_only + s.common_authority_rows, authority.len());
        prop_assert_eq!(s.counterpart_only + s.common_counterpart_rows, counterpart.len());
        prop_assert_eq!(result.authority_only.len(), s.authority_only);
        prop_assert_eq!(result.counterpart_only.len(), s.counterpart_only);
        prop_assert!(result.mismatched.len() <= result.common.len());
        for m in &result.mismatched {
            prop_assert!(result.common.contains(&m.key));
        }
    }

    #[test]
    fn idempotent(a in arb_rows(), c in arb_rows()) {
        let authority = to_table(&a);
        let counterpart = to_table(&c);
        let keys = KeyFields::new("symbol", "exchange");
        let options = ReconOptions::default();
        let r1 = reconcile_with(&authority, &Table::default(), &counterpart, &min_order_mapping(), &keys, &options)
            .unwrap();
        let r2 = reconcile_with(&authority, &Table::default(), &counterpart, &min_order_mapping(), &keys, &options)
            .unwrap();
        prop_assert_eq!(r1, r2);
    }

    #[test]
    fn unmapped_fields_do_not_affect_mismatches(a in arb_rows(), c in arb_rows()) {
        let keys = KeyFields::new("symbol", "exchange");
        let with_notes = reconcile(&to_table(&a), &Table::default(), &to_table(&c), &min_order_mapping(), &keys)
            .unwrap();

        let blank = |rows: &[(usize, usize, i64, String)]| {
            rows.iter().map(|(s, e, v, _)| (*s, *e, *v, String::new())).collect::<Vec<_>>()
        };
        let without_notes =
            reconcile(&to_table(&blank(&a)), &Table::default(), &to_table(&blank(&c)), &min_order_mapping(), &keys)
                .unwrap();

        let mismatched_keys = |r: &listcheck_recon::ReconResult| r.mismatched.iter().map(|m| m.key.clone()).collect::<Vec<_>>();
        prop_assert_eq!(mismatched_keys(&with_notes), mismatched_keys(&without_notes));
        prop_assert_eq!(with_notes.common, without_notes.common);
    }
}
