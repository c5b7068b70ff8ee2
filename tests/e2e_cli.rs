
use assert_cmd::prelude::*;
use cli_helpers::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn setup_temp_home() -> TempDir {
    TempDir::new().expect("failed to create temp home")
}

#[test]
fn analyze_prints_monthly_table_without_ansi_when_piped() {
    let home = setup_temp_home();

    let mut cmd = base_cmd(&home);
    cmd.args([
        "analyze",
        "--feed",
        FEED,
        "--prices",
        PRICES,
        "--cash-flow-basis",
        "trades",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2024-03"))
        .stdout(predicate::str::contains("10.00%"))
        .stdout(predicate::str::contains("Total Return:"))
        .stdout(predicate::str::contains("MALFORMED_RECORD"))
        .stdout(predicate::str::contains("\u{001b}[").not());
}

#[test]
fn analyze_json_with_config_and_benchmark() {
    let home = setup_temp_home();
    let json = run_cmd_json(
        &home,
        &[
            "--config",
            CONFIG,
            "analyze",
            "--feed",
            FEED,
            "--prices",
            PRICES,
            "--benchmark",
            BENCHMARK,
        ],
    )
    .expect("analyze should succeed");

    let monthly = json["analysis"]["monthly_returns"]
        .as_array()
        .expect("monthly_returns array");
    assert_eq!(monthly.len(), 3);
    assert_eq!(monthly[0]["month"], "2024-02");
    assert!((decimal_field(&monthly[1]["portfolio_return"]) - 0.10).abs() < 1e-9);
    assert!((decimal_field(&monthly[0]["benchmark_return"]) - 0.0198).abs() < 1e-9);
    assert!(monthly[2]["benchmark_return"].is_null());
    assert!((decimal_field(&json["analysis"]["total_return"]) - 0.2).abs() < 1e-6);
    assert_eq!(json["duplicates_dropped"], 1);

    let kinds: Vec<&str> = json["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|w| w["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"benchmark_gap"));
    assert!(kinds.contains(&"malformed_record"));
}

#[test]
fn analyze_accepts_lower_case_config_tickers() {
    let home = setup_temp_home();
    let config = home.path().join("lower.toml");
    std::fs::write(
        &config,
        r#"
[analysis]
cash_flow_basis = "trades"

[benchmark]
allocation = { spy = 0.98, vea = 0.02 }
"#,
    )
    .expect("write config");

    let json = run_cmd_json(
        &home,
        &[
            "--config",
            config.to_str().unwrap(),
            "analyze",
            "--feed",
            FEED,
            "--prices",
            PRICES,
            "--benchmark",
            BENCHMARK,
        ],
    )
    .expect("lower-case allocation should resolve against the series");

    let monthly = json["analysis"]["monthly_returns"].as_array().unwrap();
    assert!((decimal_field(&monthly[0]["benchmark_return"]) - 0.0198).abs() < 1e-9);
}

#[test]
fn analyze_builds_benchmark_from_prices() {
    let home = setup_temp_home();
    let json = run_cmd_json(
        &home,
        &[
            "analyze",
            "--feed",
            FEED,
            "--prices",
            PRICES,
            "--cash-flow-basis",
            "trades",
            "--benchmark-prices",
            PRICES,
            "--weight",
            "aaa=1",
        ],
    )
    .expect("analyze should succeed");

    let monthly = json["analysis"]["monthly_returns"].as_array().unwrap();
    assert_eq!(monthly[0]["month"], "2024-02");
    assert!(decimal_field(&monthly[0]["benchmark_return"]).abs() < 1e-9);
    assert!((decimal_field(&monthly[1]["benchmark_return"]) - 0.10).abs() < 1e-9);
    assert!((decimal_field(&monthly[2]["benchmark_return"]) - 1.0 / 11.0).abs() < 1e-9);
}

#[test]
fn analyze_weights_without_series_fail() {
    let home = setup_temp_home();
    let mut cmd = base_cmd(&home);
    cmd.args([
        "analyze",
        "--feed",
        FEED,
        "--prices",
        PRICES,
        "--weight",
        "SPY=1",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--benchmark-prices"));
}

#[test]
fn analyze_strict_weights_fail() {
    let home = setup_temp_home();
    let mut cmd = base_cmd(&home);
    cmd.args([
        "analyze",
        "--feed",
        FEED,
        "--prices",
        PRICES,
        "--benchmark",
        BENCHMARK,
        "--weight",
        "SPY=0.9",
        "--weight",
        "VEA=0.05",
        "--strict",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("outside 1 ± 0.001"));
}

#[test]
fn analyze_writes_audit_csv() {
    let home = setup_temp_home();
    let audit = home.path().join("audit.csv");
    let audit_arg = audit.to_str().unwrap();

    run_cmd(
        &home,
        &[
            "analyze",
            "--feed",
            FEED,
            "--prices",
            PRICES,
            "--benchmark",
            BENCHMARK,
            "--weight",
            "SPY=0.98",
            "--weight",
            "VEA=0.02",
            "--cash-flow-basis",
            "trades",
            "--audit-csv",
            audit_arg,
        ],
    )
    .expect("analyze should succeed");

    let content = std::fs::read_to_string(&audit).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "date,portfolio_return,cumulative_value,benchmark_return,SPY_return,VEA_return"
    );
    assert_eq!(lines[1], "2024-02,0,1,0.0198,0.02,0.01");
    assert_eq!(lines[2], "2024-03,0.1,1.1,0.0104,0.01,0.03");
    assert!(lines[3].starts_with("2024-04,"));
    assert!(lines[3].ends_with(",,-0.01,"));
}

#[test]
fn analyze_rejects_unknown_method() {
    let home = setup_temp_home();
    let mut cmd = base_cmd(&home);
    cmd.args(["analyze", "--feed", FEED, "--prices", PRICES, "--method", "irr"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("modified-dietz"));
}

#[test]
fn fees_json_reports_totals() {
    let home = setup_temp_home();
    let json = run_cmd_json(&home, &["fees", "--feed", FEED, "--from", "2024-01", "--to", "2024-04"])
        .expect("fees should succeed");

    assert!((decimal_field(&json["total_fees"]) - 14.95).abs() < 1e-9);
    assert_eq!(json["transactions_with_fees"], 2);
    assert_eq!(json["double_source_count"], 0);
    assert!((decimal_field(&json["by_month"]["2024-04"]) - 14.95).abs() < 1e-9);
    assert_eq!(json["from"], "2024-01-01");
    assert_eq!(json["to"], "2024-04-30");
}

#[test]
fn simulate_is_reproducible_with_seed() {
    let home = setup_temp_home();
    let args = [
        "simulate",
        "--years",
        "3",
        "--simulations",
        "200",
        "--seed",
        "11",
    ];
    let first = run_cmd_json(&home, &args).expect("simulate should succeed");
    let second = run_cmd_json(&home, &args).expect("simulate should succeed");

    assert_eq!(first["statistics"], second["statistics"]);
    assert_eq!(first["bands"]["p50"].as_array().unwrap().len(), 37);
    assert_eq!(first["statistics"]["total_contributions"], 28000.0);
}

#[test]
fn simulate_lists_presets() {
    let home = setup_temp_home();
    let mut cmd = base_cmd(&home);
    cmd.args(["simulate", "--list-presets"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("young-investor"))
        .stdout(predicate::str::contains("near-retirement"));
}

#[test]
fn simulate_rejects_out_of_range_years() {
    let home = setup_temp_home();
    let mut cmd = base_cmd(&home);
    cmd.args(["simulate", "--years", "0"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid simulation parameters"));
}
