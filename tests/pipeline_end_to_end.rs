use std::fs;
use std::path::Path;
use std::process::Command;

use chrono::NaiveDate;
use demand_grid::app::pipeline;
use demand_grid::domain::{PipelineConfig, ValidationMonth, YearMonth};
use demand_grid::io::{InputPaths, load_inputs};

const SALES: &str = "\
date,shop_id,item_id,item_price,item_cnt_day
05.02.2019,0,10,100,1
10.02.2019,1,20,250,2
03.03.2019,0,10,100,2
17.03.2019,0,20,400,1
04.04.2019,0,10,120,3
22.04.2019,1,20,250,-1
23.04.2019,1,20,250,4
";

const ITEMS: &str = "\
item_name,item_id,item_category_id
Alpha,10,0
Beta,20,1
";

const CATEGORIES: &str = "\
item_category_name,item_category_id
Games - PS4,0
Books - Audio,1
";

const TEST: &str = "\
ID,shop_id,item_id
0,0,10
1,0,20
2,1,10
3,1,20
";

fn write_inputs(dir: &Path, sales: &str) -> InputPaths {
    let paths = InputPaths {
        sales: dir.join("sales.csv"),
        items: dir.join("items.csv"),
        categories: dir.join("categories.csv"),
        test: dir.join("test.csv"),
    };
    fs::write(&paths.sales, sales).unwrap();
    fs::write(&paths.items, ITEMS).unwrap();
    fs::write(&paths.categories, CATEGORIES).unwrap();
    fs::write(&paths.test, TEST).unwrap();
    paths
}

/// Calendar starts in January 2019, so February..April are blocks 1..=3 and
/// the predict month May 2019 is block 4.
fn config() -> PipelineConfig {
    PipelineConfig {
        lag_depth: 2,
        start_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
        predict: YearMonth { year: 2019, month: 5 },
        ..PipelineConfig::default()
    }
}

#[test]
fn two_shops_two_items_three_months() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = load_inputs(&write_inputs(dir.path(), SALES)).unwrap();
    let run = pipeline::run(&config(), &inputs).unwrap();

    assert_eq!(run.stats.grid_pairs, 4);
    assert_eq!(run.stats.grid_months, 4);
    assert_eq!(run.stats.grid_rows, 16);
    assert_eq!(run.stats.train_targets, vec![2, 3]);
    assert_eq!(run.stats.test_only_pairs, 1);

    let ds = &run.datasets;
    // Validation defaults to block 3; train keeps block 2.
    assert_eq!(ds.train.len(), 4);
    assert_eq!(ds.validation.len(), 4);
    assert!(ds.train.iter().all(|r| r.date_block_num == 2));
    assert!(ds.validation.iter().all(|r| r.date_block_num == 3));
    assert_eq!(ds.test.len(), 4);
    assert!(ds.test.iter().all(|r| r.date_block_num == 4 && r.label.is_none()));

    let lag_columns: Vec<&String> = ds.schema.feature_columns.iter().filter(|c| c.starts_with("lag_") && c[4..].parse::<u32>().is_ok()).collect();
    assert_eq!(lag_columns, ["lag_1", "lag_2"]);

    // (0, 10): 1, 2, 3 units in blocks 1..=3.
    let test_row = ds.test.iter().find(|r| (r.shop_id, r.item_id) == (0, 10)).unwrap();
    assert_eq!(test_row.lags, vec![3.0, 2.0]);
    assert_eq!(test_row.item_price, 120.0);
    // Block 2 row: lag_2 falls on block 0, before the first sale.
    let train_row = ds.train.iter().find(|r| (r.shop_id, r.item_id) == (0, 10)).unwrap();
    assert_eq!(train_row.lags, vec![1.0, 0.0]);
    assert_eq!(train_row.label, Some(2.0));

    // (1, 20): return and sale in April net to 3.
    let val_row = ds.validation.iter().find(|r| (r.shop_id, r.item_id) == (1, 20)).unwrap();
    assert_eq!(val_row.label, Some(3.0));

    // (1, 10) never sold: zero history, catalog category, zero price.
    let cold = ds.test.iter().find(|r| (r.shop_id, r.item_id) == (1, 10)).unwrap();
    assert_eq!(cold.lags, vec![0.0, 0.0]);
    assert_eq!(cold.item_price, 0.0);
    assert_eq!(cold.item_category_id, 0);
}

#[test]
fn disabled_validation_moves_everything_to_train() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = load_inputs(&write_inputs(dir.path(), SALES)).unwrap();
    let config = PipelineConfig {
        validation: ValidationMonth::Disabled,
        ..config()
    };
    let run = pipeline::run(&config, &inputs).unwrap();
    assert_eq!(run.datasets.train.len(), 8);
    assert!(run.datasets.validation.is_empty());
}

fn dg(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_dg"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn prepare_args(inputs: &InputPaths, out: &Path) -> Vec<String> {
    [
        "prepare",
        "--sales",
        inputs.sales.to_str().unwrap(),
        "--items",
        inputs.items.to_str().unwrap(),
        "--categories",
        inputs.categories.to_str().unwrap(),
        "--test",
        inputs.test.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--start",
        "2019-01-01",
        "--predict",
        "2019-05",
        "-k",
        "2",
        "--quiet",
    ]
    .map(String::from)
    .to_vec()
}

#[test]
fn cli_writes_datasets_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), SALES);
    let out = dir.path().join("out");

    let args = prepare_args(&inputs, &out);
    let output = dg(&args.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let train = fs::read_to_string(out.join("train_df.csv")).unwrap();
    let header = train.lines().next().unwrap();
    assert!(header.starts_with("shop_id,item_id,date_block_num,item_category_id,category_group_id,item_price,price_bucket,lag_1,lag_2,"));
    assert!(header.ends_with(",item_cnt_month"));
    assert_eq!(train.lines().count(), 5);

    let test = fs::read_to_string(out.join("test_df.csv")).unwrap();
    assert!(!test.lines().next().unwrap().contains("item_cnt_month"));
    assert_eq!(test.lines().count(), 5);

    let summary: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.join("run_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["stats"]["grid_rows"], 16);
    assert_eq!(summary["config"]["lag_depth"], 2);
    // February 2019: 1 x 100 + 2 x 250.
    assert_eq!(summary["monthly_totals"][0]["revenue"], 600.0);
    assert_eq!(summary["monthly_totals"][0]["transactions"], 2);
}

#[test]
fn missing_item_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let bad_sales = format!("{SALES}30.04.2019,0,99,10,1\n");
    let inputs = write_inputs(dir.path(), &bad_sales);
    let out = dir.path().join("out");

    let args = prepare_args(&inputs, &out);
    let output = dg(&args.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("item_id=99"), "stderr: {stderr}");
    assert!(!out.exists());
}

#[test]
fn failed_summary_write_leaves_no_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), SALES);
    let out = dir.path().join("out");
    // A directory where the summary file should go makes the final step fail.
    fs::create_dir_all(out.join("run_summary.json")).unwrap();

    let args = prepare_args(&inputs, &out);
    let output = dg(&args.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(output.status.code(), Some(2), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let left: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(left, vec!["run_summary.json".to_string()]);
}

#[test]
fn repeated_test_pair_yields_one_test_row() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_inputs(dir.path(), SALES);
    fs::write(&paths.test, format!("{TEST}4,0,10\n")).unwrap();
    let inputs = load_inputs(&paths).unwrap();
    assert_eq!(inputs.test.len(), 5);

    let run = pipeline::run(&config(), &inputs).unwrap();
    assert_eq!(run.datasets.test.len(), 4);
    let matching = run.datasets.test.iter().filter(|r| (r.shop_id, r.item_id) == (0, 10)).count();
    assert_eq!(matching, 1);
}
