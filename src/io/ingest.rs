//! CSV ingest for the four pipeline inputs.
//!
//! This module turns the sales, item, category and test CSV files into typed
//! rows. It is strict by design of the pipeline: a missing column or a
//! malformed value is a `SchemaError` naming the file and line, never a
//! skipped row.
//!
//! - Header names are matched case-insensitively (BOM stripped), extra
//!   columns are ignored and column order does not matter.
//! - Row order is preserved.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{CategoryInfo, ItemCatalogEntry, TestPair, Transaction};
use crate::error::PipelineError;

/// Locations of the four input files.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub sales: PathBuf,
    pub items: PathBuf,
    pub categories: PathBuf,
    pub test: PathBuf,
}

/// Everything the pipeline reads, fully loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub sales: Vec<Transaction>,
    pub items: Vec<ItemCatalogEntry>,
    pub categories: Vec<CategoryInfo>,
    pub test: Vec<TestPair>,
}

/// Load and type-check all four inputs.
pub fn load_inputs(paths: &InputPaths) -> Result<PipelineInputs, PipelineError> {
    let inputs = PipelineInputs {
        sales: read_sales(open(&paths.sales)?)?,
        items: read_items(open(&paths.items)?)?,
        categories: read_categories(open(&paths.categories)?)?,
        test: read_test_pairs(open(&paths.test)?)?,
    };
    info!(
        sales = inputs.sales.len(),
        items = inputs.items.len(),
        categories = inputs.categories.len(),
        test_pairs = inputs.test.len(),
        "loaded inputs"
    );
    Ok(inputs)
}

fn open(path: &Path) -> Result<File, PipelineError> {
    debug!(path = %path.display(), "opening input");
    File::open(path).map_err(|e| PipelineError::io(path, e))
}

/// Parse sales transactions (`date, shop_id, item_id, item_price, item_cnt_day`).
pub fn read_sales<R: Read>(reader: R) -> Result<Vec<Transaction>, PipelineError> {
    let mut table = CsvTable::open(
        "sales",
        reader,
        &[&["date"], &["shop_id"], &["item_id"], &["item_price"], &["item_cnt_day"]],
    )?;
    let mut out = Vec::new();
    while let Some((line, record)) = table.next_record()? {
        let row = parse_sales_row(&table, &record).map_err(|e| table.row_error(line, e))?;
        out.push(row);
    }
    Ok(out)
}

/// Parse the item catalog (`item_id, item_name, item_category_id`).
pub fn read_items<R: Read>(reader: R) -> Result<Vec<ItemCatalogEntry>, PipelineError> {
    let mut table = CsvTable::open(
        "items",
        reader,
        &[&["item_id"], &["item_name"], &["item_category_id"]],
    )?;
    let mut out = Vec::new();
    while let Some((line, record)) = table.next_record()? {
        let row = ItemCatalogEntry {
            item_id: parse_id(table.get(&record, 0), "item_id").map_err(|e| table.row_error(line, e))?,
            item_name: table.get_raw(&record, 1).to_string(),
            item_category_id: parse_category(table.get(&record, 2)).map_err(|e| table.row_error(line, e))?,
        };
        out.push(row);
    }
    Ok(out)
}

/// Parse the category table (`item_category_id, category_name`).
///
/// `item_category_name` is accepted in place of `category_name`.
pub fn read_categories<R: Read>(reader: R) -> Result<Vec<CategoryInfo>, PipelineError> {
    let mut table = CsvTable::open(
        "categories",
        reader,
        &[&["item_category_id"], &["category_name", "item_category_name"]],
    )?;
    let mut out = Vec::new();
    while let Some((line, record)) = table.next_record()? {
        let row = CategoryInfo {
            item_category_id: parse_category(table.get(&record, 0)).map_err(|e| table.row_error(line, e))?,
            category_name: table.get(&record, 1).map_err(|e| table.row_error(line, e))?.to_string(),
        };
        out.push(row);
    }
    Ok(out)
}

/// Parse the test specification (`shop_id, item_id`; an `ID` column is ignored).
pub fn read_test_pairs<R: Read>(reader: R) -> Result<Vec<TestPair>, PipelineError> {
    let mut table = CsvTable::open("test", reader, &[&["shop_id"], &["item_id"]])?;
    let mut out = Vec::new();
    while let Some((line, record)) = table.next_record()? {
        let row = TestPair {
            shop_id: parse_id(table.get(&record, 0), "shop_id").map_err(|e| table.row_error(line, e))?,
            item_id: parse_id(table.get(&record, 1), "item_id").map_err(|e| table.row_error(line, e))?,
        };
        out.push(row);
    }
    Ok(out)
}

/// A CSV reader with its required columns resolved to indices.
struct CsvTable<R> {
    name: &'static str,
    reader: csv::Reader<R>,
    /// `(header name, column index)` per required column, in request order.
    columns: Vec<(&'static str, usize)>,
    line: usize,
}

impl<R: Read> CsvTable<R> {
    /// `required` lists each column with its accepted aliases (first is canonical).
    fn open(name: &'static str, reader: R, required: &[&[&'static str]]) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::schema(name, format!("failed to read CSV headers: {e}")))?
            .clone();
        let header_map = build_header_map(&headers);

        let mut columns = Vec::with_capacity(required.len());
        for aliases in required {
            let idx = aliases
                .iter()
                .find_map(|alias| header_map.get(*alias).copied())
                .ok_or_else(|| PipelineError::schema(name, format!("missing required column `{}`", aliases[0])))?;
            columns.push((aliases[0], idx));
        }

        Ok(Self {
            name,
            reader,
            columns,
            // records() starts at line 2 (after the header); incremented before use.
            line: 1,
        })
    }

    fn next_record(&mut self) -> Result<Option<(usize, StringRecord)>, PipelineError> {
        let mut record = StringRecord::new();
        self.line += 1;
        match self.reader.read_record(&mut record) {
            Ok(true) => Ok(Some((self.line, record))),
            Ok(false) => Ok(None),
            Err(e) => Err(self.row_error(self.line, format!("CSV parse error: {e}"))),
        }
    }

    /// Required, non-empty value of the `column`-th requested column.
    fn get<'a>(&self, record: &'a StringRecord, column: usize) -> Result<&'a str, String> {
        let (name, idx) = self.columns[column];
        record
            .get(idx)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing value for `{name}`"))
    }

    /// Value of the `column`-th requested column, empty when absent.
    fn get_raw<'a>(&self, record: &'a StringRecord, column: usize) -> &'a str {
        record.get(self.columns[column].1).unwrap_or("")
    }

    fn row_error(&self, line: usize, message: String) -> PipelineError {
        PipelineError::schema(self.name, format!("line {line}: {message}"))
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "invalid date '{s}'; expected one of YYYY-MM-DD, DD.MM.YYYY, DD/MM/YYYY, YYYY/MM/DD"
    ))
}

fn parse_sales_row<R: Read>(table: &CsvTable<R>, record: &StringRecord) -> Result<Transaction, String> {
    Ok(Transaction {
        date: parse_date(table.get(record, 0)?)?,
        shop_id: parse_id(table.get(record, 1), "shop_id")?,
        item_id: parse_id(table.get(record, 2), "item_id")?,
        item_price: parse_f64(table.get(record, 3)?, "item_price")?,
        item_cnt_day: parse_f64(table.get(record, 4)?, "item_cnt_day")?,
    })
}

fn parse_id(value: Result<&str, String>, name: &str) -> Result<u32, String> {
    let s = value?;
    s.parse::<u32>()
        .map_err(|_| format!("`{name}` must be a non-negative integer, got '{s}'"))
}

fn parse_category(value: Result<&str, String>) -> Result<i32, String> {
    let s = value?;
    match s.parse::<i32>() {
        Ok(v) if v >= 0 => Ok(v),
        _ => Err(format!("`item_category_id` must be a non-negative integer, got '{s}'")),
    }
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("`{name}` must be a number, got '{s}'"))
}
