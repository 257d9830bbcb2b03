//! Dataset and input CSV writers.
//!
//! Run outputs are first written next to their final location as `*.tmp`
//! and only renamed once every file was written. Any failure removes what
//! was staged, so a failed run never leaves a partial output set behind.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::{debug, info, warn};

use crate::domain::{DatasetSchema, WindowedRow};
use crate::error::PipelineError;
use crate::io::ingest::PipelineInputs;
use crate::io::summary::{RunSummary, SUMMARY_FILE, write_run_summary};
use crate::stages::split::Datasets;

pub const TRAIN_FILE: &str = "train_df.csv";
pub const VALIDATION_FILE: &str = "validation_df.csv";
pub const TEST_FILE: &str = "test_df.csv";

/// Write the three dataset CSVs and `run_summary.json` into `dir`.
///
/// Returns the final paths: train, validation, test, summary.
pub fn write_outputs(dir: &Path, datasets: &Datasets, summary: &RunSummary<'_>) -> Result<Vec<PathBuf>, PipelineError> {
    let mut outputs = StagedOutputs::new(dir)?;
    outputs.stage_datasets(datasets)?;
    outputs.stage(SUMMARY_FILE, |path| write_run_summary(path, summary))?;
    outputs.commit()
}

/// A set of output files that becomes visible all at once.
///
/// Files staged but never committed are removed on drop.
pub struct StagedOutputs {
    dir: PathBuf,
    /// `(tmp, target)` per staged file, in staging order.
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedOutputs {
    pub fn new(dir: &Path) -> Result<Self, PipelineError> {
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            staged: Vec::new(),
        })
    }

    /// Write `name` through `write`, which receives the temporary path.
    pub fn stage<F>(&mut self, name: &str, write: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&Path) -> Result<(), PipelineError>,
    {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        if let Err(e) = write(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        self.staged.push((tmp, target));
        Ok(())
    }

    /// Stage `train_df.csv`, `validation_df.csv` and `test_df.csv`.
    pub fn stage_datasets(&mut self, datasets: &Datasets) -> Result<(), PipelineError> {
        let plan: [(&str, &[WindowedRow], bool); 3] = [
            (TRAIN_FILE, datasets.train.as_slice(), true),
            (VALIDATION_FILE, datasets.validation.as_slice(), true),
            (TEST_FILE, datasets.test.as_slice(), false),
        ];
        for (name, rows, with_label) in plan {
            self.stage(name, |path| write_rows(path, &datasets.schema, rows, with_label))?;
        }
        Ok(())
    }

    /// Rename every staged file into place.
    ///
    /// A failed rename removes the files already renamed by this call.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, PipelineError> {
        if let Some((_, target)) = self.staged.iter().find(|(_, target)| target.is_dir()) {
            return Err(PipelineError::io(
                target,
                io::Error::new(io::ErrorKind::IsADirectory, "output path is a directory"),
            ));
        }

        let mut written: Vec<PathBuf> = Vec::with_capacity(self.staged.len());
        for (tmp, target) in &self.staged {
            if let Err(e) = fs::rename(tmp, target) {
                warn!(path = %target.display(), "rename failed, rolling back outputs");
                for done in &written {
                    let _ = fs::remove_file(done);
                }
                return Err(PipelineError::io(target, e));
            }
            written.push(target.clone());
        }
        self.staged.clear();
        info!(dir = %self.dir.display(), files = written.len(), "wrote outputs");
        Ok(written)
    }
}

impl Drop for StagedOutputs {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            let _ = fs::remove_file(tmp);
        }
    }
}

fn write_rows(path: &Path, schema: &DatasetSchema, rows: &[WindowedRow], with_label: bool) -> Result<(), PipelineError> {
    let header = schema.columns(with_label);
    let mut writer = Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    writer.write_record(&header).map_err(|e| csv_error(path, e))?;

    for row in rows {
        let record = row_values(row, with_label)?;
        if record.len() != header.len() {
            return Err(PipelineError::Invariant(format!(
                "row (shop {}, item {}, block {}) has {} values for {} columns",
                row.shop_id,
                row.item_id,
                row.date_block_num,
                record.len(),
                header.len()
            )));
        }
        writer.write_record(&record).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    debug!(path = %path.display(), rows = rows.len(), "wrote dataset file");
    Ok(())
}

fn row_values(row: &WindowedRow, with_label: bool) -> Result<Vec<String>, PipelineError> {
    let mut out = vec![
        row.shop_id.to_string(),
        row.item_id.to_string(),
        row.date_block_num.to_string(),
        row.item_category_id.to_string(),
        row.category_group_id.to_string(),
        row.item_price.to_string(),
        row.price_bucket.to_string(),
    ];
    out.extend(row.lags.iter().chain(&row.trend).chain(&row.calendar).map(f64::to_string));
    if with_label {
        let label = row.label.ok_or_else(|| {
            PipelineError::Invariant(format!(
                "labelled row (shop {}, item {}, block {}) has no label",
                row.shop_id, row.item_id, row.date_block_num
            ))
        })?;
        out.push(label.to_string());
    }
    Ok(out)
}

/// Write a full input set (`sales.csv`, `items.csv`, `categories.csv`,
/// `test.csv`) in the layout `dg prepare` reads.
pub fn write_inputs(dir: &Path, inputs: &PipelineInputs) -> Result<Vec<PathBuf>, PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;

    let sales = dir.join("sales.csv");
    let mut w = create(&sales)?;
    write(&sales, &mut w, ["date", "shop_id", "item_id", "item_price", "item_cnt_day"])?;
    for t in &inputs.sales {
        write(
            &sales,
            &mut w,
            [
                t.date.format("%Y-%m-%d").to_string(),
                t.shop_id.to_string(),
                t.item_id.to_string(),
                t.item_price.to_string(),
                t.item_cnt_day.to_string(),
            ],
        )?;
    }
    w.flush().map_err(|e| PipelineError::io(&sales, e))?;

    let items = dir.join("items.csv");
    let mut w = create(&items)?;
    write(&items, &mut w, ["item_name", "item_id", "item_category_id"])?;
    for i in &inputs.items {
        write(
            &items,
            &mut w,
            [i.item_name.clone(), i.item_id.to_string(), i.item_category_id.to_string()],
        )?;
    }
    w.flush().map_err(|e| PipelineError::io(&items, e))?;

    let categories = dir.join("categories.csv");
    let mut w = create(&categories)?;
    write(&categories, &mut w, ["item_category_name", "item_category_id"])?;
    for c in &inputs.categories {
        write(&categories, &mut w, [c.category_name.clone(), c.item_category_id.to_string()])?;
    }
    w.flush().map_err(|e| PipelineError::io(&categories, e))?;

    let test = dir.join("test.csv");
    let mut w = create(&test)?;
    write(&test, &mut w, ["ID", "shop_id", "item_id"])?;
    for (id, p) in inputs.test.iter().enumerate() {
        write(&test, &mut w, [id.to_string(), p.shop_id.to_string(), p.item_id.to_string()])?;
    }
    w.flush().map_err(|e| PipelineError::io(&test, e))?;

    info!(dir = %dir.display(), sales = inputs.sales.len(), "wrote input set");
    Ok(vec![sales, items, categories, test])
}

fn create(path: &Path) -> Result<Writer<File>, PipelineError> {
    Writer::from_path(path).map_err(|e| csv_error(path, e))
}

fn write<I, T>(path: &Path, writer: &mut Writer<File>, record: I) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer.write_record(record).map_err(|e| csv_error(path, e))
}

fn csv_error(path: &Path, e: csv::Error) -> PipelineError {
    PipelineError::io(path, std::io::Error::other(e))
}
