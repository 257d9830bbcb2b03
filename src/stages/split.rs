//! Temporal train/validation/test partition.

use tracing::info;

use crate::domain::{Block, DatasetSchema, WindowedRow};
use crate::error::PipelineError;
use crate::stages::window::WindowedDatasets;

/// The three model-facing datasets plus their shared column layout.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub train: Vec<WindowedRow>,
    pub validation: Vec<WindowedRow>,
    pub test: Vec<WindowedRow>,
    pub schema: DatasetSchema,
}

pub struct DatasetSplitter {
    validation_block: Option<Block>,
    predict_block: Block,
}

impl DatasetSplitter {
    /// `validation_block = None` disables the validation split.
    pub fn new(validation_block: Option<Block>, predict_block: Block) -> Self {
        Self {
            validation_block,
            predict_block,
        }
    }

    pub fn split(&self, windowed: WindowedDatasets, schema: DatasetSchema) -> Result<Datasets, PipelineError> {
        let WindowedDatasets {
            train: context,
            mut test,
            train_targets,
        } = windowed;

        if let Some(v) = self.validation_block {
            if !train_targets.contains(&v) {
                return Err(PipelineError::config(format!(
                    "validation block {v} is not a training target month (targets: {})",
                    describe_targets(&train_targets)
                )));
            }
        }
        if let Some(bad) = context.iter().find(|r| r.date_block_num >= self.predict_block) {
            return Err(PipelineError::Invariant(format!(
                "train-context row at block {} is not before the predict block {}",
                bad.date_block_num, self.predict_block
            )));
        }
        if let Some(bad) = test.iter().find(|r| r.date_block_num != self.predict_block) {
            return Err(PipelineError::Invariant(format!(
                "test row at block {} is not at the predict block {}",
                bad.date_block_num, self.predict_block
            )));
        }

        let (mut validation, mut train): (Vec<_>, Vec<_>) = context
            .into_iter()
            .partition(|r| Some(r.date_block_num) == self.validation_block);

        train.sort_by_key(|r| (r.date_block_num, r.shop_id, r.item_id));
        validation.sort_by_key(|r| (r.date_block_num, r.shop_id, r.item_id));
        test.sort_by_key(|r| (r.shop_id, r.item_id));

        info!(
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            validation_block = ?self.validation_block,
            "split datasets"
        );
        Ok(Datasets {
            train,
            validation,
            test,
            schema,
        })
    }
}

fn describe_targets(targets: &[Block]) -> String {
    match (targets.first(), targets.last()) {
        (Some(first), Some(last)) => format!("{first}..={last}"),
        _ => "none".to_string(),
    }
}
