//! Join transactions with the item catalog and category taxonomy.
//!
//! Referential integrity is enforced rather than assumed: a transaction whose
//! item is not in the catalog, or an item whose category is unknown, stops the
//! run with `MissingKey`. The joiner also places every transaction on the
//! month axis.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{Block, CategoryId, CategoryInfo, ItemCatalogEntry, ItemId, JoinedRecord, Transaction};
use crate::error::PipelineError;
use crate::stages::calendar::MonthCalendar;

/// Validated lookup tables built from the item and category inputs.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    item_categories: HashMap<ItemId, CategoryId>,
    category_names: HashMap<CategoryId, Arc<str>>,
}

impl ReferenceTables {
    /// Index both tables; keys must be unique and every item's category must exist.
    pub fn build(items: &[ItemCatalogEntry], categories: &[CategoryInfo]) -> Result<Self, PipelineError> {
        let mut category_names = HashMap::with_capacity(categories.len());
        for (idx, c) in categories.iter().enumerate() {
            match category_names.entry(c.item_category_id) {
                Entry::Occupied(_) => {
                    return Err(PipelineError::schema(
                        "categories",
                        format!("line {}: duplicate item_category_id {}", idx + 2, c.item_category_id),
                    ));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::from(c.category_name.as_str()));
                }
            }
        }

        let mut item_categories = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if !category_names.contains_key(&item.item_category_id) {
                return Err(PipelineError::MissingKey {
                    table: "items",
                    line: idx + 2,
                    column: "item_category_id",
                    value: i64::from(item.item_category_id),
                    reference: "categories",
                });
            }
            if item_categories.insert(item.item_id, item.item_category_id).is_some() {
                return Err(PipelineError::schema(
                    "items",
                    format!("line {}: duplicate item_id {}", idx + 2, item.item_id),
                ));
            }
        }

        Ok(Self {
            item_categories,
            category_names,
        })
    }

    pub fn category_of_item(&self, item_id: ItemId) -> Option<CategoryId> {
        self.item_categories.get(&item_id).copied()
    }

    pub fn category_name(&self, category_id: CategoryId) -> Option<&Arc<str>> {
        self.category_names.get(&category_id)
    }

    /// All `(category id, name)` pairs, unordered.
    pub fn categories(&self) -> impl Iterator<Item = (CategoryId, &str)> {
        self.category_names.iter().map(|(id, name)| (*id, name.as_ref()))
    }
}

/// Left-joins transactions onto the reference tables.
pub struct DataJoiner<'a> {
    refs: &'a ReferenceTables,
    calendar: &'a MonthCalendar,
}

impl<'a> DataJoiner<'a> {
    pub fn new(refs: &'a ReferenceTables, calendar: &'a MonthCalendar) -> Self {
        Self { refs, calendar }
    }

    /// One joined record per transaction, in input order.
    pub fn join(&self, sales: &[Transaction]) -> Result<Vec<JoinedRecord>, PipelineError> {
        let predict_block = self.calendar.predict_block();
        let mut out = Vec::with_capacity(sales.len());

        for (idx, tx) in sales.iter().enumerate() {
            let line = idx + 2;
            let category_id = self.refs.category_of_item(tx.item_id).ok_or(PipelineError::MissingKey {
                table: "sales",
                line,
                column: "item_id",
                value: i64::from(tx.item_id),
                reference: "items",
            })?;
            // Present by construction of `ReferenceTables`.
            let category_name = self
                .refs
                .category_name(category_id)
                .cloned()
                .ok_or_else(|| PipelineError::Invariant(format!("category {category_id} vanished from the reference table")))?;

            let block = self.block_of(tx, line, predict_block)?;

            out.push(JoinedRecord {
                date: tx.date,
                date_block_num: block,
                shop_id: tx.shop_id,
                item_id: tx.item_id,
                item_price: tx.item_price,
                item_cnt_day: tx.item_cnt_day,
                item_category_id: category_id,
                category_name,
            });
        }

        let returns = out.iter().filter(|r| r.item_cnt_day < 0.0).count();
        if returns > 0 {
            warn!(returns, "sales contain returns (negative item_cnt_day); kept as signal");
        }
        info!(records = out.len(), "joined sales with catalog");
        Ok(out)
    }

    fn block_of(&self, tx: &Transaction, line: usize, predict_block: Block) -> Result<Block, PipelineError> {
        let block = self.calendar.block_of_date(tx.date).ok_or_else(|| {
            PipelineError::config(format!(
                "sales line {line}: date {} is outside the calendar range {}..={}",
                tx.date,
                self.calendar.start(),
                self.calendar.end()
            ))
        })?;
        if block >= predict_block {
            return Err(PipelineError::config(format!(
                "sales line {line}: date {} falls in or after the predict month {}",
                tx.date,
                self.calendar.predict()
            )));
        }
        Ok(block)
    }
}
