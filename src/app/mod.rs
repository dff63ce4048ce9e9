//! Application layer: queries, commands and the mediator that dispatches them.

pub mod brands;
pub mod evaluations;
pub mod mediator;
pub mod models;
pub mod reference_years;
pub mod validation;
pub mod vehicles;

use crate::error::Result;
use crate::storage::Storage;
use mediator::Mediator;
use std::collections::HashMap;
use std::sync::Arc;

/// Registers every catalog handler against `storage`
pub fn build_mediator(storage: Arc<dyn Storage>) -> Result<Mediator> {
    let builder = Mediator::builder();
    let builder = brands::register(builder, storage.clone());
    let builder = models::register(builder, storage.clone());
    let builder = reference_years::register(builder, storage.clone());
    let builder = vehicles::register(builder, storage.clone());
    let builder = evaluations::register(builder, storage);
    builder.build()
}

/// Rows keyed by id, for joining batches loaded with `get_*_by_ids`
pub(crate) fn index_by_id<T>(rows: Vec<T>, id: impl Fn(&T) -> Option<i64>) -> HashMap<i64, T> {
    rows.into_iter()
        .filter_map(|row| id(&row).map(|key| (key, row)))
        .collect()
}
