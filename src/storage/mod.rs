pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;

/// Storage trait for persisting the vehicle catalog.
///
/// Ids are assigned on create and never reused. Every listing is ordered by
/// ascending id. `update_*` and `delete_*` report whether the row existed.
#[async_trait]
pub trait Storage: Send + Sync {
    // Brand operations
    async fn list_brands(&self) -> Result<Vec<Brand>>;
    async fn get_brands_by_ids(&self, ids: &[i64]) -> Result<Vec<Brand>>;
    async fn get_brand_by_id(&self, id: i64) -> Result<Option<Brand>>;
    /// Case-insensitive match on the trimmed name
    async fn get_brand_by_name(&self, name: &str) -> Result<Option<Brand>>;
    async fn create_brand(&self, brand: &mut Brand) -> Result<()>;
    async fn update_brand(&self, brand: &Brand) -> Result<bool>;
    async fn delete_brand(&self, id: i64) -> Result<bool>;

    // Model operations
    async fn list_models(&self) -> Result<Vec<Model>>;
    async fn get_models_by_ids(&self, ids: &[i64]) -> Result<Vec<Model>>;
    async fn get_model_by_id(&self, id: i64) -> Result<Option<Model>>;
    async fn get_models_by_brand_id(&self, brand_id: i64) -> Result<Vec<Model>>;
    async fn get_model_by_brand_and_name(&self, brand_id: i64, name: &str)
        -> Result<Option<Model>>;
    async fn create_model(&self, model: &mut Model) -> Result<()>;
    async fn update_model(&self, model: &Model) -> Result<bool>;
    async fn delete_model(&self, id: i64) -> Result<bool>;

    // Reference year operations
    async fn list_reference_years(&self) -> Result<Vec<ReferenceYear>>;
    async fn get_reference_years_by_ids(&self, ids: &[i64]) -> Result<Vec<ReferenceYear>>;
    async fn get_reference_year_by_id(&self, id: i64) -> Result<Option<ReferenceYear>>;
    async fn get_reference_year_by_number_and_year(
        &self,
        price_reference_number: i64,
        year: i64,
    ) -> Result<Option<ReferenceYear>>;
    async fn create_reference_year(&self, reference_year: &mut ReferenceYear) -> Result<()>;
    async fn update_reference_year(&self, reference_year: &ReferenceYear) -> Result<bool>;
    async fn delete_reference_year(&self, id: i64) -> Result<bool>;

    // Vehicle operations
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>>;
    async fn get_vehicles_by_ids(&self, ids: &[i64]) -> Result<Vec<Vehicle>>;
    async fn get_vehicle_by_id(&self, id: i64) -> Result<Option<Vehicle>>;
    async fn get_vehicles_by_brand_id(&self, brand_id: i64) -> Result<Vec<Vehicle>>;
    async fn get_vehicles_by_model_id(&self, model_id: i64) -> Result<Vec<Vehicle>>;
    async fn get_vehicles_by_reference_year_id(&self, reference_year_id: i64)
        -> Result<Vec<Vehicle>>;
    async fn create_vehicle(&self, vehicle: &mut Vehicle) -> Result<()>;
    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<bool>;
    async fn delete_vehicle(&self, id: i64) -> Result<bool>;

    // Evaluation operations
    async fn list_evaluations(&self) -> Result<Vec<Evaluation>>;
    async fn get_evaluations_by_ids(&self, ids: &[i64]) -> Result<Vec<Evaluation>>;
    async fn get_evaluation_by_id(&self, id: i64) -> Result<Option<Evaluation>>;
    async fn get_evaluations_by_vehicle_id(&self, vehicle_id: i64) -> Result<Vec<Evaluation>>;
    async fn create_evaluation(&self, evaluation: &mut Evaluation) -> Result<()>;
    async fn update_evaluation(&self, evaluation: &Evaluation) -> Result<bool>;
    async fn delete_evaluation(&self, id: i64) -> Result<bool>;
}

/// Sorted, de-duplicated copy of an id list
pub(crate) fn distinct_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
