use super::{distinct_ids, name_key, Storage};
use crate::domain::*;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

trait Keyed: Clone {
    const ENTITY: &'static str;
    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
}

macro_rules! keyed {
    ($ty:ty, $entity:literal) => {
        impl Keyed for $ty {
            const ENTITY: &'static str = $entity;
            fn id(&self) -> Option<i64> {
                self.id
            }
            fn set_id(&mut self, id: i64) {
                self.id = Some(id);
            }
        }
    };
}

keyed!(Brand, "brand");
keyed!(Model, "model");
keyed!(ReferenceYear, "reference year");
keyed!(Vehicle, "vehicle");
keyed!(Evaluation, "evaluation");

struct TableState<T> {
    last_id: i64,
    rows: BTreeMap<i64, T>,
}

/// One entity table: rows ordered by id plus a monotonically increasing id counter
struct Table<T> {
    state: Mutex<TableState<T>>,
}

impl<T: Keyed> Table<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                last_id: 0,
                rows: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TableState<T>>> {
        self.state.lock().map_err(|_| ServiceError::Database {
            message: format!("{} table lock poisoned", T::ENTITY),
        })
    }

    fn all(&self) -> Result<Vec<T>> {
        Ok(self.lock()?.rows.values().cloned().collect())
    }

    fn by_ids(&self, ids: &[i64]) -> Result<Vec<T>> {
        let state = self.lock()?;
        Ok(distinct_ids(ids)
            .into_iter()
            .filter_map(|id| state.rows.get(&id).cloned())
            .collect())
    }

    fn get(&self, id: i64) -> Result<Option<T>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    fn filter(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        Ok(self
            .lock()?
            .rows
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect())
    }

    fn find(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        Ok(self.lock()?.rows.values().find(|row| predicate(row)).cloned())
    }

    fn insert(&self, row: &mut T) -> Result<i64> {
        let mut state = self.lock()?;
        state.last_id += 1;
        let id = state.last_id;
        row.set_id(id);
        state.rows.insert(id, row.clone());
        Ok(id)
    }

    fn update(&self, row: &T) -> Result<bool> {
        let id = row.id().ok_or_else(|| ServiceError::Database {
            message: format!("Cannot update {} without ID", T::ENTITY),
        })?;
        let mut state = self.lock()?;
        match state.rows.get_mut(&id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: i64) -> Result<bool> {
        Ok(self.lock()?.rows.remove(&id).is_some())
    }
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    brands: Table<Brand>,
    models: Table<Model>,
    reference_years: Table<ReferenceYear>,
    vehicles: Table<Vehicle>,
    evaluations: Table<Evaluation>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            brands: Table::new(),
            models: Table::new(),
            reference_years: Table::new(),
            vehicles: Table::new(),
            evaluations: Table::new(),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list_brands(&self) -> Result<Vec<Brand>> {
        self.brands.all()
    }

    async fn get_brands_by_ids(&self, ids: &[i64]) -> Result<Vec<Brand>> {
        self.brands.by_ids(ids)
    }

    async fn get_brand_by_id(&self, id: i64) -> Result<Option<Brand>> {
        self.brands.get(id)
    }

    async fn get_brand_by_name(&self, name: &str) -> Result<Option<Brand>> {
        let key = name_key(name);
        self.brands.find(|b| name_key(&b.name) == key)
    }

    async fn create_brand(&self, brand: &mut Brand) -> Result<()> {
        let id = self.brands.insert(brand)?;
        debug!("Created brand: {} with id {}", brand.name, id);
        Ok(())
    }

    async fn update_brand(&self, brand: &Brand) -> Result<bool> {
        self.brands.update(brand)
    }

    async fn delete_brand(&self, id: i64) -> Result<bool> {
        self.brands.remove(id)
    }

    async fn list_models(&self) -> Result<Vec<Model>> {
        self.models.all()
    }

    async fn get_models_by_ids(&self, ids: &[i64]) -> Result<Vec<Model>> {
        self.models.by_ids(ids)
    }

    async fn get_model_by_id(&self, id: i64) -> Result<Option<Model>> {
        self.models.get(id)
    }

    async fn get_models_by_brand_id(&self, brand_id: i64) -> Result<Vec<Model>> {
        self.models.filter(|m| m.brand_id == brand_id)
    }

    async fn get_model_by_brand_and_name(
        &self,
        brand_id: i64,
        name: &str,
    ) -> Result<Option<Model>> {
        let key = name_key(name);
        self.models
            .find(|m| m.brand_id == brand_id && name_key(&m.name) == key)
    }

    async fn create_model(&self, model: &mut Model) -> Result<()> {
        let id = self.models.insert(model)?;
        debug!("Created model: {} with id {}", model.name, id);
        Ok(())
    }

    async fn update_model(&self, model: &Model) -> Result<bool> {
        self.models.update(model)
    }

    async fn delete_model(&self, id: i64) -> Result<bool> {
        self.models.remove(id)
    }

    async fn list_reference_years(&self) -> Result<Vec<ReferenceYear>> {
        self.reference_years.all()
    }

    async fn get_reference_years_by_ids(&self, ids: &[i64]) -> Result<Vec<ReferenceYear>> {
        self.reference_years.by_ids(ids)
    }

    async fn get_reference_year_by_id(&self, id: i64) -> Result<Option<ReferenceYear>> {
        self.reference_years.get(id)
    }

    async fn get_reference_year_by_number_and_year(
        &self,
        price_reference_number: i64,
        year: i64,
    ) -> Result<Option<ReferenceYear>> {
        self.reference_years
            .find(|r| r.price_reference_number == price_reference_number && r.year == year)
    }

    async fn create_reference_year(&self, reference_year: &mut ReferenceYear) -> Result<()> {
        let id = self.reference_years.insert(reference_year)?;
        debug!(
            "Created reference year: {}/{} with id {}",
            reference_year.price_reference_number, reference_year.year, id
        );
        Ok(())
    }

    async fn update_reference_year(&self, reference_year: &ReferenceYear) -> Result<bool> {
        self.reference_years.update(reference_year)
    }

    async fn delete_reference_year(&self, id: i64) -> Result<bool> {
        self.reference_years.remove(id)
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.vehicles.all()
    }

    async fn get_vehicles_by_ids(&self, ids: &[i64]) -> Result<Vec<Vehicle>> {
        self.vehicles.by_ids(ids)
    }

    async fn get_vehicle_by_id(&self, id: i64) -> Result<Option<Vehicle>> {
        self.vehicles.get(id)
    }

    async fn get_vehicles_by_brand_id(&self, brand_id: i64) -> Result<Vec<Vehicle>> {
        self.vehicles.filter(|v| v.brand_id == brand_id)
    }

    async fn get_vehicles_by_model_id(&self, model_id: i64) -> Result<Vec<Vehicle>> {
        self.vehicles.filter(|v| v.model_id == model_id)
    }

    async fn get_vehicles_by_reference_year_id(
        &self,
        reference_year_id: i64,
    ) -> Result<Vec<Vehicle>> {
        self.vehicles
            .filter(|v| v.reference_year_id == reference_year_id)
    }

    async fn create_vehicle(&self, vehicle: &mut Vehicle) -> Result<()> {
        let id = self.vehicles.insert(vehicle)?;
        debug!("Created vehicle: {} with id {}", vehicle.fipe_code, id);
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<bool> {
        self.vehicles.update(vehicle)
    }

    async fn delete_vehicle(&self, id: i64) -> Result<bool> {
        self.vehicles.remove(id)
    }

    async fn list_evaluations(&self) -> Result<Vec<Evaluation>> {
        self.evaluations.all()
    }

    async fn get_evaluations_by_ids(&self, ids: &[i64]) -> Result<Vec<Evaluation>> {
        self.evaluations.by_ids(ids)
    }

    async fn get_evaluation_by_id(&self, id: i64) -> Result<Option<Evaluation>> {
        self.evaluations.get(id)
    }

    async fn get_evaluations_by_vehicle_id(&self, vehicle_id: i64) -> Result<Vec<Evaluation>> {
        self.evaluations.filter(|e| e.vehicle_id == vehicle_id)
    }

    async fn create_evaluation(&self, evaluation: &mut Evaluation) -> Result<()> {
        let id = self.evaluations.insert(evaluation)?;
        debug!(
            "Created evaluation of vehicle {} with id {}",
            evaluation.vehicle_id, id
        );
        Ok(())
    }

    async fn update_evaluation(&self, evaluation: &Evaluation) -> Result<bool> {
        self.evaluations.update(evaluation)
    }

    async fn delete_evaluation(&self, id: i64) -> Result<bool> {
        self.evaluations.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brand(name: &str) -> Brand {
        Brand {
            id: None,
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_and_not_reused() {
        let storage = InMemoryStorage::new();
        let mut a = brand("Fiat");
        let mut b = brand("Ford");
        storage.create_brand(&mut a).await.unwrap();
        storage.create_brand(&mut b).await.unwrap();
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));

        assert!(storage.delete_brand(2).await.unwrap());
        let mut c = brand("Honda");
        storage.create_brand(&mut c).await.unwrap();
        assert_eq!(c.id, Some(3));
    }

    #[tokio::test]
    async fn by_ids_skips_unknown_and_dedupes() {
        let storage = InMemoryStorage::new();
        for name in ["Fiat", "Ford", "Honda"] {
            storage.create_brand(&mut brand(name)).await.unwrap();
        }

        let found = storage.get_brands_by_ids(&[3, 1, 3, 99]).await.unwrap();
        let ids: Vec<_> = found.iter().map(|b| b.id.unwrap()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(storage.get_brands_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn name_lookup_is_case_insensitive() {
        let storage = InMemoryStorage::new();
        storage.create_brand(&mut brand("Volkswagen")).await.unwrap();
        let found = storage.get_brand_by_name("  VOLKSWAGEN ").await.unwrap();
        assert_eq!(found.unwrap().name, "Volkswagen");
        assert!(storage.get_brand_by_name("Audi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let storage = InMemoryStorage::new();
        let ghost = Brand {
            id: Some(7),
            name: "Ghost".to_string(),
        };
        assert!(!storage.update_brand(&ghost).await.unwrap());
        assert!(!storage.delete_brand(7).await.unwrap());

        let err = storage.update_brand(&brand("No id")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Database { .. }));
    }
}
