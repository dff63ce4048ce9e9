use super::{distinct_ids, name_key, Storage};
use crate::domain::*;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension, Params, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const MIGRATION_001: &str = include_str!("../../migrations/001_create_catalog.sql");

const SELECT_BRANDS: &str = "SELECT id, name FROM brands";
const SELECT_MODELS: &str = "SELECT id, brand_id, name FROM models";
const SELECT_REFERENCE_YEARS: &str =
    "SELECT id, price_reference_number, year, description FROM reference_years";
const SELECT_VEHICLES: &str = "SELECT id, brand_id, model_id, reference_year_id, model_year, fuel, fipe_code, price FROM vehicles";
const SELECT_EVALUATIONS: &str = "SELECT id, vehicle_id, evaluated_price, evaluated_on, evaluator, notes, created_at FROM evaluations";

/// Ids bound per `IN (...)` lookup, well under SQLite's host parameter limit
const IDS_PER_QUERY: usize = 500;

type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

/// SQLite-backed catalog storage
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite catalog at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Apply the embedded schema; safe to run on every start
    pub fn run_migrations(&self) -> Result<()> {
        debug!("Running catalog migrations");
        self.conn()?.execute_batch(MIGRATION_001)?;
        Ok(())
    }

    /// Delete every row, children first. Ids keep counting from where they were.
    pub fn clear_all_data(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "DELETE FROM evaluations;
             DELETE FROM vehicles;
             DELETE FROM reference_years;
             DELETE FROM models;
             DELETE FROM brands;",
        )?;
        info!("Cleared all catalog data");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ServiceError::Database {
            message: "SQLite connection lock poisoned".to_string(),
        })
    }

    fn query_all<T, P: Params>(&self, sql: &str, params: P, map: RowMapper<T>) -> Result<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, map)?;
        Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
    }

    fn query_one<T, P: Params>(&self, sql: &str, params: P, map: RowMapper<T>) -> Result<Option<T>> {
        let conn = self.conn()?;
        Ok(conn.query_row(sql, params, map).optional()?)
    }

    fn query_by_ids<T>(&self, select: &str, ids: &[i64], map: RowMapper<T>) -> Result<Vec<T>> {
        // Sorted chunks queried in order keep the merged rows in id order
        let mut rows = Vec::new();
        for chunk in distinct_ids(ids).chunks(IDS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("{select} WHERE id IN ({placeholders}) ORDER BY id");
            rows.extend(self.query_all(&sql, params_from_iter(chunk.iter()), map)?);
        }
        Ok(rows)
    }

    fn insert<P: Params>(&self, entity: &str, sql: &str, params: P) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(sql, params)
            .map_err(|e| write_error(entity, e))?;
        Ok(conn.last_insert_rowid())
    }

    fn execute<P: Params>(&self, entity: &str, sql: &str, params: P) -> Result<bool> {
        let changed = self
            .conn()?
            .execute(sql, params)
            .map_err(|e| write_error(entity, e))?;
        Ok(changed > 0)
    }
}

/// Constraint violations are conflicts with existing rows; everything else is a database failure.
/// The SQLite message names tables and columns, so it only goes to the log.
fn write_error(entity: &str, e: rusqlite::Error) -> ServiceError {
    match &e {
        rusqlite::Error::SqliteFailure(err, detail)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            debug!("Constraint violation writing {}: {:?}", entity, detail);
            let message = match err.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE => format!("{entity} already exists"),
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    format!("{entity} is still referenced or refers to a missing record")
                }
                _ => format!("{entity} conflicts with existing catalog data"),
            };
            ServiceError::Conflict(message)
        }
        _ => e.into(),
    }
}

fn missing_id(entity: &str) -> ServiceError {
    ServiceError::Database {
        message: format!("Cannot update {entity} without ID"),
    }
}

fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<Brand> {
    Ok(Brand {
        id: Some(row.get(0)?),
        name: row.get(1)?,
    })
}

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<Model> {
    Ok(Model {
        id: Some(row.get(0)?),
        brand_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn reference_year_from_row(row: &Row<'_>) -> rusqlite::Result<ReferenceYear> {
    Ok(ReferenceYear {
        id: Some(row.get(0)?),
        price_reference_number: row.get(1)?,
        year: row.get(2)?,
        description: row.get(3)?,
    })
}

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    let fuel: String = row.get(5)?;
    let fuel = FuelType::parse(&fuel).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown fuel type '{fuel}'").into(),
        )
    })?;
    Ok(Vehicle {
        id: Some(row.get(0)?),
        brand_id: row.get(1)?,
        model_id: row.get(2)?,
        reference_year_id: row.get(3)?,
        model_year: row.get(4)?,
        fuel,
        fipe_code: row.get(6)?,
        price: row.get(7)?,
    })
}

fn evaluation_from_row(row: &Row<'_>) -> rusqlite::Result<Evaluation> {
    Ok(Evaluation {
        id: Some(row.get(0)?),
        vehicle_id: row.get(1)?,
        evaluated_price: row.get(2)?,
        evaluated_on: row.get(3)?,
        evaluator: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_brands(&self) -> Result<Vec<Brand>> {
        self.query_all(&format!("{SELECT_BRANDS} ORDER BY id"), params![], brand_from_row)
    }

    async fn get_brands_by_ids(&self, ids: &[i64]) -> Result<Vec<Brand>> {
        self.query_by_ids(SELECT_BRANDS, ids, brand_from_row)
    }

    async fn get_brand_by_id(&self, id: i64) -> Result<Option<Brand>> {
        self.query_one(
            &format!("{SELECT_BRANDS} WHERE id = ?1"),
            params![id],
            brand_from_row,
        )
    }

    async fn get_brand_by_name(&self, name: &str) -> Result<Option<Brand>> {
        self.query_one(
            &format!("{SELECT_BRANDS} WHERE name_lower = ?1"),
            params![name_key(name)],
            brand_from_row,
        )
    }

    async fn create_brand(&self, brand: &mut Brand) -> Result<()> {
        let id = self.insert(
            "brand",
            "INSERT INTO brands (name, name_lower) VALUES (?1, ?2)",
            params![brand.name, name_key(&brand.name)],
        )?;
        brand.id = Some(id);
        debug!("Created brand: {} with id {}", brand.name, id);
        Ok(())
    }

    async fn update_brand(&self, brand: &Brand) -> Result<bool> {
        let id = brand.id.ok_or_else(|| missing_id("brand"))?;
        self.execute(
            "brand",
            "UPDATE brands SET name = ?2, name_lower = ?3 WHERE id = ?1",
            params![id, brand.name, name_key(&brand.name)],
        )
    }

    async fn delete_brand(&self, id: i64) -> Result<bool> {
        self.execute("brand", "DELETE FROM brands WHERE id = ?1", params![id])
    }

    async fn list_models(&self) -> Result<Vec<Model>> {
        self.query_all(&format!("{SELECT_MODELS} ORDER BY id"), params![], model_from_row)
    }

    async fn get_models_by_ids(&self, ids: &[i64]) -> Result<Vec<Model>> {
        self.query_by_ids(SELECT_MODELS, ids, model_from_row)
    }

    async fn get_model_by_id(&self, id: i64) -> Result<Option<Model>> {
        self.query_one(
            &format!("{SELECT_MODELS} WHERE id = ?1"),
            params![id],
            model_from_row,
        )
    }

    async fn get_models_by_brand_id(&self, brand_id: i64) -> Result<Vec<Model>> {
        self.query_all(
            &format!("{SELECT_MODELS} WHERE brand_id = ?1 ORDER BY id"),
            params![brand_id],
            model_from_row,
        )
    }

    async fn get_model_by_brand_and_name(
        &self,
        brand_id: i64,
        name: &str,
    ) -> Result<Option<Model>> {
        self.query_one(
            &format!("{SELECT_MODELS} WHERE brand_id = ?1 AND name_lower = ?2"),
            params![brand_id, name_key(name)],
            model_from_row,
        )
    }

    async fn create_model(&self, model: &mut Model) -> Result<()> {
        let id = self.insert(
            "model",
            "INSERT INTO models (brand_id, name, name_lower) VALUES (?1, ?2, ?3)",
            params![model.brand_id, model.name, name_key(&model.name)],
        )?;
        model.id = Some(id);
        debug!("Created model: {} with id {}", model.name, id);
        Ok(())
    }

    async fn update_model(&self, model: &Model) -> Result<bool> {
        let id = model.id.ok_or_else(|| missing_id("model"))?;
        self.execute(
            "model",
            "UPDATE models SET brand_id = ?2, name = ?3, name_lower = ?4 WHERE id = ?1",
            params![id, model.brand_id, model.name, name_key(&model.name)],
        )
    }

    async fn delete_model(&self, id: i64) -> Result<bool> {
        self.execute("model", "DELETE FROM models WHERE id = ?1", params![id])
    }

    async fn list_reference_years(&self) -> Result<Vec<ReferenceYear>> {
        self.query_all(
            &format!("{SELECT_REFERENCE_YEARS} ORDER BY id"),
            params![],
            reference_year_from_row,
        )
    }

    async fn get_reference_years_by_ids(&self, ids: &[i64]) -> Result<Vec<ReferenceYear>> {
        self.query_by_ids(SELECT_REFERENCE_YEARS, ids, reference_year_from_row)
    }

    async fn get_reference_year_by_id(&self, id: i64) -> Result<Option<ReferenceYear>> {
        self.query_one(
            &format!("{SELECT_REFERENCE_YEARS} WHERE id = ?1"),
            params![id],
            reference_year_from_row,
        )
    }

    async fn get_reference_year_by_number_and_year(
        &self,
        price_reference_number: i64,
        year: i64,
    ) -> Result<Option<ReferenceYear>> {
        self.query_one(
            &format!("{SELECT_REFERENCE_YEARS} WHERE price_reference_number = ?1 AND year = ?2"),
            params![price_reference_number, year],
            reference_year_from_row,
        )
    }

    async fn create_reference_year(&self, reference_year: &mut ReferenceYear) -> Result<()> {
        let id = self.insert(
            "reference year",
            "INSERT INTO reference_years (price_reference_number, year, description) VALUES (?1, ?2, ?3)",
            params![
                reference_year.price_reference_number,
                reference_year.year,
                reference_year.description
            ],
        )?;
        reference_year.id = Some(id);
        debug!(
            "Created reference year: {}/{} with id {}",
            reference_year.price_reference_number, reference_year.year, id
        );
        Ok(())
    }

    async fn update_reference_year(&self, reference_year: &ReferenceYear) -> Result<bool> {
        let id = reference_year.id.ok_or_else(|| missing_id("reference year"))?;
        self.execute(
            "reference year",
            "UPDATE reference_years SET price_reference_number = ?2, year = ?3, description = ?4 WHERE id = ?1",
            params![
                id,
                reference_year.price_reference_number,
                reference_year.year,
                reference_year.description
            ],
        )
    }

    async fn delete_reference_year(&self, id: i64) -> Result<bool> {
        self.execute(
            "reference year",
            "DELETE FROM reference_years WHERE id = ?1",
            params![id],
        )
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.query_all(&format!("{SELECT_VEHICLES} ORDER BY id"), params![], vehicle_from_row)
    }

    async fn get_vehicles_by_ids(&self, ids: &[i64]) -> Result<Vec<Vehicle>> {
        self.query_by_ids(SELECT_VEHICLES, ids, vehicle_from_row)
    }

    async fn get_vehicle_by_id(&self, id: i64) -> Result<Option<Vehicle>> {
        self.query_one(
            &format!("{SELECT_VEHICLES} WHERE id = ?1"),
            params![id],
            vehicle_from_row,
        )
    }

    async fn get_vehicles_by_brand_id(&self, brand_id: i64) -> Result<Vec<Vehicle>> {
        self.query_all(
            &format!("{SELECT_VEHICLES} WHERE brand_id = ?1 ORDER BY id"),
            params![brand_id],
            vehicle_from_row,
        )
    }

    async fn get_vehicles_by_model_id(&self, model_id: i64) -> Result<Vec<Vehicle>> {
        self.query_all(
            &format!("{SELECT_VEHICLES} WHERE model_id = ?1 ORDER BY id"),
            params![model_id],
            vehicle_from_row,
        )
    }

    async fn get_vehicles_by_reference_year_id(
        &self,
        reference_year_id: i64,
    ) -> Result<Vec<Vehicle>> {
        self.query_all(
            &format!("{SELECT_VEHICLES} WHERE reference_year_id = ?1 ORDER BY id"),
            params![reference_year_id],
            vehicle_from_row,
        )
    }

    async fn create_vehicle(&self, vehicle: &mut Vehicle) -> Result<()> {
        let id = self.insert(
            "vehicle",
            "INSERT INTO vehicles (brand_id, model_id, reference_year_id, model_year, fuel, fipe_code, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                vehicle.brand_id,
                vehicle.model_id,
                vehicle.reference_year_id,
                vehicle.model_year,
                vehicle.fuel.as_str(),
                vehicle.fipe_code,
                vehicle.price
            ],
        )?;
        vehicle.id = Some(id);
        debug!("Created vehicle: {} with id {}", vehicle.fipe_code, id);
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<bool> {
        let id = vehicle.id.ok_or_else(|| missing_id("vehicle"))?;
        self.execute(
            "vehicle",
            "UPDATE vehicles SET brand_id = ?2, model_id = ?3, reference_year_id = ?4,
                 model_year = ?5, fuel = ?6, fipe_code = ?7, price = ?8
             WHERE id = ?1",
            params![
                id,
                vehicle.brand_id,
                vehicle.model_id,
                vehicle.reference_year_id,
                vehicle.model_year,
                vehicle.fuel.as_str(),
                vehicle.fipe_code,
                vehicle.price
            ],
        )
    }

    async fn delete_vehicle(&self, id: i64) -> Result<bool> {
        self.execute("vehicle", "DELETE FROM vehicles WHERE id = ?1", params![id])
    }

    async fn list_evaluations(&self) -> Result<Vec<Evaluation>> {
        self.query_all(
            &format!("{SELECT_EVALUATIONS} ORDER BY id"),
            params![],
            evaluation_from_row,
        )
    }

    async fn get_evaluations_by_ids(&self, ids: &[i64]) -> Result<Vec<Evaluation>> {
        self.query_by_ids(SELECT_EVALUATIONS, ids, evaluation_from_row)
    }

    async fn get_evaluation_by_id(&self, id: i64) -> Result<Option<Evaluation>> {
        self.query_one(
            &format!("{SELECT_EVALUATIONS} WHERE id = ?1"),
            params![id],
            evaluation_from_row,
        )
    }

    async fn get_evaluations_by_vehicle_id(&self, vehicle_id: i64) -> Result<Vec<Evaluation>> {
        self.query_all(
            &format!("{SELECT_EVALUATIONS} WHERE vehicle_id = ?1 ORDER BY id"),
            params![vehicle_id],
            evaluation_from_row,
        )
    }

    async fn create_evaluation(&self, evaluation: &mut Evaluation) -> Result<()> {
        let id = self.insert(
            "evaluation",
            "INSERT INTO evaluations (vehicle_id, evaluated_price, evaluated_on, evaluator, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                evaluation.vehicle_id,
                evaluation.evaluated_price,
                evaluation.evaluated_on,
                evaluation.evaluator,
                evaluation.notes,
                evaluation.created_at
            ],
        )?;
        evaluation.id = Some(id);
        debug!(
            "Created evaluation of vehicle {} with id {}",
            evaluation.vehicle_id, id
        );
        Ok(())
    }

    async fn update_evaluation(&self, evaluation: &Evaluation) -> Result<bool> {
        let id = evaluation.id.ok_or_else(|| missing_id("evaluation"))?;
        self.execute(
            "evaluation",
            "UPDATE evaluations SET vehicle_id = ?2, evaluated_price = ?3, evaluated_on = ?4,
                 evaluator = ?5, notes = ?6
             WHERE id = ?1",
            params![
                id,
                evaluation.vehicle_id,
                evaluation.evaluated_price,
                evaluation.evaluated_on,
                evaluation.evaluator,
                evaluation.notes
            ],
        )
    }

    async fn delete_evaluation(&self, id: i64) -> Result<bool> {
        self.execute("evaluation", "DELETE FROM evaluations WHERE id = ?1", params![id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    async fn seeded() -> (SqliteStorage, Vehicle) {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut brand = Brand {
            id: None,
            name: "Fiat".to_string(),
        };
        storage.create_brand(&mut brand).await.unwrap();
        let mut model = Model {
            id: None,
            brand_id: brand.id.unwrap(),
            name: "Uno".to_string(),
        };
        storage.create_model(&mut model).await.unwrap();
        let mut reference = ReferenceYear {
            id: None,
            price_reference_number: 301,
            year: 2023,
            description: Some("September 2023".to_string()),
        };
        storage.create_reference_year(&mut reference).await.unwrap();
        let mut vehicle = Vehicle {
            id: None,
            brand_id: brand.id.unwrap(),
            model_id: model.id.unwrap(),
            reference_year_id: reference.id.unwrap(),
            model_year: 2020,
            fuel: FuelType::Flex,
            fipe_code: "001004-9".to_string(),
            price: 45_000.0,
        };
        storage.create_vehicle(&mut vehicle).await.unwrap();
        (storage, vehicle)
    }

    #[tokio::test]
    async fn round_trips_vehicle_rows() {
        let (storage, vehicle) = seeded().await;
        let loaded = storage
            .get_vehicle_by_id(vehicle.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, vehicle);

        let by_reference = storage
            .get_reference_year_by_number_and_year(301, 2023)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            storage
                .get_vehicles_by_reference_year_id(by_reference.id.unwrap())
                .await
                .unwrap(),
            vec![vehicle]
        );
    }

    #[tokio::test]
    async fn by_ids_skips_unknown_and_dedupes() {
        let (storage, _) = seeded().await;
        let mut second = Brand {
            id: None,
            name: "Ford".to_string(),
        };
        storage.create_brand(&mut second).await.unwrap();

        let brands = storage.get_brands_by_ids(&[2, 1, 2, 40]).await.unwrap();
        let names: Vec<_> = brands.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Fiat", "Ford"]);
        assert!(storage.get_brands_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_and_foreign_key_violations_are_conflicts() {
        let (storage, vehicle) = seeded().await;

        let mut duplicate = Brand {
            id: None,
            name: "FIAT".to_string(),
        };
        let err = storage.create_brand(&mut duplicate).await.unwrap_err();
        match err {
            ServiceError::Conflict(message) => assert_eq!(message, "brand already exists"),
            other => panic!("expected conflict, got {other:?}"),
        }

        let err = storage.delete_brand(vehicle.brand_id).await.unwrap_err();
        match err {
            ServiceError::Conflict(message) => {
                assert!(message.starts_with("brand is still referenced"));
                assert!(!message.contains("brands"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn by_ids_spans_many_chunks() {
        let (storage, _) = seeded().await;
        for name in ["Ford", "Honda"] {
            let mut brand = Brand {
                id: None,
                name: name.to_string(),
            };
            storage.create_brand(&mut brand).await.unwrap();
        }

        // Mostly unknown ids, enough to need several lookups
        let mut ids: Vec<i64> = (4..=(IDS_PER_QUERY as i64 * 3)).rev().collect();
        ids.extend([3, 1]);
        let found: Vec<_> = storage
            .get_brands_by_ids(&ids)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|b| b.id)
            .collect();
        assert_eq!(found, vec![1, 3]);
    }

    #[tokio::test]
    async fn evaluations_keep_dates() {
        let (storage, vehicle) = seeded().await;
        let created_at = Utc::now();
        let mut evaluation = Evaluation {
            id: None,
            vehicle_id: vehicle.id.unwrap(),
            evaluated_price: 43_500.0,
            evaluated_on: NaiveDate::from_ymd_opt(2023, 9, 12).unwrap(),
            evaluator: "Ana".to_string(),
            notes: None,
            created_at,
        };
        storage.create_evaluation(&mut evaluation).await.unwrap();

        let loaded = storage
            .get_evaluations_by_vehicle_id(vehicle.id.unwrap())
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].evaluated_on, evaluation.evaluated_on);
        assert_eq!(loaded[0].created_at, created_at);
    }

    #[tokio::test]
    async fn data_survives_reopen_and_clear_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog").join("vehicles.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            let mut brand = Brand {
                id: None,
                name: "Honda".to_string(),
            };
            storage.create_brand(&mut brand).await.unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.list_brands().await.unwrap().len(), 1);

        storage.clear_all_data().unwrap();
        assert!(storage.list_brands().await.unwrap().is_empty());
        let mut brand = Brand {
            id: None,
            name: "Toyota".to_string(),
        };
        storage.create_brand(&mut brand).await.unwrap();
        assert_eq!(brand.id, Some(2));
    }
}
