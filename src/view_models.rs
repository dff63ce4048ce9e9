//! Wire shapes exchanged with the admin front-end (camelCase JSON).

use crate::domain::{Brand, FuelType, ReferenceYear};
use crate::error::ValidationErrors;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandVm {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrandVm {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVm {
    pub id: i64,
    pub brand_id: i64,
    pub brand_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelVm {
    pub brand_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceYearVm {
    pub id: i64,
    pub price_reference_number: i64,
    pub year: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferenceYearVm {
    pub price_reference_number: i64,
    pub year: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleVm {
    pub id: i64,
    pub brand_id: i64,
    pub brand_name: String,
    pub model_id: i64,
    pub model_name: String,
    pub reference_year_id: i64,
    pub price_reference_number: i64,
    pub reference_year: i64,
    pub model_year: i64,
    pub fuel: FuelType,
    pub fipe_code: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehicleVm {
    pub brand_id: i64,
    pub model_id: i64,
    pub reference_year_id: i64,
    pub model_year: i64,
    pub fuel: FuelType,
    pub fipe_code: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationVm {
    pub id: i64,
    pub vehicle_id: i64,
    pub fipe_code: String,
    pub evaluated_price: f64,
    /// Catalog price of the evaluated vehicle
    pub reference_price: f64,
    /// `evaluated_price - reference_price`
    pub price_difference: f64,
    pub evaluated_on: NaiveDate,
    pub evaluator: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationVm {
    pub vehicle_id: i64,
    pub evaluated_price: f64,
    pub evaluated_on: NaiveDate,
    pub evaluator: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResultVm {
    pub id: i64,
    pub success: bool,
    pub message: String,
}

impl RemoveResultVm {
    pub fn removed(entity: &str, id: i64) -> Self {
        Self {
            id,
            success: true,
            message: format!("{entity} {id} removed"),
        }
    }
}

/// Body of a 400 response, shaped like an ASP.NET validation problem document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadRequestResultVm {
    pub title: String,
    pub status: u16,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl From<&ValidationErrors> for BadRequestResultVm {
    fn from(errors: &ValidationErrors) -> Self {
        Self {
            title: "One or more validation errors occurred.".to_string(),
            status: 400,
            errors: errors.fields().clone(),
        }
    }
}

impl From<Brand> for BrandVm {
    fn from(brand: Brand) -> Self {
        Self {
            id: brand.id.unwrap_or_default(),
            name: brand.name,
        }
    }
}

impl From<ReferenceYear> for ReferenceYearVm {
    fn from(reference_year: ReferenceYear) -> Self {
        Self {
            id: reference_year.id.unwrap_or_default(),
            price_reference_number: reference_year.price_reference_number,
            year: reference_year.year,
            description: reference_year.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_vehicle_vm_reads_camel_case() {
        let vm: CreateVehicleVm = serde_json::from_value(json!({
            "brandId": 1,
            "modelId": 2,
            "referenceYearId": 3,
            "modelYear": 2021,
            "fuel": "flex",
            "fipeCode": "001004-9",
            "price": 52000.5
        }))
        .unwrap();
        assert_eq!(vm.reference_year_id, 3);
        assert_eq!(vm.fuel, FuelType::Flex);
    }

    #[test]
    fn bad_request_body_lists_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("fipeCode", "must look like 001004-9");
        let body = serde_json::to_value(BadRequestResultVm::from(&errors)).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "One or more validation errors occurred.",
                "status": 400,
                "errors": { "fipeCode": ["must look like 001004-9"] }
            })
        );
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let vm: CreateReferenceYearVm =
            serde_json::from_value(json!({ "priceReferenceNumber": 301, "year": 2023 })).unwrap();
        assert_eq!(vm.description, None);
    }
}
