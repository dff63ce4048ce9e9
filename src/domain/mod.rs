use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Option<i64>,
    pub brand_id: i64,
    pub name: String,
}

/// A monthly price table, identified by its sequential reference number and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceYear {
    pub id: Option<i64>,
    pub price_reference_number: i64,
    pub year: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Option<i64>,
    pub brand_id: i64,
    pub model_id: i64,
    pub reference_year_id: i64,
    pub model_year: i64,
    pub fuel: FuelType,
    pub fipe_code: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Option<i64>,
    pub vehicle_id: i64,
    pub evaluated_price: f64,
    pub evaluated_on: NaiveDate,
    pub evaluator: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FuelType {
    Gasoline,
    Ethanol,
    Flex,
    Diesel,
    Electric,
    Hybrid,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Gasoline => "gasoline",
            FuelType::Ethanol => "ethanol",
            FuelType::Flex => "flex",
            FuelType::Diesel => "diesel",
            FuelType::Electric => "electric",
            FuelType::Hybrid => "hybrid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gasoline" => Some(FuelType::Gasoline),
            "ethanol" => Some(FuelType::Ethanol),
            "flex" => Some(FuelType::Flex),
            "diesel" => Some(FuelType::Diesel),
            "electric" => Some(FuelType::Electric),
            "hybrid" => Some(FuelType::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_type_serializes_camel_case() {
        let json = serde_json::to_string(&FuelType::Gasoline).unwrap();
        assert_eq!(json, "\"gasoline\"");
        let parsed: FuelType = serde_json::from_str("\"hybrid\"").unwrap();
        assert_eq!(parsed, FuelType::Hybrid);
    }

    #[test]
    fn fuel_type_parse_matches_as_str() {
        for fuel in [
            FuelType::Gasoline,
            FuelType::Ethanol,
            FuelType::Flex,
            FuelType::Diesel,
            FuelType::Electric,
            FuelType::Hybrid,
        ] {
            assert_eq!(FuelType::parse(fuel.as_str()), Some(fuel));
        }
        assert_eq!(FuelType::parse("steam"), None);
    }
}
