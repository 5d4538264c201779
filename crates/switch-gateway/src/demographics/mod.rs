//! Demographics capture
//!
//! Validates the form submission and appends one row through a
//! [`DemographicsStore`]. The store owns its schema.

mod postgres;

pub use postgres::PgDemographicsStore;

use async_trait::async_trait;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

const GENDER_MAX: usize = 50;
const PROFESSION_MAX: usize = 100;
const FRUITS_VEGETABLES_MAX: usize = 100;
const SESSION_ID_MAX: usize = 255;

/// A validated demographics row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemographicsRecord {
    pub age: i32,
    pub gender: String,
    pub profession: String,
    pub fruits_vegetables: String,
    pub session_id: Option<String>,
}

/// Reasons a submission is rejected with 400
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemographicsError {
    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),

    #[error("Invalid age value")]
    InvalidAge,

    #[error("Field '{field}' exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Persistent store failures (mapped to 500)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("schema setup failed: {0}")]
    Schema(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Append-only store for demographics rows
#[async_trait]
pub trait DemographicsStore: Send + Sync {
    /// Ensure the schema exists, append the row and return its generated id
    async fn insert(&self, record: &DemographicsRecord) -> Result<i64, StoreError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDemographics {
    #[serde(default)]
    age: Option<Value>,
    #[serde(default)]
    gender: Option<Value>,
    #[serde(default)]
    profession: Option<Value>,
    #[serde(default)]
    fruits_vegetables: Option<Value>,
    #[serde(default)]
    session_id: Option<Value>,
}

/// Validate a raw submission body
pub fn validate(body: &[u8]) -> Result<DemographicsRecord, DemographicsError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| DemographicsError::MalformedBody(e.to_string()))?;
    if !value.is_object() {
        return Err(DemographicsError::MalformedBody(
            "expected a JSON object".to_string(),
        ));
    }
    let raw: RawDemographics = serde_json::from_value(value)
        .map_err(|e| DemographicsError::MalformedBody(e.to_string()))?;

    let age = present(raw.age);
    let gender = text(raw.gender);
    let profession = text(raw.profession);
    let fruits_vegetables = text(raw.fruits_vegetables);

    let mut missing = Vec::new();
    if age.is_none() {
        missing.push("age");
    }
    if gender.is_none() {
        missing.push("gender");
    }
    if profession.is_none() {
        missing.push("profession");
    }
    if fruits_vegetables.is_none() {
        missing.push("fruitsVegetables");
    }

    let (Some(age), Some(gender), Some(profession), Some(fruits_vegetables)) =
        (age, gender, profession, fruits_vegetables)
    else {
        return Err(DemographicsError::MissingFields(missing));
    };

    let age = parse_age(&age)?;
    check_len("gender", &gender, GENDER_MAX)?;
    check_len("profession", &profession, PROFESSION_MAX)?;
    check_len("fruitsVegetables", &fruits_vegetables, FRUITS_VEGETABLES_MAX)?;

    let session_id = text(raw.session_id);
    if let Some(session_id) = &session_id {
        check_len("sessionId", session_id, SESSION_ID_MAX)?;
    }

    Ok(DemographicsRecord {
        age,
        gender,
        profession,
        fruits_vegetables,
        session_id,
    })
}

/// Non-null, non-empty-string value
fn present(value: Option<Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        other => other,
    }
}

fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// Whole number in 1..=120, given as a JSON number or numeric string
fn parse_age(value: &Value) -> Result<i32, DemographicsError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(DemographicsError::InvalidAge)?;

    if number.fract() != 0.0 || !(1.0..=120.0).contains(&number) {
        return Err(DemographicsError::InvalidAge);
    }
    Ok(number as i32)
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), DemographicsError> {
    if value.chars().count() > max {
        return Err(DemographicsError::TooLong { field, max });
    }
    Ok(())
}

/// Terminal outcome of a demographics submission
#[derive(Debug, Clone, PartialEq)]
pub enum DemographicsResponse {
    Saved { id: i64 },
    Rejected(DemographicsError),
    Failed { detail: Option<String> },
    NotConfigured,
}

impl DemographicsResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            DemographicsResponse::Saved { .. } => StatusCode::OK,
            DemographicsResponse::Rejected(_) => StatusCode::BAD_REQUEST,
            DemographicsResponse::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DemographicsResponse::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> Value {
        match self {
            DemographicsResponse::Saved { id } => json!({
                "success": true,
                "id": id,
                "message": "Demographics saved successfully",
            }),
            DemographicsResponse::Rejected(DemographicsError::MissingFields(fields)) => json!({
                "success": false,
                "error": "Missing required fields",
                "details": fields.join(", "),
            }),
            DemographicsResponse::Rejected(e) => json!({
                "success": false,
                "error": e.to_string(),
            }),
            DemographicsResponse::Failed { detail } => {
                let mut body = json!({
                    "success": false,
                    "error": "Internal server error",
                });
                if let Some(detail) = detail {
                    body["details"] = Value::String(detail.clone());
                }
                body
            }
            DemographicsResponse::NotConfigured => json!({
                "success": false,
                "error": "Demographics storage not configured",
            }),
        }
    }
}

impl IntoResponse for DemographicsResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Validate and store one submission
pub async fn submit(
    store: Option<&dyn DemographicsStore>,
    body: &[u8],
    debug: bool,
) -> DemographicsResponse {
    let Some(store) = store else {
        warn!("Demographics submission received but no database is configured");
        return DemographicsResponse::NotConfigured;
    };

    let record = match validate(body) {
        Ok(record) => record,
        Err(e) => {
            warn!(error_type = "validation", error_message = %e, "Rejected demographics submission");
            return DemographicsResponse::Rejected(e);
        }
    };

    match store.insert(&record).await {
        Ok(id) => {
            info!(id, "Demographics saved");
            DemographicsResponse::Saved { id }
        }
        Err(e) => {
            error!(error_type = "storage", error_message = %e, "Demographics insert failed");
            DemographicsResponse::Failed {
                detail: debug.then(|| e.to_string()),
            }
        }
    }
}
