//! JSON Schema validation for IBGE reference payloads.
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `localidades-estados.json`
//! - `localidades-municipios.json`
//!
//! Aggregate tables are not validated here; their two shapes are recognized
//! by [`crate::parser::RawTable::from_json`].

use serde_json::Value;

const STATES_SCHEMA: &str = include_str!("../../schemas/localidades-estados.json");
const MUNICIPALITIES_SCHEMA: &str = include_str!("../../schemas/localidades-municipios.json");

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_embedded(schema: &str, data: &Value) -> Result<(), Vec<String>> {
    let schema: Value = serde_json::from_str(schema)
        .map_err(|e| vec![format!("Invalid embedded schema: {}", e)])?;
    validate(&schema, data)
}

/// Validate the states list returned by `/localidades/estados`.
pub fn validate_states(data: &Value) -> Result<(), Vec<String>> {
    validate_embedded(STATES_SCHEMA, data)
}

/// Validate the list returned by `/localidades/estados/{id}/municipios`.
pub fn validate_municipalities(data: &Value) -> Result<(), Vec<String>> {
    validate_embedded(MUNICIPALITIES_SCHEMA, data)
}
