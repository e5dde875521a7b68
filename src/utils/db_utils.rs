use actix_web::error::ErrorBadRequest;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

/// Typed value for a dynamic UPDATE binding.
#[derive(Debug)]
pub enum PatchValue {
    Text(String),
    Int(i64),
    Float(f64),
    Flag(bool),
    Day(NaiveDate),
    Moment(NaiveDateTime),
    Null,
}

#[derive(Debug)]
pub struct Patch {
    pub sql: String,
    pub values: Vec<PatchValue>,
}

/// Builds `UPDATE {table} SET ... WHERE id = ?` from a JSON object, keeping
/// only keys named in `allowed`. Column names never come from the client.
pub fn build_patch(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_value: u64,
) -> Result<Patch, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    let mut columns = Vec::new();
    let mut values = Vec::new();

    for (key, value) in obj {
        let column = match allowed.iter().find(|c| *c == key) {
            Some(c) => *c,
            None => return Err(ErrorBadRequest(format!("Unknown field: {}", key))),
        };

        let bound = match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    PatchValue::Day(d)
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    PatchValue::Moment(dt)
                } else {
                    PatchValue::Text(s.clone())
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PatchValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    PatchValue::Float(f)
                } else {
                    return Err(ErrorBadRequest(format!("Unsupported number for {}", key)));
                }
            }
            Value::Bool(b) => PatchValue::Flag(*b),
            Value::Null => PatchValue::Null,
            _ => return Err(ErrorBadRequest(format!("Unsupported value for {}", key))),
        };

        columns.push(format!("{} = ?", column));
        values.push(bound);
    }

    if columns.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    values.push(PatchValue::Int(id_value as i64));

    Ok(Patch {
        sql: format!("UPDATE {} SET {} WHERE id = ?", table, columns.join(", ")),
        values,
    })
}

pub async fn execute_patch(pool: &MySqlPool, patch: Patch) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&patch.sql);

    for value in patch.values {
        query = match value {
            PatchValue::Text(v) => query.bind(v),
            PatchValue::Int(v) => query.bind(v),
            PatchValue::Float(v) => query.bind(v),
            PatchValue::Flag(v) => query.bind(v),
            PatchValue::Day(v) => query.bind(v),
            PatchValue::Moment(v) => query.bind(v),
            PatchValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_update_for_allowed_columns_only() {
        let patch = build_patch(
            "employees",
            &json!({"name": "Rina", "phone": "0170000000"}),
            &["name", "phone", "status"],
            5,
        )
        .unwrap();

        assert!(patch.sql.starts_with("UPDATE employees SET "));
        assert!(patch.sql.contains("name = ?"));
        assert!(patch.sql.contains("phone = ?"));
        assert!(patch.sql.ends_with("WHERE id = ?"));
        assert_eq!(patch.values.len(), 3); // two fields + id
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = build_patch("employees", &json!({"role": "boss"}), &["name"], 5);
        assert!(err.is_err());
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(build_patch("employees", &json!({}), &["name"], 5).is_err());
    }

    #[test]
    fn date_strings_become_typed_dates() {
        let patch = build_patch(
            "employees",
            &json!({"hired_on": "2026-01-15"}),
            &["hired_on"],
            1,
        )
        .unwrap();

        assert!(matches!(patch.values[0], PatchValue::Day(_)));
    }
}
