use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};

use crate::api::error;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "setting_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Int,
    Bool,
    Json,
    List,
}

/// Typed setting value; the variant is fixed when the value is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SettingValue {
    String(String),
    Int(i64),
    Bool(bool),
    Json(serde_json::Value),
    List(Vec<String>),
}

impl SettingValue {
    pub fn value_type(&self) -> SettingType {
        match self {
            Self::String(_) => SettingType::String,
            Self::Int(_) => SettingType::Int,
            Self::Bool(_) => SettingType::Bool,
            Self::Json(_) => SettingType::Json,
            Self::List(_) => SettingType::List,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Json(v) => v.clone(),
            Self::List(items) => serde_json::Value::from(items.clone()),
        }
    }

    /// Decodes a stored or submitted value. Scalars written as strings
    /// (`"1"`, `"true"`) are accepted for int and bool settings.
    pub fn from_json(
        value_type: SettingType,
        value: serde_json::Value,
    ) -> Result<Self, error::SystemError> {
        use serde_json::Value;

        let mismatch =
            || error::SystemError::bad_request(format!("Value does not match type {value_type:?}"));

        match (value_type, value) {
            (SettingType::String, Value::String(s)) => Ok(Self::String(s)),
            (SettingType::String, Value::Number(n)) => Ok(Self::String(n.to_string())),
            (SettingType::Int, Value::Number(n)) => n.as_i64().map(Self::Int).ok_or_else(mismatch),
            (SettingType::Int, Value::String(s)) => {
                s.trim().parse::<i64>().map(Self::Int).map_err(|_| mismatch())
            }
            (SettingType::Bool, Value::Bool(b)) => Ok(Self::Bool(b)),
            (SettingType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Self::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Self::Bool(false)),
                _ => Err(mismatch()),
            },
            (SettingType::Bool, Value::Number(n)) => Ok(Self::Bool(n.as_i64() != Some(0))),
            (SettingType::Json, value) => Ok(Self::Json(value)),
            (SettingType::List, Value::Array(items)) => Ok(Self::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            (SettingType::List, Value::String(s)) => Ok(Self::List(
                s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
            )),
            _ => Err(mismatch()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: serde_json::Value,
    pub value_type: SettingType,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: SettingValue,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<SettingRow> for Setting {
    type Error = error::SystemError;

    fn try_from(row: SettingRow) -> Result<Self, Self::Error> {
        Ok(Setting {
            value: SettingValue::from_json(row.value_type, row.value)?,
            key: row.key,
            updated_at: row.updated_at,
        })
    }
}
