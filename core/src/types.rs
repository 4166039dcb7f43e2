//! Domain model for the product API.
//!
//! # Design
//! The remote API owns the product schema. Only `id`, `name` and `price` are
//! typed here; every other field lands in `extra` and is written back
//! unchanged, so a product fetched and then sent back loses nothing.
//! `extra` never holds the typed names or their PascalCase aliases, and
//! `price` must be finite to serialize.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// A product as exchanged with `/api/products`.
///
/// Field names are camelCase on the wire. PascalCase names are accepted on
/// input because some backends serialize that way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, alias = "Id")]
    pub id: i32,
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Price", serialize_with = "finite_price")]
    pub price: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            price,
            extra: Map::new(),
        }
    }

    /// Attach an additional descriptive field.
    ///
    /// `id`, `name` and `price` (in either casing) set the typed field
    /// instead; a value of the wrong type for them is dropped.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "id" | "Id" => match value.as_i64().and_then(|v| i32::try_from(v).ok()) {
                Some(id) => self.id = id,
                None => tracing::warn!(%value, "ignoring non-integer product id"),
            },
            "name" | "Name" => match value {
                Value::String(name) => self.name = name,
                other => tracing::warn!(value = %other, "ignoring non-string product name"),
            },
            "price" | "Price" => match value.as_f64().filter(|p| p.is_finite()) {
                Some(price) => self.price = price,
                None => tracing::warn!(%value, "ignoring non-numeric product price"),
            },
            _ => {
                self.extra.insert(key, value);
            }
        }
        self
    }
}

fn finite_price<S: Serializer>(price: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !price.is_finite() {
        return Err(serde::ser::Error::custom(format!("price must be finite, got {price}")));
    }
    serializer.serialize_f64(*price)
}
