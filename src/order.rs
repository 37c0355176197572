//! Order document accepted by the ingress adapters.
//!
//! Field names and nesting are the wire contract consumed by the order and
//! stock services, so the serde layout here must stay stable. Struct field
//! order matches the canonical document so re-encoding is byte-stable.
//! Unknown fields are rejected rather than dropped, so the published message
//! always carries everything the caller sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderPayload {
    pub order_id: String,
    pub client: Client,
    pub products: Vec<ProductLine>,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Client {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// One ordered product and the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductLine {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl OrderPayload {
    /// Parse and structurally check a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, RelayError> {
        Self::from_json_slice(raw.as_bytes())
    }

    /// Parse and structurally check a JSON document given as bytes.
    ///
    /// The shape checks run on the untyped document first so the caller gets
    /// a precise reason (`products` missing, not an array, empty) instead of a
    /// generic decode error.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, RelayError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(RelayError::Validation("payload is empty".into()));
        }
        let document: Value = serde_json::from_slice(raw)
            .map_err(|e| RelayError::Validation(format!("malformed JSON: {e}")))?;
        Self::from_value(document)
    }

    /// Structurally check an already-parsed document and convert it.
    pub fn from_value(document: Value) -> Result<Self, RelayError> {
        check_shape(&document)?;
        let payload: OrderPayload = serde_json::from_value(document)
            .map_err(|e| RelayError::Validation(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Enforce the invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.products.is_empty() {
            return Err(RelayError::Validation("products must not be empty".into()));
        }
        if let Some(line) = self.products.iter().find(|line| line.quantity == 0) {
            return Err(RelayError::Validation(format!(
                "product {} has quantity 0; quantity must be greater than zero",
                line.product_id
            )));
        }
        Ok(())
    }
}

fn check_shape(document: &Value) -> Result<(), RelayError> {
    let object = match document {
        Value::Object(object) => object,
        Value::Null => return Err(RelayError::Validation("payload is missing".into())),
        _ => {
            return Err(RelayError::Validation(
                "payload must be a JSON object".into(),
            ))
        }
    };
    match object.get("products") {
        None => Err(RelayError::Validation("products is required".into())),
        Some(Value::Array(items)) if items.is_empty() => {
            Err(RelayError::Validation("products must not be empty".into()))
        }
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(RelayError::Validation("products must be an array".into())),
    }
}
