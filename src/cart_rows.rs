//! Normalization of aggregated cart rows.
//!
//! The cart query aggregates items into one JSON value per cart. Depending on
//! how the value reaches us it can be JSON text, an array, or an array nested
//! inside further arrays; outer joins contribute `null` entries for carts
//! without items. Everything funnels through [`normalize_cart_items`] so call
//! sites never inspect the raw shape themselves.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::{models::CartItem, uploads::decode_images};

pub const TEMP_ID_PREFIX: &str = "temp_";

/// Nesting depth beyond which a value is treated as garbage.
const MAX_DEPTH: usize = 4;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCartItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "product_id")]
    product_id: Option<Value>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default, alias = "sale_price")]
    sale_price: Option<Value>,
    #[serde(default)]
    inventory: Option<Value>,
    #[serde(default)]
    images: Option<Value>,
    #[serde(default, alias = "created_at")]
    created_at: Option<String>,
}

/// Turns the aggregated items value into cart items.
///
/// `now_millis` stamps temporary ids for rows that carry neither an id nor a
/// creation time.
pub fn normalize_cart_items(raw: Value, now_millis: i64) -> Vec<CartItem> {
    let mut entries = Vec::new();
    flatten_into(raw, 0, &mut entries);

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawCartItem>(entry) {
            Ok(raw) => into_cart_item(raw, now_millis),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed cart item");
                None
            }
        })
        .collect()
}

fn flatten_into(value: Value, depth: usize, out: &mut Vec<Value>) {
    if depth > MAX_DEPTH {
        tracing::warn!("cart items nested too deeply, ignoring");
        return;
    }
    match value {
        Value::Null => {}
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => flatten_into(parsed, depth + 1, out),
            Err(err) => tracing::warn!(error = %err, "cart items text is not JSON"),
        },
        Value::Array(entries) => {
            for entry in entries {
                flatten_into(entry, depth + 1, out);
            }
        }
        obj @ Value::Object(_) => out.push(obj),
        other => tracing::warn!(value = %other, "unexpected scalar in cart items"),
    }
}

fn into_cart_item(raw: RawCartItem, now_millis: i64) -> Option<CartItem> {
    let product_id = raw.product_id.as_ref().and_then(as_i64)?;
    let quantity = match raw.quantity.as_ref() {
        None | Some(Value::Null) => 1,
        Some(v) => as_i64(v)?,
    };
    if quantity <= 0 {
        return None;
    }

    let existing_id = match raw.id {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let (id, is_temporary) = match existing_id {
        Some(id) => (id, false),
        None => {
            let stamp = raw
                .created_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.timestamp_millis())
                .unwrap_or(now_millis);
            (temp_item_id(product_id, stamp), true)
        }
    };

    let image = raw.images.and_then(|images| match images {
        Value::String(s) => decode_images(&s).into_iter().next(),
        Value::Array(list) => list
            .into_iter()
            .find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    });

    Some(CartItem {
        id,
        product_id,
        quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
        name: raw.name,
        slug: raw.slug,
        price: raw.price.as_ref().and_then(as_i64).unwrap_or(0),
        sale_price: raw.sale_price.as_ref().and_then(as_i64),
        inventory: raw
            .inventory
            .as_ref()
            .and_then(as_i64)
            .and_then(|n| i32::try_from(n).ok()),
        image,
        is_temporary,
    })
}

/// Reads a number that may arrive as a JSON number or as numeric text.
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

pub fn temp_item_id(product_id: i64, millis: i64) -> String {
    format!("{TEMP_ID_PREFIX}{product_id}_{millis}")
}

/// Product id encoded in a `temp_<productId>_<millis>` id.
pub fn parse_temp_item_id(id: &str) -> Option<i64> {
    let rest = id.strip_prefix(TEMP_ID_PREFIX)?;
    let (product, stamp) = rest.split_once('_')?;
    stamp.parse::<i64>().ok()?;
    product.parse::<i64>().ok()
}
