//! Response shape detection and flattening.
//!
//! Upstream endpoints are inconsistent: some return a `{ data: [...], meta }` list envelope,
//! some a `{ data: {...} }` single-record envelope, and some plain JSON. [`normalize`] turns all
//! of them into one of three canonical forms. Detection is permissive: anything that does not
//! look like an envelope is passed through untouched instead of being rejected.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field holding a resource's identifier.
pub const ID_FIELD: &str = "id";

/// Field holding a resource's non-identifier fields (the attribute bag).
pub const ATTRIBUTES_FIELD: &str = "attributes";

const DATA_FIELD: &str = "data";

/// A flat record. Always contains an `id` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord(Map<String, Value>);

impl CanonicalRecord {
    /// Identifier value (`null` when the source had none).
    #[must_use]
    pub fn id(&self) -> &Value {
        self.0.get(ID_FIELD).unwrap_or(&Value::Null)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A flattened list of records plus the best known size of the full result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalCollection {
    pub items: Vec<CanonicalRecord>,
    /// May exceed `items.len()` when the upstream returned one page of a larger set.
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(CanonicalRecord),
    Collection(CanonicalCollection),
    /// Not an envelope; callers must treat it as arbitrary JSON.
    Passthrough(Value),
}

impl Normalized {
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Normalized::Record(record) => record.into_value(),
            Normalized::Collection(collection) => {
                serde_json::to_value(collection).unwrap_or(Value::Null)
            }
            Normalized::Passthrough(value) => value,
        }
    }

    /// View a normalized body as a list of records.
    ///
    /// Single records become a one-item collection; pass-through arrays are flattened
    /// element-wise. Other pass-through values yield `None`.
    #[must_use]
    pub fn into_collection(self) -> Option<CanonicalCollection> {
        match self {
            Normalized::Collection(collection) => Some(collection),
            Normalized::Record(record) => Some(CanonicalCollection {
                items: vec![record],
                total: 1,
                cursor: None,
            }),
            Normalized::Passthrough(Value::Array(items)) => {
                let items: Vec<CanonicalRecord> = items.iter().map(flatten_record).collect();
                Some(CanonicalCollection {
                    total: items.len(),
                    items,
                    cursor: None,
                })
            }
            Normalized::Passthrough(_) => None,
        }
    }
}

impl Serialize for Normalized {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Normalized::Record(record) => record.serialize(serializer),
            Normalized::Collection(collection) => collection.serialize(serializer),
            Normalized::Passthrough(value) => value.serialize(serializer),
        }
    }
}

/// Envelope shape detected by [`classify_shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    Collection,
    Single,
    Empty,
    Passthrough,
}

/// Detect the envelope shape of a raw body. First match wins:
/// non-empty list of attribute-bearing objects, then single attribute-bearing object, then
/// empty list. Everything else (including a malformed `data`) is pass-through.
#[must_use]
pub fn classify_shape(body: &Value) -> EnvelopeShape {
    let Some(data) = body.get(DATA_FIELD) else {
        return EnvelopeShape::Passthrough;
    };

    match data {
        Value::Array(items) if items.is_empty() => EnvelopeShape::Empty,
        Value::Array(items) if items.first().is_some_and(has_attribute_bag) => {
            EnvelopeShape::Collection
        }
        Value::Object(_) if has_attribute_bag(data) => EnvelopeShape::Single,
        _ => EnvelopeShape::Passthrough,
    }
}

/// Normalize a raw body. Pure; never fails.
#[must_use]
pub fn normalize(body: Value) -> Normalized {
    match classify_shape(&body) {
        EnvelopeShape::Collection => {
            let items: Vec<CanonicalRecord> = body
                .get(DATA_FIELD)
                .and_then(Value::as_array)
                .map(|data| data.iter().map(flatten_record).collect())
                .unwrap_or_default();
            let total = read_total(&body).unwrap_or(items.len());
            Normalized::Collection(CanonicalCollection {
                items,
                total,
                cursor: read_cursor(&body),
            })
        }
        EnvelopeShape::Single => {
            let record = body
                .get(DATA_FIELD)
                .map(flatten_record)
                .unwrap_or_default();
            Normalized::Record(record)
        }
        EnvelopeShape::Empty => Normalized::Collection(CanonicalCollection {
            items: Vec::new(),
            total: 0,
            cursor: read_cursor(&body),
        }),
        EnvelopeShape::Passthrough => Normalized::Passthrough(body),
    }
}

/// Flatten one resource into a canonical record.
///
/// The resource's own `id` always wins over an attribute that happens to be called `id`.
/// Objects without an attribute bag are taken as already flat. Non-object elements are kept
/// under `value` with a `null` id.
#[must_use]
pub fn flatten_record(resource: &Value) -> CanonicalRecord {
    let Value::Object(obj) = resource else {
        let mut out = Map::new();
        out.insert(ID_FIELD.to_string(), Value::Null);
        out.insert("value".to_string(), resource.clone());
        return CanonicalRecord(out);
    };

    let Some(Value::Object(attributes)) = obj.get(ATTRIBUTES_FIELD) else {
        let mut out = obj.clone();
        out.entry(ID_FIELD).or_insert(Value::Null);
        return CanonicalRecord(out);
    };

    let mut out = Map::with_capacity(attributes.len() + 1);
    let id = obj
        .get(ID_FIELD)
        .or_else(|| attributes.get(ID_FIELD))
        .cloned()
        .unwrap_or(Value::Null);
    out.insert(ID_FIELD.to_string(), id);
    for (key, value) in attributes {
        if key == ID_FIELD {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }
    CanonicalRecord(out)
}

fn has_attribute_bag(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key(ATTRIBUTES_FIELD))
}

fn read_total(body: &Value) -> Option<usize> {
    ["/meta/page/total", "/meta/total", "/meta/total_count"]
        .iter()
        .find_map(|ptr| body.pointer(ptr).and_then(Value::as_u64))
        .and_then(|n| usize::try_from(n).ok())
}

fn read_cursor(body: &Value) -> Option<String> {
    ["/meta/page/cursor", "/meta/page/next_cursor", "/links/next"]
        .iter()
        .find_map(|ptr| body.pointer(ptr).and_then(Value::as_str))
        .map(str::to_string)
}
