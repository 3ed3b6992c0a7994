//! Item models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upstream item identifier
pub type ItemId = i64;

/// Item body exactly as returned by the upstream API
///
/// Field names are upstream names (`by`, `time`, `type`) or, for
/// re-submitted data, canonical names. See `services::normalizer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(pub Map<String, Value>);

impl RawItem {
    /// Wrap a JSON value, `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Item id, if present and integral
    pub fn id(&self) -> Option<ItemId> {
        self.0.get("id").and_then(Value::as_i64)
    }

    /// Non-null field value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }
}

/// Normalized item, the unit of persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    /// Upstream id, the sole upsert key
    pub id: ItemId,
    pub title: String,
    pub url: Option<String>,
    pub score: Option<i64>,
    pub author: Option<String>,
    /// Creation time, Unix epoch seconds
    pub timestamp: Option<i64>,
    /// Comment count
    pub descendants: Option<i64>,
    /// Item type tag ("story", "job", "poll", ...)
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub text: Option<String>,
}

impl Item {
    pub fn new(id: ItemId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: None,
            score: None,
            author: None,
            timestamp: None,
            descendants: None,
            item_type: None,
            text: None,
        }
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = Some(score);
        self
    }

    /// Apply every field present in `incoming` that differs from `self`.
    ///
    /// Absent (`None`) incoming fields never clear a stored value. Returns
    /// whether anything changed.
    pub fn merge_from(&mut self, incoming: &Item) -> bool {
        fn merge<T: PartialEq + Clone>(current: &mut Option<T>, incoming: &Option<T>) -> bool {
            match incoming {
                Some(value) if current.as_ref() != Some(value) => {
                    *current = Some(value.clone());
                    true
                }
                _ => false,
            }
        }

        let mut changed = false;
        if self.title != incoming.title {
            self.title = incoming.title.clone();
            changed = true;
        }
        changed |= merge(&mut self.url, &incoming.url);
        changed |= merge(&mut self.score, &incoming.score);
        changed |= merge(&mut self.author, &incoming.author);
        changed |= merge(&mut self.timestamp, &incoming.timestamp);
        changed |= merge(&mut self.descendants, &incoming.descendants);
        changed |= merge(&mut self.item_type, &incoming.item_type);
        changed |= merge(&mut self.text, &incoming.text);
        changed
    }
}

/// Item row with bookkeeping timestamps, as served by `GET /data`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: Item,
    pub created_at: String,
    pub updated_at: String,
}
