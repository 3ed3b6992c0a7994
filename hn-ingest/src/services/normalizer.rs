//! Field normalization and filtering
//!
//! Maps upstream field names onto [`Item`], drops duplicates and applies the
//! job's filters. Pure and deterministic.

use crate::models::{Item, ItemId, RawItem};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// (canonical, upstream alias) pairs; the canonical name wins when both are set
const FIELD_ALIASES: &[(&str, &str)] = &[("author", "by"), ("timestamp", "time"), ("item_type", "type")];

fn aliased<'a>(raw: &'a RawItem, canonical: &str) -> Option<&'a Value> {
    raw.field(canonical).or_else(|| {
        FIELD_ALIASES
            .iter()
            .find(|(name, _)| *name == canonical)
            .and_then(|(_, alias)| raw.field(alias))
    })
}

fn string_field(raw: &RawItem, name: &str) -> Option<String> {
    aliased(raw, name).and_then(Value::as_str).map(str::to_string)
}

fn integer_field(raw: &RawItem, name: &str) -> Option<i64> {
    aliased(raw, name).and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
}

/// Convert one raw body; `None` when it has no id or no title
pub fn normalize(raw: &RawItem) -> Option<Item> {
    let id = raw.id()?;
    let title = match string_field(raw, "title") {
        Some(title) => title,
        None => {
            debug!(item_id = id, "Dropping item without title");
            return None;
        }
    };

    Some(Item {
        id,
        title,
        url: string_field(raw, "url"),
        score: integer_field(raw, "score"),
        author: string_field(raw, "author"),
        timestamp: integer_field(raw, "timestamp"),
        descendants: integer_field(raw, "descendants"),
        item_type: string_field(raw, "item_type"),
        text: string_field(raw, "text"),
    })
}

/// Normalize, deduplicate (first occurrence wins) and filter.
///
/// * `min_score` keeps items whose score is present and `>= min_score`
/// * `keyword` keeps items whose title contains it, ignoring case; blank
///   keywords are ignored
///
/// Both filters must pass. Input order is preserved.
pub fn normalize_and_filter(items: &[RawItem], min_score: Option<i64>, keyword: Option<&str>) -> Vec<Item> {
    let needle = keyword
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_lowercase);

    let mut seen: HashSet<ItemId> = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());

    for raw in items {
        let Some(item) = normalize(raw) else {
            continue;
        };

        if !seen.insert(item.id) {
            debug!(item_id = item.id, "Dropping duplicate item");
            continue;
        }

        if let Some(threshold) = min_score {
            if !item.score.is_some_and(|score| score >= threshold) {
                continue;
            }
        }

        if let Some(ref needle) = needle {
            if !item.title.to_lowercase().contains(needle.as_str()) {
                continue;
            }
        }

        kept.push(item);
    }

    kept
}
