use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One catalog item as found in the source feed. Field names follow the feed;
/// real-world feeds are sloppy, so ids may arrive as strings or numbers and
/// price/quantity may be missing entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductRecord {
    /// Product unique code.
    #[serde(default)]
    pub ean: String,
    /// Desired URL slug.
    #[serde(default)]
    pub slug: String,
    /// Display name.
    #[serde(default)]
    pub title: String,
    /// Rich text; converted to plain text before storage.
    #[serde(default)]
    pub description: Option<String>,
    /// Stock on hand; defaults to 0.
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub quantity: Option<i64>,
    /// Major currency units; scaled to minor units (x100) for storage.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price: Option<f64>,
    /// Used only when category-taxon creation is enabled.
    #[serde(default, deserialize_with = "de_opt_id")]
    pub category_id: Option<String>,
    /// Used only when producer-taxon creation is enabled.
    #[serde(default, deserialize_with = "de_opt_id")]
    pub producer_id: Option<String>,
}

impl ProductRecord {
    /// A record is importable only when code, slug and name are present.
    pub fn has_mandatory_fields(&self) -> bool {
        !self.ean.is_empty() && !self.slug.is_empty() && !self.title.is_empty()
    }
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Reads and parses the JSON feed. Fatal when the file is unreadable, is not
/// a JSON array of records, or parses to an empty list.
pub fn read_records(path: &Path) -> Result<Vec<ProductRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("unable to read feed file {}", path.display()))?;
    let records: Vec<ProductRecord> =
        serde_json::from_str(&raw).context("feed is not a JSON array of product records")?;
    if records.is_empty() {
        bail!("the feed is empty or does not contain valid non-empty JSON");
    }
    Ok(records)
}
