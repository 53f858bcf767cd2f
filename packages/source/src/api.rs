//! Generic JSON API adapter.
//!
//! Each API source's shape (where the item list lives, which fields
//! hold the id/text/timestamp/url) is declared in its
//! [`nightwatch_source_models::SourceRuntimeConfig::extra`] blob rather
//! than hard-coded per endpoint, since the pipeline has no
//! per-provider adapter code the way the reference implementation's
//! per-city Socrata/ArcGIS/CKAN clients did.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nightwatch_source_models::{RawObservation, Source, SourceType};
use serde_json::Value;

use crate::{retry, stable_external_id, SourceAdapter, SourceError};

/// Field-path configuration for one JSON API source, read from
/// `source.config.extra`. All fields are optional; absent fields fall
/// back to sensible defaults (root-level array, derived id, whole
/// object as text).
#[derive(Debug, Clone, Default)]
struct ApiShape {
    items_path: Option<String>,
    id_field: Option<String>,
    text_field: Option<String>,
    published_field: Option<String>,
    url_field: Option<String>,
}

impl ApiShape {
    fn from_config(extra: &serde_json::Map<String, Value>) -> Self {
        Self {
            items_path: extra.get("itemsPath").and_then(Value::as_str).map(String::from),
            id_field: extra.get("idField").and_then(Value::as_str).map(String::from),
            text_field: extra.get("textField").and_then(Value::as_str).map(String::from),
            published_field: extra.get("publishedField").and_then(Value::as_str).map(String::from),
            url_field: extra.get("urlField").and_then(Value::as_str).map(String::from),
        }
    }
}

/// Walks a dot-separated path (`"data.items"`) into a JSON document.
fn walk_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |acc, segment| acc.get(segment))
}

/// Fetches a JSON API endpoint and yields one [`RawObservation`] per
/// item in its configured item list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiAdapter;

#[async_trait]
impl SourceAdapter for ApiAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Api
    }

    async fn fetch(&self, source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<RawObservation>, SourceError> {
        let client = reqwest::Client::new();
        let body = retry::send_json(|| client.get(&source.url)).await?;

        let shape = ApiShape::from_config(&source.config.extra);

        let items: &[Value] = match shape.items_path.as_deref().and_then(|p| walk_path(&body, p)).unwrap_or(&body) {
            Value::Array(items) => items,
            other => {
                return Err(SourceError::Normalization {
                    message: format!("expected a JSON array of items, got {other:?}"),
                });
            }
        };

        let produced_at = Utc::now();
        let mut observations = Vec::with_capacity(items.len());

        for item in items {
            let text_field = shape.text_field.as_deref().unwrap_or("text");
            let Some(raw_text) = item.get(text_field).and_then(Value::as_str).map(str::to_owned) else {
                log::warn!("source={} item missing text field {text_field:?}; skipping", source.name);
                continue;
            };

            let published_at = shape
                .published_field
                .as_deref()
                .and_then(|field| item.get(field))
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            if let (Some(since), Some(published_at)) = (since, published_at) {
                if published_at <= since {
                    continue;
                }
            }

            let source_url = shape
                .url_field
                .as_deref()
                .and_then(|field| item.get(field))
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| source.url.clone());

            let external_id = shape
                .id_field
                .as_deref()
                .and_then(|field| item.get(field))
                .map(|v| v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string()))
                .unwrap_or_else(|| stable_external_id(&[&source_url, &raw_text]));

            observations.push(RawObservation { external_id, source_url, raw_text, published_at, produced_at });
        }

        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::walk_path;
    use serde_json::json;

    #[test]
    fn walk_path_navigates_nested_objects() {
        let doc = json!({ "data": { "items": [1, 2, 3] } });
        assert_eq!(walk_path(&doc, "data.items"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn walk_path_returns_none_for_missing_segment() {
        let doc = json!({ "data": {} });
        assert_eq!(walk_path(&doc, "data.items"), None);
    }
}
