//! HTML page adapter.
//!
//! Generalizes the reference implementation's `HtmlTableScraper`
//! CSS-selector idiom from tabular extraction to prose extraction: a
//! configured selector (or list of selectors, one per article/post) is
//! used to carve the page into one [`RawObservation`] per matched
//! element. With no selector configured, or when the selector matches
//! nothing, the whole page body is passed through as a single
//! observation — `nightwatch_extraction` is responsible for making
//! sense of raw HTML per spec.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nightwatch_source_models::{RawObservation, Source, SourceType};
use scraper::{Html, Selector};

use crate::{retry, stable_external_id, SourceAdapter, SourceError};

/// Fetches an HTML page and yields one [`RawObservation`] per matched
/// item element, or one for the whole page when no item selector is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlAdapter;

#[async_trait]
impl SourceAdapter for HtmlAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Html
    }

    async fn fetch(&self, source: &Source, _since: Option<DateTime<Utc>>) -> Result<Vec<RawObservation>, SourceError> {
        let client = reqwest::Client::new();
        let body = retry::send_text(|| client.get(&source.url)).await?;
        let produced_at = Utc::now();

        let item_selector = source
            .config
            .extra
            .get("itemSelector")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| Selector::parse(s).ok());

        let link_selector = source
            .config
            .extra
            .get("linkSelector")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| Selector::parse(s).ok());

        let document = Html::parse_document(&body);

        let Some(item_selector) = item_selector else {
            return Ok(vec![RawObservation {
                external_id: stable_external_id(&[&source.url, &body]),
                source_url: source.url.clone(),
                raw_text: body,
                published_at: None,
                produced_at,
            }]);
        };

        let mut observations: Vec<RawObservation> = document
            .select(&item_selector)
            .map(|element| {
                let raw_text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
                let item_url = link_selector
                    .as_ref()
                    .and_then(|sel| element.select(sel).next())
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_owned)
                    .unwrap_or_else(|| source.url.clone());
                let external_id = stable_external_id(&[&item_url, &raw_text]);
                RawObservation { external_id, source_url: item_url, raw_text, published_at: None, produced_at }
            })
            .filter(|obs| !obs.raw_text.is_empty())
            .collect();

        if observations.is_empty() {
            log::warn!("source={} item selector matched nothing, falling back to whole-page body", source.name);
            observations.push(RawObservation {
                external_id: stable_external_id(&[&source.url, &body]),
                source_url: source.url.clone(),
                raw_text: body,
                published_at: None,
                produced_at,
            });
        }

        Ok(observations)
    }
}
