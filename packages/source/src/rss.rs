//! RSS/Atom feed adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nightwatch_source_models::{RawObservation, Source, SourceType};

use crate::{retry, stable_external_id, SourceAdapter, SourceError};

/// Fetches an RSS or Atom feed and yields one [`RawObservation`] per
/// entry, using `feed-rs` so both formats are handled uniformly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RssAdapter;

#[async_trait]
impl SourceAdapter for RssAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }

    async fn fetch(&self, source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<RawObservation>, SourceError> {
        let client = reqwest::Client::new();
        let body = retry::send_text(|| client.get(&source.url)).await?;

        let feed = feed_rs::parser::parse(body.as_bytes())
            .map_err(|e| SourceError::Normalization { message: format!("feed parse failed: {e}") })?;

        let produced_at = Utc::now();
        let mut observations = Vec::with_capacity(feed.entries.len());

        for entry in feed.entries {
            let published_at = entry.published.or(entry.updated);

            if let (Some(since), Some(published_at)) = (since, published_at) {
                if published_at <= since {
                    continue;
                }
            }

            let title = entry.title.as_ref().map(|t| t.content.clone()).unwrap_or_default();
            let summary = entry.summary.as_ref().map(|s| s.content.clone());
            let content = entry.content.as_ref().and_then(|c| c.body.clone());
            let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_else(|| source.url.clone());

            let raw_text = match (title.is_empty(), summary, content) {
                (false, Some(summary), _) => format!("{title}\n\n{summary}"),
                (false, None, Some(content)) => format!("{title}\n\n{content}"),
                (false, None, None) => title.clone(),
                (true, Some(summary), _) => summary,
                (true, None, Some(content)) => content,
                (true, None, None) => {
                    log::warn!("source={} entry id={} had no title, summary, or content; skipping", source.name, entry.id);
                    continue;
                }
            };

            let external_id = if entry.id.is_empty() { stable_external_id(&[&link, &title]) } else { entry.id.clone() };

            observations.push(RawObservation { external_id, source_url: link, raw_text, published_at, produced_at });
        }

        Ok(observations)
    }
}
