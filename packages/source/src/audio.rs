//! Audio (scanner-feed) adapter.
//!
//! Unlike the interval-polled adapters, an audio source streams
//! continuously: [`AudioAdapter`] consumes fixed-size windows of a
//! live scanner feed rather than making discrete HTTP requests. The
//! scheduler excludes `SourceType::Audio` from `run_cycle` entirely and
//! instead gives each active audio source a dedicated long-lived task
//! via `nightwatch_scheduler::spawn_audio_worker`, which calls
//! [`AudioAdapter::listen`] in a loop. [`SourceAdapter::fetch`] is
//! implemented only so `AudioAdapter` satisfies the same trait as the
//! other three adapters; it is never invoked in practice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nightwatch_source_models::{RawObservation, Source, SourceType};

use crate::{stable_external_id, SourceAdapter, SourceError};

/// Detects whether a fixed-size PCM window contains speech.
///
/// Implementations are injectable (mirroring the geocoder's
/// per-tier-provider abstraction) so a real VAD model can be swapped in
/// without touching the adapter's control flow.
pub trait VoiceActivityDetector: Send + Sync {
    fn is_speech(&self, window: &[i16]) -> bool;
}

/// Transcribes a PCM window that passed voice-activity detection.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SourceError`] if transcription fails.
    async fn transcribe(&self, window: &[i16]) -> Result<String, SourceError>;
}

/// Returns `true` if `text` contains any of `keywords` (case-insensitive).
///
/// The keyword gate runs after transcription and before a window is
/// turned into a [`RawObservation`]; §4.2 expects at least 90% of
/// voice-active windows to be discarded here in a typical scanner feed.
#[must_use]
pub fn keyword_prefilter(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(&keyword.to_lowercase()))
}

/// Consumes fixed-size PCM windows from a scanner feed, discarding
/// non-speech and off-keyword windows, and transcribing the rest into
/// [`RawObservation`]s.
pub struct AudioAdapter<V, T> {
    vad: V,
    transcriber: T,
    keywords: Vec<String>,
}

impl<V, T> AudioAdapter<V, T>
where
    V: VoiceActivityDetector,
    T: Transcriber,
{
    pub const fn new(vad: V, transcriber: T, keywords: Vec<String>) -> Self {
        Self { vad, transcriber, keywords }
    }

    /// Processes one fixed-size PCM window, returning an observation
    /// only if the window passed both the voice-activity and keyword
    /// gates.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if transcription fails on a window that
    /// passed voice-activity detection.
    pub async fn process_window(&self, source: &Source, window: &[i16]) -> Result<Option<RawObservation>, SourceError> {
        if !self.vad.is_speech(window) {
            return Ok(None);
        }

        let raw_text = self.transcriber.transcribe(window).await?;

        if !keyword_prefilter(&raw_text, &self.keywords) {
            return Ok(None);
        }

        let produced_at = Utc::now();
        Ok(Some(RawObservation {
            external_id: stable_external_id(&[&source.url, &produced_at.to_rfc3339(), &raw_text]),
            source_url: source.url.clone(),
            raw_text,
            published_at: Some(produced_at),
            produced_at,
        }))
    }
}

#[async_trait]
impl<V, T> SourceAdapter for AudioAdapter<V, T>
where
    V: VoiceActivityDetector,
    T: Transcriber,
{
    fn source_type(&self) -> SourceType {
        SourceType::Audio
    }

    async fn fetch(&self, _source: &Source, _since: Option<DateTime<Utc>>) -> Result<Vec<RawObservation>, SourceError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::keyword_prefilter;

    #[test]
    fn keyword_prefilter_matches_case_insensitively() {
        let keywords = vec!["shots fired".to_string(), "structure fire".to_string()];
        assert!(keyword_prefilter("Units responding to SHOTS FIRED on Main St", &keywords));
    }

    #[test]
    fn keyword_prefilter_rejects_unrelated_chatter() {
        let keywords = vec!["shots fired".to_string()];
        assert!(!keyword_prefilter("copy that, returning to base", &keywords));
    }
}
