pub mod breaker;
pub mod cache;
pub mod client;
pub mod endpoint;
pub mod progress;

pub use breaker::{BreakerSettings, BreakerState, CircuitBreaker, CircuitState};
pub use cache::{CacheStats, TranslationCache};
pub use client::{ClientEvent, Outcome, ResilientClient, RetryPolicy, SegmentTranslation};
pub use endpoint::{GenerateOptions, GenerateRequest, InferenceEndpoint, OllamaEndpoint, RemoteModel};
pub use progress::{JobStatus, NoopSink, ProgressSink, TranslationProgress};

use crate::document::ExtractedPage;
use crate::segmentation::{
    estimate_tokens, Reassembler, Segment, SegmentationConfig, Segmenter, PAGE_BREAK,
};
use crate::utils::{Result, TranslatorError};
use progress::ProgressTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub segment_id: String,
    pub page_number: usize,
    pub original_text: String,
    pub translated_text: String,
    pub model: String,
    /// The segment was kept untranslated after the client gave up.
    pub fallback: bool,
    /// Only the head of the segment was translated after a timeout.
    pub shortened: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTranslation {
    pub segments: Vec<TranslationResult>,
    pub text: String,
}

/// Runs one document through segmentation, translation and reassembly.
pub struct DocumentTranslator {
    client: Arc<ResilientClient>,
    cache: Option<TranslationCache>,
}

impl DocumentTranslator {
    pub fn new(client: Arc<ResilientClient>, cache: Option<TranslationCache>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn cache(&self) -> Option<&TranslationCache> {
        self.cache.as_ref()
    }

    /// Validates a job request before any work is scheduled.
    pub fn check_request(&self, model_id: &str, target_language: &str) -> Result<()> {
        self.client.profile(model_id)?;
        self.client.language(target_language)?;
        Ok(())
    }

    pub async fn translate_pages(
        &self,
        pages: Vec<ExtractedPage>,
        target_language: &str,
        model_id: &str,
        config: &SegmentationConfig,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DocumentTranslation> {
        if pages.is_empty() {
            let error = TranslatorError::Extraction("no pages extracted".to_string());
            ProgressTracker::new(sink).failed(&error.to_string());
            return Err(error);
        }

        let mut ordered = pages;
        ordered.sort_by_key(|p| p.page_number);
        self.translate_extracted(&ordered, target_language, model_id, config, sink, cancel)
            .await
    }

    pub async fn translate_document(
        &self,
        text: &str,
        target_language: &str,
        model_id: &str,
        config: &SegmentationConfig,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DocumentTranslation> {
        let pages: Vec<ExtractedPage> = text
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, page)| ExtractedPage::new(page, i + 1))
            .collect();
        self.translate_extracted(&pages, target_language, model_id, config, sink, cancel)
            .await
    }

    async fn translate_extracted(
        &self,
        pages: &[ExtractedPage],
        target_language: &str,
        model_id: &str,
        config: &SegmentationConfig,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DocumentTranslation> {
        let mut tracker = ProgressTracker::new(sink);

        match self
            .run(pages, target_language, model_id, config, &mut tracker, cancel)
            .await
        {
            Ok(result) => Ok(result),
            Err(TranslatorError::Cancelled) => {
                tracing::info!(model = %model_id, "Translation job cancelled");
                Err(TranslatorError::Cancelled)
            }
            Err(e) => {
                tracing::error!(model = %model_id, error = %e, "Translation job failed");
                tracker.failed(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        pages: &[ExtractedPage],
        target_language: &str,
        model_id: &str,
        config: &SegmentationConfig,
        tracker: &mut ProgressTracker<'_>,
        cancel: &CancellationToken,
    ) -> Result<DocumentTranslation> {
        let profile = self.client.profile(model_id)?;
        let language = self.client.language(target_language)?.clone();
        let segmenter = Segmenter::new(config.clone(), profile.segment_tier())?;
        self.client.ensure_model_available(model_id).await?;

        tracker.preparing(pages.len());

        let segments: Vec<Segment> = pages
            .iter()
            .flat_map(|page| segmenter.segment(&page.text, page.page_number))
            .collect();
        if segments.is_empty() {
            return Err(TranslatorError::NoSegments);
        }

        tracing::info!(
            model = %model_id,
            language = %language.code,
            pages = pages.len(),
            segments = segments.len(),
            estimated_tokens = pages
                .iter()
                .map(|p| estimate_tokens(&p.text, profile.avg_chars_per_token))
                .sum::<usize>(),
            "Starting document translation"
        );
        tracker.start_translating(segments.len());

        let mut results = Vec::with_capacity(segments.len());
        let mut reassembler = Reassembler::default();

        for segment in &segments {
            if cancel.is_cancelled() {
                return Err(TranslatorError::Cancelled);
            }

            let translation = self
                .translate_one(segment, &language.code, model_id)
                .await?;

            results.push(TranslationResult {
                segment_id: segment.id.clone(),
                page_number: segment.page_number,
                original_text: segment.text.clone(),
                translated_text: translation.text.clone(),
                model: model_id.to_string(),
                fallback: translation.outcome == Outcome::Fallback,
                shortened: translation.outcome == Outcome::Shortened,
            });
            reassembler.push(segment, &translation.text);

            tracker.segment_done(segment.page_number, reassembler.text());
        }

        tracker.reassembling();
        let final_text = reassembler.into_text();
        tracker.completed(&final_text);

        let fallbacks = results.iter().filter(|r| r.fallback).count();
        let shortened = results.iter().filter(|r| r.shortened).count();
        tracing::info!(
            model = %model_id,
            segments = results.len(),
            fallbacks,
            shortened,
            "Document translation completed"
        );

        Ok(DocumentTranslation {
            segments: results,
            text: final_text,
        })
    }

    async fn translate_one(
        &self,
        segment: &Segment,
        language_code: &str,
        model_id: &str,
    ) -> Result<SegmentTranslation> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&segment.text, language_code).await {
                return Ok(SegmentTranslation {
                    text: hit,
                    outcome: Outcome::Translated,
                });
            }
        }

        let translation = self
            .client
            .translate(
                &segment.text,
                segment.overlap_context.as_deref(),
                model_id,
                language_code,
            )
            .await?;

        // Fallbacks and shortened retries are partial and must not poison the cache.
        if translation.outcome.is_complete() {
            if let Some(cache) = &self.cache {
                cache
                    .put(&segment.text, language_code, &translation.text)
                    .await;
            }
        }

        Ok(translation)
    }
}
