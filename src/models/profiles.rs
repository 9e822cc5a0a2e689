use crate::segmentation::{SegmentTier, SegmentationConfig};
use crate::utils::{Result, TranslatorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    /// Per-call timeout tier for models of this size.
    pub fn timeout(&self) -> Duration {
        match self {
            SizeClass::Large => Duration::from_secs(300),
            SizeClass::Medium => Duration::from_secs(180),
            SizeClass::Small => Duration::from_secs(120),
        }
    }

    pub fn segment_tier(&self) -> SegmentTier {
        match self {
            SizeClass::Small => SegmentTier::new(5, 1000),
            SizeClass::Medium => SegmentTier::new(8, 2000),
            SizeClass::Large => SegmentTier::new(12, 3000),
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeClass::Small => write!(f, "small"),
            SizeClass::Medium => write!(f, "medium"),
            SizeClass::Large => write!(f, "large"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelProfile {
    pub id: String,
    pub size_class: SizeClass,
    pub max_tokens: usize,
    pub optimal_chunk_size: usize,
    pub overlap_percentage: f32,
    pub avg_chars_per_token: f32,
}

impl ModelProfile {
    pub fn new(
        id: impl Into<String>,
        size_class: SizeClass,
        max_tokens: usize,
        optimal_chunk_size: usize,
        overlap_percentage: f32,
    ) -> Self {
        Self {
            id: id.into(),
            size_class,
            max_tokens,
            optimal_chunk_size,
            overlap_percentage,
            avg_chars_per_token: 4.0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.size_class.timeout()
    }

    /// Size-class tier with the chunk cap bounded by the model's token budget.
    pub fn segment_tier(&self) -> SegmentTier {
        let tier = self.size_class.segment_tier();
        let budget_chars = (self.optimal_chunk_size as f32 * self.avg_chars_per_token) as usize;
        SegmentTier::new(tier.max_sentences, tier.max_chunk_size.min(budget_chars.max(1)))
    }

    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            max_tokens: self.max_tokens,
            optimal_chunk_size: self.optimal_chunk_size,
            overlap_percentage: self.overlap_percentage,
            avg_chars_per_token: self.avg_chars_per_token,
            preserve_markup: true,
            smart_paragraph_detection: true,
            context_window: 200,
            min_segment_length: 20,
        }
    }
}

/// Read-only lookup of model id to profile.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: HashMap<String, ModelProfile>,
}

impl ModelRegistry {
    pub fn new(profiles: impl IntoIterator<Item = ModelProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_profiles())
    }

    /// Built-in catalog extended (or overridden) by configured profiles.
    pub fn with_overrides(overrides: &[ModelProfile]) -> Self {
        let mut registry = Self::builtin();
        for profile in overrides {
            registry.insert(profile.clone());
        }
        registry
    }

    pub fn insert(&mut self, profile: ModelProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn get(&self, model_id: &str) -> Result<&ModelProfile> {
        self.profiles
            .get(model_id)
            .ok_or_else(|| TranslatorError::UnknownModel(model_id.to_string()))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.profiles.contains_key(model_id)
    }

    pub fn list(&self) -> Vec<&ModelProfile> {
        let mut profiles: Vec<&ModelProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_profiles() -> Vec<ModelProfile> {
    vec![
        ModelProfile::new("mistral:latest", SizeClass::Medium, 4096, 3500, 15.0),
        ModelProfile::new("llama2:latest", SizeClass::Small, 2048, 1800, 10.0),
        ModelProfile::new("llama3:70b", SizeClass::Large, 4096, 3000, 10.0),
        ModelProfile::new("llama3:8b", SizeClass::Medium, 2048, 1800, 10.0),
        ModelProfile::new("qwen2.5:14b", SizeClass::Medium, 4096, 3000, 10.0),
        ModelProfile::new("deepseek-r1:32b", SizeClass::Large, 4096, 3000, 10.0),
        ModelProfile::new("llava:34b", SizeClass::Large, 4096, 3000, 10.0),
        ModelProfile::new("llava:13b", SizeClass::Medium, 2048, 1800, 10.0),
    ]
}
