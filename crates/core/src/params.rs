//! Generation parameters, submission validation and the resolution catalogue.
//!
//! Parameters are an opaque bag as far as the queue is concerned: only the
//! fields needed for validation and statistics are typed, everything else is
//! carried in [`GenerationParams::extra`] and handed to the generator as-is.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits and defaults
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: u64 = 4000;

/// Default output width when the caller does not specify one.
pub const DEFAULT_WIDTH: u32 = 1280;

/// Default output height when the caller does not specify one.
pub const DEFAULT_HEIGHT: u32 = 720;

/// Smallest accepted frame dimension.
pub const MIN_DIMENSION: u32 = 64;

/// Largest accepted frame dimension.
pub const MAX_DIMENSION: u32 = 4096;

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationParams {
    /// Text prompt describing the video to generate.
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,

    /// Output width in pixels.
    #[serde(default = "default_width")]
    #[validate(range(min = 64, max = 4096))]
    pub width: u32,

    /// Output height in pixels.
    #[serde(default = "default_height")]
    #[validate(range(min = 64, max = 4096))]
    pub height: u32,

    /// Any further generator options (steps, seed, fps, ...), untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationParams {
    /// Build parameters for a prompt with default dimensions.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the output dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Parse and validate a raw JSON request body.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let params: Self = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Malformed generation parameters: {e}")))?;
        validate_params(&params)?;
        Ok(params)
    }

    /// Label used by the per-resolution statistics histogram.
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Validate parameters before a job record is created for them.
pub fn validate_params(params: &GenerationParams) -> Result<(), CoreError> {
    if params.prompt.trim().is_empty() {
        return Err(CoreError::Validation("Missing prompt parameter".to_string()));
    }
    params
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))
}

// ---------------------------------------------------------------------------
// Resolution catalogue
// ---------------------------------------------------------------------------

/// A resolution the generator is known to handle well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupportedResolution {
    pub width: u32,
    pub height: u32,
    pub name: &'static str,
    pub quality: &'static str,
    pub recommended_memory_gb: u32,
}

/// Resolutions offered to clients, largest first.
pub const SUPPORTED_RESOLUTIONS: &[SupportedResolution] = &[
    SupportedResolution {
        width: 1920,
        height: 1080,
        name: "Full HD (1080p)",
        quality: "High",
        recommended_memory_gb: 40,
    },
    SupportedResolution {
        width: 1280,
        height: 720,
        name: "HD (720p)",
        quality: "Good",
        recommended_memory_gb: 24,
    },
    SupportedResolution {
        width: 960,
        height: 544,
        name: "SD (544p)",
        quality: "Medium",
        recommended_memory_gb: 16,
    },
    SupportedResolution {
        width: 720,
        height: 720,
        name: "Square",
        quality: "Good",
        recommended_memory_gb: 20,
    },
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
