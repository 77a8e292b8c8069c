use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::PageboxError;

/// Settings for the extraction decision module and its backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Fall back to OCR when a region has no vector text.
    pub ocr_enabled: bool,
    /// Resolution used to rasterize a region for OCR.
    pub ocr_dpi: f32,
    /// Upper bound for a single OCR call.
    pub ocr_timeout_secs: u64,
    /// Tesseract language code(s), e.g. "eng" or "eng+deu".
    pub ocr_language: String,
    /// Resolution used for full-page renders.
    pub render_dpi: f32,
    pub normalize: NormalizeOptions,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            ocr_enabled: true,
            ocr_dpi: 300.0,
            ocr_timeout_secs: 30,
            ocr_language: "eng".into(),
            render_dpi: 150.0,
            normalize: NormalizeOptions::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }
}

/// Post-processing applied to every extracted string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeOptions {
    /// Unicode NFKC (full-width letters and digits become ASCII).
    pub nfkc: bool,
    /// Em dash, en dash and minus sign become '-'.
    pub unify_dashes: bool,
    /// Replace the OCR confusions "O0", "OO" and "0O" with "0".
    pub ocr_digit_fixups: bool,
    /// Replace '/' with '_'.
    pub slash_to_underscore: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            nfkc: true,
            unify_dashes: true,
            ocr_digit_fixups: false,
            slash_to_underscore: false,
        }
    }
}

/// Load a config file. Missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<ExtractionConfig, PageboxError> {
    let content = std::fs::read_to_string(path).map_err(|e| PageboxError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: ExtractionConfig =
        serde_json::from_str(&content).map_err(|e| PageboxError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config).map_err(|reason| PageboxError::ConfigLoad {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(config)
}

fn validate_config(config: &ExtractionConfig) -> Result<(), String> {
    if !(config.ocr_dpi.is_finite() && config.ocr_dpi > 0.0) {
        return Err(format!("ocr_dpi must be positive, got {}", config.ocr_dpi));
    }
    if !(config.render_dpi.is_finite() && config.render_dpi > 0.0) {
        return Err(format!(
            "render_dpi must be positive, got {}",
            config.render_dpi
        ));
    }
    if config.ocr_timeout_secs == 0 {
        return Err("ocr_timeout_secs must be at least 1".into());
    }
    if config.ocr_language.trim().is_empty() {
        return Err("ocr_language must not be empty".into());
    }
    Ok(())
}
