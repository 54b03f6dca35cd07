//! Configuration types for background replacement operations

use crate::error::{BgSwapError, Result};
use serde::{Deserialize, Serialize};

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG, lossless (the composite is opaque, so no alpha is carried)
    Png,
    /// JPEG with configurable quality
    Jpeg,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl OutputFormat {
    /// File extension for the format
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Options controlling matte extraction and trimap refinement
///
/// The two thresholds partition the initial alpha estimate into
/// definite-foreground, definite-background and an uncertain band; the band
/// is where sub-pixel alpha gets solved. `erode_size` shrinks both definite
/// regions before solving, widening the band. Larger values produce cleaner
/// but tighter edges and risk eroding thin features (hair, fingers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatteOptions {
    /// Apply trimap-based alpha matting after initial segmentation
    pub refine: bool,

    /// Alpha value above which a pixel is definitely foreground (0-255)
    pub foreground_threshold: u8,

    /// Alpha value below which a pixel is definitely background (0-255)
    pub background_threshold: u8,

    /// Structuring-element radius for eroding the definite regions
    pub erode_size: u32,
}

impl Default for MatteOptions {
    fn default() -> Self {
        Self {
            refine: true,
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

impl MatteOptions {
    /// Create a new options builder
    #[must_use]
    pub fn builder() -> MatteOptionsBuilder {
        MatteOptionsBuilder::default()
    }

    /// Validate option consistency
    ///
    /// # Errors
    /// - `background_threshold` not strictly below `foreground_threshold`
    pub fn validate(&self) -> Result<()> {
        if self.background_threshold >= self.foreground_threshold {
            return Err(BgSwapError::config_value_error(
                "background_threshold",
                self.background_threshold,
                &format!("0-{}", self.foreground_threshold.saturating_sub(1)),
            ));
        }
        Ok(())
    }
}

/// Builder for `MatteOptions`
#[derive(Debug, Default)]
pub struct MatteOptionsBuilder {
    options: MatteOptions,
}

impl MatteOptionsBuilder {
    /// Enable or disable trimap refinement
    #[must_use]
    pub fn refine(mut self, refine: bool) -> Self {
        self.options.refine = refine;
        self
    }

    /// Set the definite-foreground threshold
    #[must_use]
    pub fn foreground_threshold(mut self, threshold: u8) -> Self {
        self.options.foreground_threshold = threshold;
        self
    }

    /// Set the definite-background threshold
    #[must_use]
    pub fn background_threshold(mut self, threshold: u8) -> Self {
        self.options.background_threshold = threshold;
        self
    }

    /// Set the erosion radius applied to both definite regions
    #[must_use]
    pub fn erode_size(mut self, size: u32) -> Self {
        self.options.erode_size = size;
        self
    }

    /// Build the options, validating consistency
    ///
    /// # Errors
    /// - `background_threshold` not strictly below `foreground_threshold`
    pub fn build(self) -> Result<MatteOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Configuration for a full pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Matte extraction and refinement options
    pub matte: MatteOptions,

    /// Output format for persisted composites
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matte: MatteOptions::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid JPEG quality value (must be 0-100)
    /// - Inconsistent matte thresholds
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(BgSwapError::config_value_error(
                "jpeg_quality",
                self.jpeg_quality,
                "0-100",
            ));
        }
        self.matte.validate()
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set matte options
    #[must_use]
    pub fn matte(mut self, options: MatteOptions) -> Self {
        self.config.matte = options;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Build the configuration, validating all parameters
    ///
    /// # Errors
    /// - Invalid quality values
    /// - Inconsistent matte thresholds
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_observed_values() {
        let options = MatteOptions::default();
        assert!(options.refine);
        assert_eq!(options.foreground_threshold, 240);
        assert_eq!(options.background_threshold, 10);
        assert_eq!(options.erode_size, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_threshold_ordering_enforced() {
        let result = MatteOptions::builder()
            .foreground_threshold(100)
            .background_threshold(100)
            .build();
        assert!(matches!(result, Err(BgSwapError::InvalidConfig(_))));

        let result = MatteOptions::builder()
            .foreground_threshold(10)
            .background_threshold(240)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_erode_size_zero_is_valid() {
        let options = MatteOptions::builder().erode_size(0).build().unwrap();
        assert_eq!(options.erode_size, 0);
    }

    #[test]
    fn test_pipeline_builder() {
        let config = PipelineConfig::builder()
            .output_format(OutputFormat::Jpeg)
            .jpeg_quality(80)
            .matte(MatteOptions::builder().refine(false).build().unwrap())
            .build()
            .unwrap();

        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 80);
        assert!(!config.matte.refine);
    }

    #[test]
    fn test_jpeg_quality_clamped_by_builder() {
        let config = PipelineConfig::builder().jpeg_quality(150).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        let config = PipelineConfig {
            jpeg_quality: 120,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
    }
}
