use tracing::warn;

use crate::quantize::QuantizeOptions;

pub const MIN_RESOLUTION: u32 = 20;
pub const MAX_RESOLUTION: u32 = 200;
pub const MIN_COLORS: usize = 2;
pub const MAX_COLORS: usize = 256;

/// Parameters for one blueprint render.
///
/// The pipeline itself does not validate these; [`BlueprintOptions::clamped`]
/// applies the supported ranges for callers that take values from users.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlueprintOptions {
    /// Grid cells per side.
    pub resolution: u32,
    pub max_colors: usize,
    pub merge_limit: Option<usize>,
}

impl Default for BlueprintOptions {
    fn default() -> Self {
        Self {
            resolution: 48,
            max_colors: 16,
            merge_limit: None,
        }
    }
}

impl BlueprintOptions {
    pub fn new(resolution: u32, max_colors: usize) -> Self {
        Self {
            resolution,
            max_colors,
            ..Self::default()
        }
    }

    pub fn with_merge_limit(mut self, limit: Option<usize>) -> Self {
        self.merge_limit = limit;
        self
    }

    /// Pull resolution into [20, 200] and colors into [2, 256].
    pub fn clamped(self) -> Self {
        let resolution = self.resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION);
        let max_colors = self.max_colors.clamp(MIN_COLORS, MAX_COLORS);
        if resolution != self.resolution || max_colors != self.max_colors {
            warn!(
                resolution = self.resolution,
                max_colors = self.max_colors,
                clamped_resolution = resolution,
                clamped_colors = max_colors,
                "options outside supported range"
            );
        }
        Self {
            resolution,
            max_colors,
            ..self
        }
    }

    pub fn quantize(&self) -> QuantizeOptions {
        QuantizeOptions {
            max_colors: self.max_colors,
            merge_limit: self.merge_limit,
        }
    }
}
