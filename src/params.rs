// ============================================================================
// EFFECT PARAMETERS — ranges, defaults and the current-effect selector
// ============================================================================
//
// Values are never rejected: every consumer clamps through `ParamRange`.
// Adjustment parameters are re-applied from the original on each change;
// filter parameters accumulate onto the working buffer.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Inclusive range with a neutral/default value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Clamp into range. NaN maps to the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Integer-valued parameters (radii, thresholds).
    pub fn clamp_int(&self, value: i32) -> i32 {
        value.clamp(self.min as i32, self.max as i32)
    }
}

pub const BRIGHTNESS: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
pub const CONTRAST: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
pub const GAMMA: ParamRange = ParamRange::new(0.1, 3.0, 1.0);
pub const SATURATION: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
pub const HUE: ParamRange = ParamRange::new(-180.0, 180.0, 0.0);
pub const CHANNEL_OFFSET: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
pub const BLUR_SIGMA: ParamRange = ParamRange::new(0.1, 50.0, 3.0);
pub const SHARPEN_AMOUNT: ParamRange = ParamRange::new(0.0, 5.0, 1.0);
pub const MEDIAN_RADIUS: ParamRange = ParamRange::new(1.0, 10.0, 2.0);
pub const BOX_RADIUS: ParamRange = ParamRange::new(1.0, 20.0, 3.0);
pub const EYE_THRESHOLD: ParamRange = ParamRange::new(100.0, 255.0, 150.0);
pub const EYE_LEVEL: ParamRange = ParamRange::new(0.0, 100.0, 50.0);

/// Gamma within this distance of 1.0 is treated as neutral.
pub const GAMMA_EPSILON: f32 = 0.01;

/// Which colour an eye-reduction pass targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EyeColor {
    Red,
    Green,
    Blue,
}

impl EyeColor {
    pub fn label(self) -> &'static str {
        match self {
            EyeColor::Red => "Red",
            EyeColor::Green => "Green",
            EyeColor::Blue => "Blue",
        }
    }
}

/// Threshold/level pair for one eye-reduction colour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeParams {
    pub threshold: i32,
    pub level: i32,
}

impl Default for EyeParams {
    fn default() -> Self {
        Self {
            threshold: EYE_THRESHOLD.default as i32,
            level: EYE_LEVEL.default as i32,
        }
    }
}

/// The flat set of slider values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    // Basic adjustments
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
    // Colour adjustments
    pub saturation: f32,
    pub hue: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    // Filters
    pub blur_sigma: f32,
    pub sharpen_amount: f32,
    pub median_radius: i32,
    pub box_radius: i32,
    pub red_eye: EyeParams,
    pub green_eye: EyeParams,
    pub blue_eye: EyeParams,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            brightness: BRIGHTNESS.default,
            contrast: CONTRAST.default,
            gamma: GAMMA.default,
            saturation: SATURATION.default,
            hue: HUE.default,
            red: CHANNEL_OFFSET.default,
            green: CHANNEL_OFFSET.default,
            blue: CHANNEL_OFFSET.default,
            blur_sigma: BLUR_SIGMA.default,
            sharpen_amount: SHARPEN_AMOUNT.default,
            median_radius: MEDIAN_RADIUS.default as i32,
            box_radius: BOX_RADIUS.default as i32,
            red_eye: EyeParams::default(),
            green_eye: EyeParams::default(),
            blue_eye: EyeParams::default(),
        }
    }
}

impl EffectParams {
    /// Parse a (possibly partial) JSON preset. Missing keys keep defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn eye(&self, color: EyeColor) -> EyeParams {
        match color {
            EyeColor::Red => self.red_eye,
            EyeColor::Green => self.green_eye,
            EyeColor::Blue => self.blue_eye,
        }
    }

    pub fn eye_mut(&mut self, color: EyeColor) -> &mut EyeParams {
        match color {
            EyeColor::Red => &mut self.red_eye,
            EyeColor::Green => &mut self.green_eye,
            EyeColor::Blue => &mut self.blue_eye,
        }
    }

    /// True when every basic adjustment sits at its neutral value.
    pub fn basic_is_neutral(&self) -> bool {
        self.brightness == BRIGHTNESS.default
            && self.contrast == CONTRAST.default
            && (self.gamma - GAMMA.default).abs() <= GAMMA_EPSILON
    }

    pub fn color_is_neutral(&self) -> bool {
        self.saturation == SATURATION.default
            && self.hue == HUE.default
            && self.red == CHANNEL_OFFSET.default
            && self.green == CHANNEL_OFFSET.default
            && self.blue == CHANNEL_OFFSET.default
    }
}

/// Adjustment parameters come in two families, each re-applied as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdjustmentFamily {
    /// brightness → contrast → gamma
    Basic,
    /// saturation → hue → RGB offset
    Color,
}

// ============================================================================
// EFFECT SELECTOR
// ============================================================================

/// The "current effect" tag. It only decides which recompute path a
/// parameter change takes; it never restricts what may be accumulated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EffectKind {
    #[default]
    None,
    BasicAdjustments,
    ColorAdjustments,
    Grayscale,
    Sepia,
    Negative,
    Blur,
    Sharpen,
    MedianFilter,
    EdgeDetection,
    EdgeDetectionLaplacian,
    Emboss,
    BoxBlur,
    RedEyeReduction,
    GreenEyeReduction,
    BlueEyeReduction,
}

impl EffectKind {
    /// Every discrete filter, in menu order.
    pub const FILTERS: [EffectKind; 13] = [
        EffectKind::Grayscale,
        EffectKind::Sepia,
        EffectKind::Negative,
        EffectKind::Blur,
        EffectKind::Sharpen,
        EffectKind::MedianFilter,
        EffectKind::EdgeDetection,
        EffectKind::EdgeDetectionLaplacian,
        EffectKind::Emboss,
        EffectKind::BoxBlur,
        EffectKind::RedEyeReduction,
        EffectKind::GreenEyeReduction,
        EffectKind::BlueEyeReduction,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            EffectKind::None => "None",
            EffectKind::BasicAdjustments => "Basic Adjustments",
            EffectKind::ColorAdjustments => "Color Adjustments",
            EffectKind::Grayscale => "Grayscale",
            EffectKind::Sepia => "Sepia",
            EffectKind::Negative => "Negative",
            EffectKind::Blur => "Blur",
            EffectKind::Sharpen => "Sharpen",
            EffectKind::MedianFilter => "Median Filter",
            EffectKind::EdgeDetection => "Edge Detection (Sobel)",
            EffectKind::EdgeDetectionLaplacian => "Edge Detection (Laplacian)",
            EffectKind::Emboss => "Emboss",
            EffectKind::BoxBlur => "Box Blur",
            EffectKind::RedEyeReduction => "Red Reduction",
            EffectKind::GreenEyeReduction => "Green Reduction",
            EffectKind::BlueEyeReduction => "Blue Reduction",
        }
    }

    pub fn is_filter(self) -> bool {
        Self::FILTERS.contains(&self)
    }

    pub fn eye_color(self) -> Option<EyeColor> {
        match self {
            EffectKind::RedEyeReduction => Some(EyeColor::Red),
            EffectKind::GreenEyeReduction => Some(EyeColor::Green),
            EffectKind::BlueEyeReduction => Some(EyeColor::Blue),
            _ => None,
        }
    }

    pub fn from_eye_color(color: EyeColor) -> Self {
        match color {
            EyeColor::Red => EffectKind::RedEyeReduction,
            EyeColor::Green => EffectKind::GreenEyeReduction,
            EyeColor::Blue => EffectKind::BlueEyeReduction,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for EffectKind {
    type Err = String;

    /// Accepts the short names used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "grayscale" | "greyscale" | "gray" => EffectKind::Grayscale,
            "sepia" => EffectKind::Sepia,
            "negative" | "invert" => EffectKind::Negative,
            "blur" | "gaussian-blur" => EffectKind::Blur,
            "sharpen" => EffectKind::Sharpen,
            "median" | "median-filter" => EffectKind::MedianFilter,
            "edges" | "sobel" | "edge-detection" => EffectKind::EdgeDetection,
            "laplacian" | "edge-detection-laplacian" => EffectKind::EdgeDetectionLaplacian,
            "emboss" => EffectKind::Emboss,
            "box-blur" | "box" => EffectKind::BoxBlur,
            "red-eye" | "red-reduction" => EffectKind::RedEyeReduction,
            "green-eye" | "green-reduction" => EffectKind::GreenEyeReduction,
            "blue-eye" | "blue-reduction" => EffectKind::BlueEyeReduction,
            other => return Err(format!("unknown filter '{}'", other)),
        };
        Ok(kind)
    }
}
