// ============================================================================
// retouch CLI — headless one-shot processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   retouch -i photo.jpg -o out.png --brightness 20 --gamma 1.4
//   retouch -i portrait.png -o fixed.jpg --filter red-eye --eye-level 80
//   retouch -i scan.bmp --params preset.json --filter grayscale --filter sharpen
//
// Pipeline: load → basic adjustments → colour adjustments → each --filter in
// the order given (accumulating) → save. Everything runs synchronously on
// the current thread; per-row work still fans out over rayon.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::error::EditorResult;
use crate::io::{DEFAULT_JPEG_QUALITY, SaveFormat};
use crate::ops::adjustments::apply_family;
use crate::ops::effects::apply_filter;
use crate::params::{AdjustmentFamily, EffectKind, EffectParams};
use crate::scheduler::CancelToken;
use crate::session::Session;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// retouch headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "retouch",
    version,
    about = "Apply tone, colour and filter effects to an image without a UI",
    long_about = "Load an image, apply adjustments and filters, and save the result.\n\
                  Reads JPEG, PNG, BMP, GIF and TIFF; writes PNG, JPEG and BMP.\n\n\
                  Example:\n  \
                  retouch -i photo.jpg -o out.png --contrast 15 --filter sharpen"
)]
pub struct CliArgs {
    /// Input image.
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output path. Defaults to `<input stem>_out.<format>` next to the input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// JSON preset of effect parameters. Explicit flags override it.
    #[arg(long, value_name = "PRESET.json")]
    pub params: Option<PathBuf>,

    /// Brightness, -100..100.
    #[arg(long, allow_hyphen_values = true)]
    pub brightness: Option<f32>,

    /// Contrast, -100..100.
    #[arg(long, allow_hyphen_values = true)]
    pub contrast: Option<f32>,

    /// Gamma, 0.1..3.0.
    #[arg(long)]
    pub gamma: Option<f32>,

    /// Saturation, -100..100.
    #[arg(long, allow_hyphen_values = true)]
    pub saturation: Option<f32>,

    /// Hue rotation in degrees, -180..180.
    #[arg(long, allow_hyphen_values = true)]
    pub hue: Option<f32>,

    /// Red channel offset, -100..100.
    #[arg(long, allow_hyphen_values = true)]
    pub red: Option<f32>,

    /// Green channel offset, -100..100.
    #[arg(long, allow_hyphen_values = true)]
    pub green: Option<f32>,

    /// Blue channel offset, -100..100.
    #[arg(long, allow_hyphen_values = true)]
    pub blue: Option<f32>,

    /// Filter to apply; repeat to chain. grayscale, sepia, negative, blur,
    /// sharpen, median, sobel, laplacian, emboss, box-blur, red-eye,
    /// green-eye, blue-eye.
    #[arg(long = "filter", value_name = "NAME")]
    pub filters: Vec<EffectKind>,

    /// Gaussian blur sigma, 0.1..50.
    #[arg(long)]
    pub blur_sigma: Option<f32>,

    /// Sharpen amount, 0..5.
    #[arg(long)]
    pub sharpen_amount: Option<f32>,

    /// Median filter radius, 1..10.
    #[arg(long)]
    pub median_radius: Option<i32>,

    /// Box blur radius, 1..20.
    #[arg(long)]
    pub box_radius: Option<i32>,

    /// Eye-reduction threshold for every colour, 100..255.
    #[arg(long)]
    pub eye_threshold: Option<i32>,

    /// Eye-reduction level for every colour, 0..100.
    #[arg(long)]
    pub eye_level: Option<i32>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, value_name = "1-100")]
    pub quality: u8,

    /// Output format: png, jpeg, bmp. Inferred from --output when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Log pipeline steps to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a session log (truncated each run) to the platform data folder
    /// instead of stderr.
    #[arg(long)]
    pub log_file: bool,
}

impl CliArgs {
    /// Preset (if any) with explicit flags layered on top.
    pub fn effect_params(&self) -> Result<EffectParams, String> {
        let mut p = match &self.params {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("could not read preset '{}': {}", path.display(), e))?;
                EffectParams::from_json(&text)
                    .map_err(|e| format!("invalid preset '{}': {}", path.display(), e))?
            }
            None => EffectParams::default(),
        };

        let overrides: [(Option<f32>, &mut f32); 10] = [
            (self.brightness, &mut p.brightness),
            (self.contrast, &mut p.contrast),
            (self.gamma, &mut p.gamma),
            (self.saturation, &mut p.saturation),
            (self.hue, &mut p.hue),
            (self.red, &mut p.red),
            (self.green, &mut p.green),
            (self.blue, &mut p.blue),
            (self.blur_sigma, &mut p.blur_sigma),
            (self.sharpen_amount, &mut p.sharpen_amount),
        ];
        for (flag, slot) in overrides {
            if let Some(v) = flag {
                *slot = v;
            }
        }
        if let Some(r) = self.median_radius {
            p.median_radius = r;
        }
        if let Some(r) = self.box_radius {
            p.box_radius = r;
        }
        for eye in [&mut p.red_eye, &mut p.green_eye, &mut p.blue_eye] {
            if let Some(t) = self.eye_threshold {
                eye.threshold = t;
            }
            if let Some(l) = self.eye_level {
                eye.level = l;
            }
        }
        Ok(p)
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the pipeline and return an OS exit code.
/// `0` = success, `1` = any failure.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();

    let params = match args.effect_params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let format = parse_format(args.format.as_deref(), args.output.as_deref());
    let output = build_output_path(&args.input, args.output.as_deref(), format);

    match process(&args.input, &output, &params, &args.filters, format, args.quality) {
        Ok(()) => {
            if args.verbose {
                println!(
                    "{} → {} ({:.0}ms)",
                    args.input.display(),
                    output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Processing pipeline
// ============================================================================

/// Load, apply, save. Library entry point for one-shot processing.
pub fn process(
    input: &Path,
    output: &Path,
    params: &EffectParams,
    filters: &[EffectKind],
    format: SaveFormat,
    quality: u8,
) -> EditorResult<()> {
    // -- Step 1: Load ----------------------------------------------------
    let mut session = Session::load(input)?;
    let token = CancelToken::never();

    // -- Step 2: Adjustments (only non-neutral steps run) -----------------
    apply_family(session.working_mut(), params, AdjustmentFamily::Basic, &token)?;
    apply_family(session.working_mut(), params, AdjustmentFamily::Color, &token)?;

    // -- Step 3: Filters, accumulating -----------------------------------
    for &kind in filters {
        tracing::debug!(%kind, "applying filter");
        apply_filter(session.working_mut(), kind, params)?;
    }

    // -- Step 4: Save ----------------------------------------------------
    session.save(output, format, quality)
}

// ============================================================================
// Helpers
// ============================================================================

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f).unwrap_or_default();
    }
    output.map(SaveFormat::from_path).unwrap_or_default()
}

/// Explicit `--output`, otherwise `<stem>_out.<ext>` beside the input.
fn build_output_path(input: &Path, output: Option<&Path>, format: SaveFormat) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}_out.{}", stem, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::io::encode_and_write;
    use crate::ops::filters;
    use crate::raster::testing::pattern;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("retouch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_parse_with_negative_values_and_repeated_filters() {
        let args = parse(&[
            "-i", "in.png", "--brightness", "-20", "--filter", "grayscale", "--filter", "box-blur",
        ]);
        assert_eq!(args.brightness, Some(-20.0));
        assert_eq!(args.filters, vec![EffectKind::Grayscale, EffectKind::BoxBlur]);
        assert_eq!(args.quality, 90);
        assert!(!args.log_file);
        assert!(parse(&["-i", "in.png", "--log-file"]).log_file);
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let parsed = CliArgs::try_parse_from(["retouch", "-i", "x.png", "--filter", "posterize"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn flags_override_preset() {
        let dir = tempfile::tempdir().unwrap();
        let preset = dir.path().join("preset.json");
        std::fs::write(&preset, r#"{ "brightness": 10, "gamma": 2.0 }"#).unwrap();
        let preset_arg = preset.to_string_lossy().into_owned();
        let args = parse(&["-i", "in.png", "--params", &preset_arg, "--gamma", "0.5", "--eye-level", "70"]);
        let p = args.effect_params().unwrap();
        assert_eq!(p.brightness, 10.0);
        assert_eq!(p.gamma, 0.5);
        assert_eq!(p.green_eye.level, 70);
        assert_eq!(p.red_eye.threshold, 150);
    }

    #[test]
    fn output_path_defaults_beside_input() {
        assert_eq!(
            build_output_path(Path::new("shots/a.jpg"), None, SaveFormat::Png),
            PathBuf::from("shots/a_out.png")
        );
        assert_eq!(parse_format(Some("JPEG"), None), SaveFormat::Jpeg);
        assert_eq!(parse_format(None, Some(Path::new("x.bmp"))), SaveFormat::Bmp);
    }

    #[test]
    fn pipeline_accumulates_filters_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        encode_and_write(&pattern(10, 6), &input, SaveFormat::Png, 90).unwrap();

        let chain = [EffectKind::Grayscale, EffectKind::Negative];
        process(&input, &output, &EffectParams::default(), &chain, SaveFormat::Png, 90).unwrap();

        let mut expected = pattern(10, 6);
        filters::grayscale(&mut expected).unwrap();
        filters::negative(&mut expected).unwrap();
        assert_eq!(crate::io::load_image(&output).unwrap(), expected);
    }

    #[test]
    fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = process(
            &dir.path().join("absent.png"),
            &dir.path().join("out.png"),
            &EffectParams::default(),
            &[],
            SaveFormat::Png,
            90,
        );
        assert!(matches!(result, Err(EditorError::LoadFailed(_))));
    }
}
