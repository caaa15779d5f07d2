//! faceaugment CLI - Restore face crops with a GFPGAN ONNX model.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceaugment::{image, AffineMatrix, AlignMode, Config, FaceAugmentor};

/// Restore two aligned face crops with a GFPGAN ONNX model.
#[derive(Parser, Debug)]
#[command(name = "faceaugment")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ONNX model.
    #[arg(long = "model_path", alias = "model-path", value_name = "PATH")]
    model_path: PathBuf,

    /// First face crop.
    #[arg(long = "image_path", alias = "image-path", value_name = "PATH")]
    image_path: PathBuf,

    /// Second face crop. Defaults to the first.
    #[arg(long = "image_path_2", alias = "image-path-2", value_name = "PATH")]
    image_path_2: Option<PathBuf>,

    /// Output path for the first restored face.
    #[arg(long = "save_path", alias = "save-path", default_value = "output.jpg", value_name = "PATH")]
    save_path: PathBuf,

    /// Output path for the second restored face.
    #[arg(long = "save_path_2", alias = "save-path-2", default_value = "test.jpg", value_name = "PATH")]
    save_path_2: PathBuf,

    /// Alignment transform used to crop the first face, as six comma-separated
    /// numbers `a,b,c,d,e,f`. Enables inverse-affine paste-back.
    #[arg(long, value_name = "MATRIX", allow_hyphen_values = true)]
    affine: Option<String>,

    /// Output magnification for affine paste-back.
    #[arg(long, default_value = "2", value_name = "INT")]
    upscale: u32,

    /// Paste the first restored face into this frame and save the result instead.
    #[arg(long, value_name = "PATH")]
    frame: Option<PathBuf>,

    /// Also write the first image's blend mask as a grayscale image.
    #[arg(long = "mask_path", alias = "mask-path", value_name = "PATH")]
    mask_path: Option<PathBuf>,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("faceaugment={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let align = match &args.affine {
        Some(raw) => AlignMode::Affine(
            raw.parse::<AffineMatrix>()
                .with_context(|| format!("Invalid --affine value {raw:?}"))?,
        ),
        None => AlignMode::Direct,
    };

    let config = Config {
        upscale_factor: args.upscale,
        align,
        output_quality: args.quality,
        ..Config::default()
    };

    let mut augmentor =
        FaceAugmentor::open(&args.model_path, config).context("Failed to initialize model")?;
    let quality = augmentor.config().output_quality;

    let first = image::load_image(&args.image_path).context("Failed to read first image")?;

    if let Some(frame_path) = &args.frame {
        let frame = image::load_image(frame_path).context("Failed to read frame")?;
        let pasted = augmentor
            .restore_into_frame(&first, &frame)
            .context("Failed to restore face")?;
        save(&pasted, &args.save_path, quality)?;

        println!(
            "Successfully pasted {} into {} -> {}",
            args.image_path.display(),
            frame_path.display(),
            args.save_path.display()
        );
        return Ok(());
    }

    let second_path = args.image_path_2.as_deref().unwrap_or(&args.image_path);
    let second = image::load_image(second_path).context("Failed to read second image")?;

    let restored = augmentor
        .forward(&first, &second)
        .context("Failed to restore faces")?;

    save(&restored.first, &args.save_path, quality)?;
    save(&restored.second, &args.save_path_2, quality)?;

    if let Some(mask_path) = &args.mask_path {
        image::save_mask(&restored.mask.to_image(), mask_path, quality)
            .context("Failed to save blend mask")?;
    }

    println!(
        "Successfully restored {} -> {}, {} -> {}",
        args.image_path.display(),
        args.save_path.display(),
        second_path.display(),
        args.save_path_2.display()
    );

    Ok(())
}

fn save(img: &::image::RgbImage, path: &Path, quality: u8) -> Result<()> {
    image::save_image(img, path, quality)
        .with_context(|| format!("Failed to save {}", path.display()))
}
