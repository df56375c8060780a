use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use wotermark::{OutputFormat, ProcessOptions, WatermarkConfig, WatermarkEngine};

#[derive(Parser)]
#[command(
    name = "wotermark",
    about = "Fit images into an output box and blend a centered watermark onto them",
    version,
    after_help = "Example: wotermark -w logo.png -o out/ --width 1280 --height 720 photo1.jpg photo2.png"
)]
struct Cli {
    /// Input image files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Watermark image file
    #[arg(short, long)]
    watermark: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Width of the output box
    #[arg(long)]
    width: u32,

    /// Height of the output box
    #[arg(long)]
    height: u32,

    /// Watermark height as a percentage of the scaled image height
    #[arg(short, long, default_value = "20")]
    size: f32,

    /// Watermark opacity (0.0-1.0, 0 selects the default of 0.5)
    #[arg(long, default_value = "0.5")]
    opacity: f32,

    /// JPEG output quality (1-100)
    #[arg(short, long, default_value_t = wotermark::DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Suppress all non-error output
    #[arg(short = 'Q', long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = WatermarkConfig {
        output_width: cli.width,
        output_height: cli.height,
        watermark_size: cli.size,
        watermark_opacity: cli.opacity,
    };
    let options = ProcessOptions {
        jpeg_quality: cli.quality,
    };

    let watermark = match std::fs::read(&cli.watermark) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: Failed to read watermark {}: {e}", cli.watermark.display());
            process::exit(1);
        }
    };

    let engine = match WatermarkEngine::new(&watermark, config, options) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        eprintln!("Error: Failed to create output directory: {e}");
        process::exit(1);
    }

    // Unreadable files become empty inputs so they fail as decode errors in place.
    let inputs: Vec<Vec<u8>> = cli
        .inputs
        .iter()
        .map(|path| {
            std::fs::read(path).unwrap_or_else(|e| {
                eprintln!("[FAIL] {}: {e}", path.display());
                Vec::new()
            })
        })
        .collect();

    let mut fail_count = 0u32;
    let mut written = HashSet::new();
    for ((path, bytes), outcome) in cli
        .inputs
        .iter()
        .zip(&inputs)
        .zip(engine.process_batch(&inputs))
    {
        match outcome {
            Ok(image) => {
                let target = output_path(&cli.output, path, image.format, &mut written);
                match std::fs::write(&target, &image.bytes) {
                    Ok(()) => {
                        if !cli.quiet {
                            eprintln!(
                                "[OK] {} -> {} ({}x{})",
                                path.display(),
                                target.display(),
                                image.width,
                                image.height
                            );
                        }
                    }
                    Err(e) => {
                        fail_count += 1;
                        eprintln!("[FAIL] {}: {e}", target.display());
                    }
                }
            }
            Err(failure) => {
                fail_count += 1;
                // read errors were already reported
                if !bytes.is_empty() {
                    eprintln!("[FAIL] {}: {}", path.display(), failure.source);
                }
            }
        }
    }

    if !cli.quiet && cli.inputs.len() > 1 {
        eprintln!();
        eprintln!(
            "[Summary] Processed: {}, Failed: {fail_count} (Total: {})",
            cli.inputs.len() - fail_count as usize,
            cli.inputs.len()
        );
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

/// `out_dir/<stem>.<ext>` where the extension follows the output format.
///
/// When two inputs map to the same name (`a/photo.jpg` and `b/photo.jpg`,
/// or `photo.png` and `photo.gif`), later ones get a `_1`, `_2`, ... suffix.
fn output_path(
    out_dir: &Path,
    input: &Path,
    format: OutputFormat,
    taken: &mut HashSet<PathBuf>,
) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = format.extension();
    let mut candidate = out_dir.join(format!("{stem}.{ext}"));
    let mut n = 1u32;
    while taken.contains(&candidate) {
        candidate = out_dir.join(format!("{stem}_{n}.{ext}"));
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
