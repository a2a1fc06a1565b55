use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image::RgbaImage;
use puzzle_pixels::{
    CropConfig, CropRect, PixelFormat, PixelView, PreviewChain, ScaledBuffer, find_crop,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pz_gallery")]
#[command(about = "Run puzzle-pixels crop detection and halving on image files")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(name = "crop")]
    Crop(CropArgs),
    #[command(name = "halve")]
    Halve(HalveArgs),
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, default_value = "out")]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct CropArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value_t = 4.0)]
    max_mse: f64,
    #[arg(long, default_value_t = 2)]
    min_border: usize,
    #[arg(long, default_value_t = 1)]
    min_keep: usize,
}

#[derive(Args, Debug, Clone)]
struct HalveArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value_t = 256)]
    max_width: usize,
    #[arg(long, default_value_t = 256)]
    max_height: usize,
}

#[derive(Debug, Clone, Serialize)]
struct RectDto {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl From<CropRect> for RectDto {
    fn from(r: CropRect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CropReport {
    width: usize,
    height: usize,
    rect: RectDto,
    trimmed: [usize; 4],
    max_mse: f64,
    min_border: usize,
    min_keep: usize,
}

#[derive(Debug, Clone, Serialize)]
struct HalveReport {
    width: usize,
    height: usize,
    max_width: usize,
    max_height: usize,
    level_sizes: Vec<[usize; 2]>,
    policy: &'static str,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Crop(args) => run_crop(args),
        Command::Halve(args) => run_halve(args),
    }
}

fn run_crop(args: CropArgs) -> Result<()> {
    let out_dir = prepare_out(&args.common.out)?;
    let img = load_rgba(&args.common.input)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let view = PixelView::packed(w, h, PixelFormat::Rgba8, img.as_raw())
        .context("constructing pixel view over decoded image")?;

    let cfg = CropConfig {
        max_mse: args.max_mse,
        min_border: args.min_border,
        min_keep: args.min_keep,
    };
    let Some(rect) = find_crop(&view, &cfg) else {
        bail!("input image {} is empty.", args.common.input.display());
    };
    info!(?rect, "crop detected");

    let cropped = image::imageops::crop_imm(
        &img,
        rect.x as u32,
        rect.y as u32,
        rect.width as u32,
        rect.height as u32,
    )
    .to_image();
    save_rgba(out_dir.join("cropped.png"), &cropped)?;

    write_json(
        out_dir.join("crop.json"),
        &CropReport {
            width: w,
            height: h,
            rect: rect.into(),
            trimmed: [
                rect.y,
                h - (rect.y + rect.height),
                rect.x,
                w - (rect.x + rect.width),
            ],
            max_mse: cfg.max_mse,
            min_border: cfg.min_border,
            min_keep: cfg.min_keep,
        },
    )
}

fn run_halve(args: HalveArgs) -> Result<()> {
    let out_dir = prepare_out(&args.common.out)?;
    let img = load_rgba(&args.common.input)?;
    let (w, h) = (img.width() as usize, img.height() as usize);

    let argb = rgba_to_argb(img.as_raw());
    let view = PixelView::packed(w, h, PixelFormat::Argb32, &argb)
        .context("constructing ARGB view over decoded image")?;

    let chain = PreviewChain::build(&view, args.max_width, args.max_height)
        .context("building preview chain")?;
    info!(levels = chain.len(), "preview chain built");

    let mut sizes = Vec::new();
    for (i, level) in chain.levels().iter().enumerate() {
        sizes.push([level.width(), level.height()]);
        save_rgba(out_dir.join(format!("level_{i}.png")), &scaled_to_rgba(level)?)?;
    }

    write_json(
        out_dir.join("meta.json"),
        &HalveReport {
            width: w,
            height: h,
            max_width: args.max_width,
            max_height: args.max_height,
            level_sizes: sizes,
            policy: "2x2 floor-average box filter with drop-odd dimensions",
        },
    )
}

fn prepare_out(out: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;
    Ok(out.to_path_buf())
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    if !path.is_file() {
        bail!("input file not found: {}", path.display());
    }
    let dyn_img =
        image::open(path).with_context(|| format!("opening input image {}", path.display()))?;
    Ok(dyn_img.to_rgba8())
}

/// RGBA bytes -> native-endian `0xAARRGGBB` words.
fn rgba_to_argb(rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let word = u32::from_be_bytes([px[3], px[0], px[1], px[2]]);
        out.extend_from_slice(&word.to_ne_bytes());
    }
    out
}

fn scaled_to_rgba(level: &ScaledBuffer) -> Result<RgbaImage> {
    let mut raw = Vec::with_capacity(level.width() * level.height() * 4);
    for y in 0..level.height() {
        for x in 0..level.width() {
            let word = level
                .pixel(x, y)
                .context("reading pixel inside scaled bounds")?;
            let [a, r, g, b] = word.to_be_bytes();
            raw.extend_from_slice(&[r, g, b, a]);
        }
    }
    RgbaImage::from_raw(level.width() as u32, level.height() as u32, raw)
        .context("constructing RgbaImage from scaled pixels")
}

fn save_rgba(path: PathBuf, img: &RgbaImage) -> Result<()> {
    img.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(&path, bytes).with_context(|| format!("writing json {}", path.display()))
}
