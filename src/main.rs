// main.rs - command-line front end for the projection engine

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::DynamicImage;
use panorama_projector::cubemap::{CubeMapGenerator, FaceStrategy};
use panorama_projector::perspective::{self, PerspectiveRenderer};
use panorama_projector::{
    io, AspectPolicy, Panorama, ProjectorConfig, RotationBaker, RotationSpec, ViewSpec,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "panorama-projector")]
#[command(about = "Cube maps, perspective views and rotation baking for equirectangular panoramas")]
#[command(version)]
struct Cli {
    /// JSON config file (default: $PANORAMA_PROJECTOR_CONFIG, then projector.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for pixel loops (0 = all cores).
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// How to treat inputs that are not exactly 2:1.
    #[arg(long, global = true, value_enum)]
    aspect: Option<AspectArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a panorama into six cube faces plus collages.
    Cubemap(CubemapArgs),

    /// Render one perspective view.
    View(ViewArgs),

    /// Render a yaw/pitch grid of perspective views.
    Grid(GridArgs),

    /// Render views evenly spaced around the horizon.
    Equator(EquatorArgs),

    /// Bake a pitch/yaw/roll orientation into a panorama.
    Rotate(RotateArgs),

    /// Bake two panoramas into a shared orientation.
    Align(AlignArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectArg {
    Strict,
    PadTop,
}

impl From<AspectArg> for AspectPolicy {
    fn from(a: AspectArg) -> Self {
        match a {
            AspectArg::Strict => AspectPolicy::Strict,
            AspectArg::PadTop => AspectPolicy::PadTop,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    AxisAligned,
    ViewAligned,
}

impl From<StrategyArg> for FaceStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::AxisAligned => FaceStrategy::AxisAligned,
            StrategyArg::ViewAligned => FaceStrategy::ViewAligned,
        }
    }
}

#[derive(Debug, Args)]
struct CubemapArgs {
    input: PathBuf,

    /// Output directory (default: <input dir>/<stem>_cube_map).
    #[arg(long, short)]
    out: Option<PathBuf>,

    #[arg(long)]
    face_size: Option<u32>,

    #[arg(long)]
    fov: Option<f64>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Gap between faces in collage_border.png.
    #[arg(long)]
    border: Option<u32>,
}

#[derive(Debug, Args)]
struct ViewArgs {
    input: PathBuf,

    /// Output image; format follows the extension.
    #[arg(long, short)]
    out: PathBuf,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    yaw: f64,

    /// Positive values look down.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch: f64,

    #[arg(long, default_value_t = 90.0)]
    fov: f64,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Defaults to the width.
    #[arg(long)]
    height: Option<u32>,

    /// Use the per-pixel reference renderer.
    #[arg(long)]
    scalar: bool,
}

#[derive(Debug, Args)]
struct GridArgs {
    input: PathBuf,

    /// Output directory (default: <input dir>/<stem>_grid).
    #[arg(long, short)]
    out: Option<PathBuf>,

    #[arg(long)]
    h_count: Option<u32>,

    #[arg(long)]
    v_count: Option<u32>,

    #[arg(long)]
    fov: Option<f64>,

    #[arg(long)]
    size: Option<u32>,
}

#[derive(Debug, Args)]
struct EquatorArgs {
    input: PathBuf,

    /// Output directory (default: <input dir>/<stem>_equator).
    #[arg(long, short)]
    out: Option<PathBuf>,

    #[arg(long)]
    count: Option<u32>,

    #[arg(long)]
    fov: Option<f64>,

    #[arg(long)]
    size: Option<u32>,
}

#[derive(Debug, Args)]
struct RotateArgs {
    input: PathBuf,

    /// Output image (default: <stem><suffix><ext> next to the input).
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// 90 is level.
    #[arg(long, default_value_t = 90.0, allow_negative_numbers = true)]
    pitch: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    yaw: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    roll: f64,

    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Debug, Args)]
struct AlignArgs {
    first: PathBuf,

    second: PathBuf,

    /// Orientation of the first panorama.
    #[arg(
        long,
        required = true,
        num_args = 3,
        value_names = ["PITCH", "YAW", "ROLL"],
        allow_negative_numbers = true
    )]
    first_rotation: Vec<f64>,

    /// Orientation of the second panorama.
    #[arg(
        long,
        required = true,
        num_args = 3,
        value_names = ["PITCH", "YAW", "ROLL"],
        allow_negative_numbers = true
    )]
    second_rotation: Vec<f64>,

    #[arg(long)]
    suffix: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = ProjectorConfig::resolve(cli.config.as_deref()).context("loading config")?;
    if let Some(t) = cli.threads {
        cfg.threads = t;
    }
    if let Some(a) = cli.aspect {
        cfg.aspect = a.into();
    }

    match cli.command {
        Commands::Cubemap(args) => run_cubemap(cfg, args),
        Commands::View(args) => run_view(&cfg, args),
        Commands::Grid(args) => run_grid(&cfg, args),
        Commands::Equator(args) => run_equator(&cfg, args),
        Commands::Rotate(args) => run_rotate(&cfg, args),
        Commands::Align(args) => run_align(&cfg, args),
    }
}

fn load(cfg: &ProjectorConfig, input: &Path) -> Result<Panorama> {
    io::open_panorama(input, cfg.aspect)
        .with_context(|| format!("opening panorama {}", input.display()))
}

/// `<input dir>/<stem><suffix>`
fn sibling_dir(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}"))
}

fn run_cubemap(mut cfg: ProjectorConfig, args: CubemapArgs) -> Result<()> {
    if let Some(s) = args.face_size {
        cfg.cube.face_size = s;
    }
    if let Some(f) = args.fov {
        cfg.cube.fov_deg = f;
    }
    if let Some(s) = args.strategy {
        cfg.cube.strategy = s.into();
    }
    if let Some(b) = args.border {
        cfg.cube.border_px = b;
    }

    let pano = load(&cfg, &args.input)?;
    let out = args
        .out
        .unwrap_or_else(|| sibling_dir(&args.input, "_cube_map"));
    let cube = CubeMapGenerator::new(cfg.cube.clone(), cfg.workers())
        .generate(&pano)
        .context("generating cube faces")?;
    let written = cube.save(&out).context("writing cube map")?;
    log::info!("wrote {} files to {}", written.len(), out.display());
    Ok(())
}

fn run_view(cfg: &ProjectorConfig, args: ViewArgs) -> Result<()> {
    let view = ViewSpec::new(
        args.yaw,
        args.pitch,
        args.fov,
        args.width,
        args.height.unwrap_or(args.width),
    );
    let pano = load(cfg, &args.input)?;
    let renderer = PerspectiveRenderer::new(cfg.workers());
    let img = if args.scalar {
        renderer.render_scalar(&pano, &view)
    } else {
        renderer.render(&pano, &view)
    }
    .context("rendering view")?;
    io::write_image(&DynamicImage::ImageRgb8(img), &args.out)?;
    log::info!("wrote {}", args.out.display());
    Ok(())
}

fn run_grid(cfg: &ProjectorConfig, args: GridArgs) -> Result<()> {
    let g = &cfg.grid;
    let pano = load(cfg, &args.input)?;
    let views = PerspectiveRenderer::new(cfg.workers()).generate_grid(
        &pano,
        args.h_count.unwrap_or(g.h_count),
        args.v_count.unwrap_or(g.v_count),
        args.fov.unwrap_or(g.fov_deg),
        args.size.unwrap_or(g.view_size),
    )?;
    let out = args.out.unwrap_or_else(|| sibling_dir(&args.input, "_grid"));
    perspective::save_grid(&views, &out).context("writing grid views")?;
    Ok(())
}

fn run_equator(cfg: &ProjectorConfig, args: EquatorArgs) -> Result<()> {
    let e = &cfg.equator;
    let pano = load(cfg, &args.input)?;
    let views = PerspectiveRenderer::new(cfg.workers()).generate_equator_band(
        &pano,
        args.count.unwrap_or(e.count),
        args.fov.unwrap_or(e.fov_deg),
        args.size.unwrap_or(e.view_size),
    )?;
    let out = args
        .out
        .unwrap_or_else(|| sibling_dir(&args.input, "_equator"));
    perspective::save_equator_band(&views, &out).context("writing equator views")?;
    Ok(())
}

fn baker(cfg: &ProjectorConfig, suffix: Option<String>) -> RotationBaker {
    RotationBaker::new(cfg.workers())
        .with_suffix(suffix.unwrap_or_else(|| cfg.rotation.suffix.clone()))
        .with_aspect(cfg.aspect)
}

fn run_rotate(cfg: &ProjectorConfig, args: RotateArgs) -> Result<()> {
    let spec = RotationSpec::new(args.pitch, args.yaw, args.roll);
    baker(cfg, args.suffix)
        .bake_file(&args.input, &spec, args.out.as_deref())
        .with_context(|| format!("rotating {}", args.input.display()))?;
    Ok(())
}

fn run_align(cfg: &ProjectorConfig, args: AlignArgs) -> Result<()> {
    let first = rotation_arg(&args.first_rotation)?;
    let second = rotation_arg(&args.second_rotation)?;
    let (a, b) = baker(cfg, args.suffix)
        .align_pair_files((&args.first, &first), (&args.second, &second))
        .context("aligning panorama pair")?;
    log::info!("aligned pair written to {} and {}", a.display(), b.display());
    Ok(())
}

fn rotation_arg(values: &[f64]) -> Result<RotationSpec> {
    let angles: [f64; 3] = values
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected PITCH YAW ROLL, got {} values", values.len()))?;
    Ok(RotationSpec::from(angles))
}
