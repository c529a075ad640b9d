use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use chromakey::{
    CompositeRenderer, ImageSequenceSource, KeySettings, PixelProcessor, PngSequenceSurface,
    ProcessorOpts, RendererOpts, RendererState, SettingsStore, TickOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "chromakey", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Key a single PNG.
    Key(KeyArgs),
    /// Print the key color detected from the image corners.
    Detect(DetectArgs),
    /// Print the color at a pixel coordinate.
    Pick(PickArgs),
    /// Key a directory of PNG frames through the renderer.
    Sequence(SequenceArgs),
    /// Print a settings JSON template with keying enabled.
    Settings,
}

#[derive(Parser, Debug)]
struct KeyArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Key settings JSON (camelCase). Defaults are used when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Replace the key color with one detected from the image corners.
    #[arg(long, default_value_t = false)]
    auto: bool,

    /// Dedicated rayon worker threads for the pixel pass.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct DetectArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct PickArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    x: u32,

    #[arg(long)]
    y: u32,
}

#[derive(Parser, Debug)]
struct SequenceArgs {
    /// Directory of input PNG frames, processed in file name order.
    #[arg(long)]
    in_dir: PathBuf,

    /// Directory for keyed PNG frames.
    #[arg(long)]
    out_dir: PathBuf,

    /// Key settings JSON (camelCase). Defaults are used when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Dedicated rayon worker threads for the pixel pass.
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);
    match cli.cmd {
        Command::Key(args) => cmd_key(args),
        Command::Detect(args) => cmd_detect(args),
        Command::Pick(args) => cmd_pick(args),
        Command::Sequence(args) => cmd_sequence(args),
        Command::Settings => cmd_settings(),
    }
}

fn init_logging(level: &str, json: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Settings from `path` (or defaults), forced on: the CLI is only ever asked to key.
fn load_settings(path: Option<&Path>) -> anyhow::Result<KeySettings> {
    let mut settings = match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)
                .with_context(|| format!("read settings '{}'", p.display()))?;
            KeySettings::from_json(&json)
                .with_context(|| format!("parse settings '{}'", p.display()))?
        }
        None => KeySettings::default(),
    };
    settings.set_enabled(true);
    Ok(settings)
}

fn processor_opts(threads: Option<usize>) -> ProcessorOpts {
    ProcessorOpts {
        threads,
        ..ProcessorOpts::default()
    }
}

fn cmd_key(args: KeyArgs) -> anyhow::Result<()> {
    let mut settings = load_settings(args.settings.as_deref())?;
    let mut frame = chromakey::load_frame(&args.in_path)?;
    if args.auto {
        let color = chromakey::detect_key_color(&frame)?;
        tracing::info!(color = %color, "detected key color");
        settings.set_key_color(color);
    }

    let processor = PixelProcessor::new(processor_opts(args.threads))?;
    processor.process_in_place(&mut frame, &settings)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_detect(args: DetectArgs) -> anyhow::Result<()> {
    let frame = chromakey::load_frame(&args.in_path)?;
    let color = chromakey::detect_key_color(&frame)?;
    println!("{color}");
    Ok(())
}

fn cmd_pick(args: PickArgs) -> anyhow::Result<()> {
    let frame = chromakey::load_frame(&args.in_path)?;
    let color = chromakey::pick(&frame, args.x, args.y)?;
    println!("{color}");
    Ok(())
}

fn cmd_sequence(args: SequenceArgs) -> anyhow::Result<()> {
    const SOURCE: &str = "sequence";

    let mut store = SettingsStore::new();
    store.set(SOURCE, load_settings(args.settings.as_deref())?);

    let source = ImageSequenceSource::open(&args.in_dir)?;
    let frames = source.len();
    let surface = PngSequenceSurface::new(&args.out_dir, "frame_");
    let opts = RendererOpts {
        processor: processor_opts(args.threads),
        // Every input file is its own frame; never drop one as unchanged.
        skip_unchanged: false,
    };
    let mut renderer = CompositeRenderer::new(SOURCE, Box::new(surface), opts)?;
    renderer.attach(Box::new(source))?;

    let mut published = 0usize;
    while published < frames {
        match renderer.tick(&store) {
            TickOutcome::Loaded | TickOutcome::Processed | TickOutcome::Passthrough => {
                published += 1;
                if renderer.state() == RendererState::Ready {
                    renderer.play()?;
                }
            }
            TickOutcome::Failed => {
                let msg = renderer
                    .error()
                    .map_or_else(|| "unknown error".to_owned(), ToString::to_string);
                anyhow::bail!("sequence failed after {published} frames: {msg}");
            }
            TickOutcome::NotReady => {}
            other => anyhow::bail!("unexpected renderer outcome {other:?}"),
        }
    }
    let stats = renderer.stats();
    renderer.stop();

    tracing::info!(
        frames = published,
        passthrough = stats.passthrough,
        "sequence complete"
    );
    eprintln!("wrote {published} frames to {}", args.out_dir.display());
    Ok(())
}

fn cmd_settings() -> anyhow::Result<()> {
    println!("{}", KeySettings::enabled_default().to_json_pretty()?);
    Ok(())
}
