use std::{
    fs::{File, OpenOptions},
    io::Read,
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};

use clap::{Parser, Subcommand};
use lightdeck_core::{
    encode, frame::CHUNK_CHANNELS, frame::CHUNK_HEADER, run_control_loop, AppConfig,
    ControlDispatcher, ControlSource, DrainLoop, DrainSource, Engine, FramePump, FrameSink,
    LightDeckError, LightMode, LoopReport, MidiSource, NullTransport, ReaderSource, WriterSink,
};
use tracing_subscriber::EnvFilter;

fn main() -> lightdeck_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            config,
            device,
            dry_run,
            midi,
            image,
        } => run_live(config.as_deref(), device.as_deref(), dry_run, &midi, image),
        Commands::Frame {
            config,
            spot_gain,
            light_gain,
        } => run_frame(config.as_deref(), spot_gain, light_gain),
        Commands::DumpConfig { output } => dump_config(output.as_deref()),
    }
}

fn run_live(
    config: Option<&Path>,
    device: Option<&Path>,
    dry_run: bool,
    midi: &str,
    image: Option<PathBuf>,
) -> lightdeck_core::Result<()> {
    let mut config = load_config(config)?;
    if let Some(image) = image {
        config.image = Some(image);
        config.render.light_mode = LightMode::Image;
        config.validate()?;
    }
    tracing::info!(fps = config.fixture.fps, mode = ?config.render.light_mode, "starting live mode");

    let engine = Engine::from_config(&config)?;
    let (sink, drain) = open_transport(&config, device, dry_run)?;

    let drain = spawn_loop("drain", move || DrainLoop::new(drain).run())?;
    let pump_engine = engine.clone();
    let pump_config = config.clone();
    let pump = spawn_loop("frame-pump", move || {
        FramePump::new(pump_engine, sink, &pump_config).run()
    })?;

    let mut source = open_midi(midi)?;
    let dispatcher = ControlDispatcher::from_config(&config.control);
    run_control_loop(&mut source, &dispatcher, &engine)?;

    // Shutdown is by process termination; keep driving the fixture until
    // both transport loops have given up.
    for handle in [pump, drain] {
        let report = handle
            .join()
            .map_err(|_| LightDeckError::msg("transport loop panicked"))?;
        tracing::warn!(
            name = report.name,
            iterations = report.iterations,
            "transport loop finished"
        );
    }
    Ok(())
}

fn run_frame(
    config: Option<&Path>,
    spot_gain: f32,
    light_gain: f32,
) -> lightdeck_core::Result<()> {
    let mut config = load_config(config)?;
    if config.render.light_mode == LightMode::Image && config.image.is_none() {
        config.render.light_mode = LightMode::Rest;
    }

    let engine = Engine::from_config(&config)?;
    engine.with_state(|state| {
        state.controls.set_spot_gain(spot_gain);
        state.controls.set_light_gain(light_gain);
    })?;
    let frame = encode(&engine.render_frame()?);

    for chunk in frame.chunks(CHUNK_HEADER + CHUNK_CHANNELS) {
        let line: Vec<String> = chunk.iter().map(|byte| format!("{byte:02x}")).collect();
        println!("{}", line.join(" "));
    }
    Ok(())
}

fn dump_config(output: Option<&Path>) -> lightdeck_core::Result<()> {
    let text = AppConfig::default().to_json_pretty()?;
    match output {
        Some(path) => {
            tracing::info!(?path, "writing default configuration");
            std::fs::write(path, text)?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> lightdeck_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

type Transport = (Box<dyn FrameSink>, Box<dyn DrainSource>);

fn open_transport(
    config: &AppConfig,
    device: Option<&Path>,
    dry_run: bool,
) -> lightdeck_core::Result<Transport> {
    if dry_run {
        tracing::info!("dry run: frames are discarded");
        let null = NullTransport::new(config.fixture.frame_interval());
        return Ok((Box::new(null.clone()), Box::new(null)));
    }

    let path = device.ok_or_else(|| LightDeckError::msg("either --device or --dry-run is required"))?;
    let writer = OpenOptions::new().read(true).write(true).open(path)?;
    let reader = writer.try_clone()?;
    tracing::info!(device = %path.display(), "opened fixture device");
    Ok((
        Box::new(WriterSink::new(writer)),
        Box::new(ReaderSource::new(reader)),
    ))
}

fn open_midi(path: &str) -> lightdeck_core::Result<Box<dyn ControlSource>> {
    let reader: Box<dyn Read + Send> = if path == "-" {
        Box::new(std::io::stdin())
    } else {
        Box::new(File::open(path)?)
    };
    tracing::info!(input = path, "reading MIDI");
    Ok(Box::new(MidiSource::new(reader)))
}

fn spawn_loop<F>(name: &str, body: F) -> lightdeck_core::Result<JoinHandle<LoopReport>>
where
    F: FnOnce() -> LoopReport + Send + 'static,
{
    Ok(thread::Builder::new().name(name.to_string()).spawn(body)?)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live MIDI-driven DMX fixture driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the fixture from live MIDI input.
    Live {
        /// JSON configuration file; built-in defaults otherwise.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Device node of the fixture interface.
        #[arg(short, long, conflicts_with = "dry_run")]
        device: Option<PathBuf>,
        /// Render and pace frames without a fixture attached.
        #[arg(long)]
        dry_run: bool,
        /// Raw MIDI input, `-` for stdin.
        #[arg(short, long, default_value = "-")]
        midi: String,
        /// Picture that colours the lights; switches to image mode.
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Print one encoded frame as hex, one chunk per line.
    Frame {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 0.0)]
        spot_gain: f32,
        #[arg(long, default_value_t = 1.0)]
        light_gain: f32,
    },
    /// Write the default configuration as JSON.
    DumpConfig {
        /// Output path; stdout when omitted.
        output: Option<PathBuf>,
    },
}
