#[cfg(not(all(feature = "streaming", feature = "terminal")))]
fn main() {
    eprintln!(
        "The bgpcm player requires the \"streaming\" and \"terminal\" features. Rebuild with `--features streaming` to enable playback."
    );
}

#[cfg(all(feature = "streaming", feature = "terminal"))]
mod cli {
    use std::io::Write;
    use std::path::PathBuf;
    use std::process::ExitCode;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use bgpcm::config::PlayerConfig;
    use bgpcm::convert::{ChannelMode, RateMode, SampleDepth};
    use bgpcm::decoder::Decoder;
    use bgpcm::display::SCREEN_ROWS;
    use bgpcm::keys::HotKeys;
    use bgpcm::loader::{TrackLoader, TrackSource};
    use bgpcm::playlist::{read_indirect_file, Playlist};
    use bgpcm::registry::{InstanceRegistry, PidFileRegistry};
    use bgpcm::scheduler::{PlaybackScheduler, ThreadTimer};
    use bgpcm::session::Session;
    use bgpcm::terminal::{ConsoleDisplay, TerminalKeys};
    use bgpcm::{HeapAllocator, PlayerError, RodioDevice, Ym2608Adpcm, PROGRAM_NAME};
    use clap::{CommandFactory, Parser};
    use tracing_subscriber::EnvFilter;

    /// Exit code for "not running" on remove and "already running" on start
    const EXIT_NOT_RUNNING: u8 = 1;
    const KEY_POLL: Duration = Duration::from_millis(50);

    #[derive(Parser, Debug)]
    #[command(
        name = "bgpcm",
        version,
        about = "16bit linear PCM background player with lyric overlay",
        long_about = None
    )]
    struct Cli {
        /// Remove the running player
        #[arg(short, long)]
        remove: bool,

        /// Volume (1-15, default 8)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=15))]
        volume: Option<u8>,

        /// 22.05kHz output
        #[arg(short = '2', long)]
        half_rate: bool,

        /// 8bit output
        #[arg(short = '8', long)]
        eight_bit: bool,

        /// Mono output
        #[arg(short, long)]
        mono: bool,

        /// No banner or lyrics on screen
        #[arg(short, long)]
        quiet: bool,

        /// Play tracks in random order
        #[arg(short, long)]
        shuffle: bool,

        /// Read track paths from a playlist file
        #[arg(short, long, value_name = "FILE")]
        indirect: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Track files (.s44 raw PCM, .a44 ADPCM)
        files: Vec<PathBuf>,
    }

    impl Cli {
        fn apply(&self, config: &mut PlayerConfig) {
            if let Some(volume) = self.volume {
                config.volume = volume;
            }
            if self.half_rate {
                config.conversion.rate = RateMode::Half;
            }
            if self.eight_bit {
                config.conversion.depth = SampleDepth::Bits8;
            }
            if self.mono {
                config.conversion.channels = ChannelMode::Mono;
            }
            config.quiet |= self.quiet;
            config.shuffle |= self.shuffle;
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub fn main() -> ExitCode {
        init_tracing();
        match run(Cli::parse()) {
            Ok(code) => code,
            Err(err) => {
                if matches!(err.downcast_ref::<PlayerError>(), Some(PlayerError::Cancelled)) {
                    println!("\r\nCanceled.");
                } else {
                    eprintln!("\r\nerror: {err:#}");
                }
                ExitCode::FAILURE
            }
        }
    }

    fn run(cli: Cli) -> Result<ExitCode> {
        println!(
            "{PROGRAM_NAME} - 16bit linear PCM background player version {}",
            env!("CARGO_PKG_VERSION")
        );

        let registry = PidFileRegistry::in_temp_dir();
        if cli.remove {
            return remove(&registry);
        }

        let mut config = match &cli.config {
            Some(path) => PlayerConfig::load(path)?,
            None => PlayerConfig::default(),
        };
        cli.apply(&mut config);
        config.validate()?;

        let mut paths = cli.files.clone();
        if let Some(list) = &cli.indirect {
            paths.extend(read_indirect_file(list)?);
        }
        if paths.is_empty() {
            Cli::command().print_help()?;
            return Ok(ExitCode::FAILURE);
        }

        if registry.find_running(PROGRAM_NAME)?.is_some() {
            println!("error: {PROGRAM_NAME} is already running.");
            return Ok(ExitCode::from(EXIT_NOT_RUNNING));
        }

        let sources = paths
            .iter()
            .map(TrackSource::from_path)
            .collect::<bgpcm::Result<Vec<_>>>()?;
        Playlist::check_capacity(sources.len())?;

        let allocator = config
            .memory_limit
            .map_or_else(HeapAllocator::unbounded, HeapAllocator::with_limit);
        let device = Arc::new(RodioDevice::open().context("cannot open audio output")?);
        let decoder = Ym2608Adpcm::new();
        Session::preflight(
            &allocator,
            device.as_ref(),
            Some(&decoder as &dyn Decoder),
            &sources,
        )?;

        print_format(&config);

        let keys = TerminalKeys::enable()?;
        let latch = keys.latch();
        let playlist = {
            let mut loader = TrackLoader::new(&config, &allocator, latch.as_ref())
                .with_decoder(Box::new(decoder));
            let mut stdout = std::io::stdout();
            loader.load_all(&sources, &mut |source, progress| {
                let _ = keys.pump(Duration::ZERO);
                let _ = write!(
                    stdout,
                    "\rLoading {}... ({}/{}) [ESC] to cancel.",
                    source.name(),
                    progress.processed,
                    progress.total
                );
                if progress.is_complete() {
                    let _ = write!(stdout, "\rLoaded {}.\x1b[K\r\n", source.name());
                }
                let _ = stdout.flush();
            })?
        };

        let registration = registry.register(PROGRAM_NAME)?;
        print!(
            "{PROGRAM_NAME} background service started. [CTRL]+[P] to pause. [CTRL]+[N] to skip. [Q] to quit.\r\n"
        );

        let display = Arc::new(ConsoleDisplay::new(SCREEN_ROWS)?);
        let scheduler = PlaybackScheduler::new(playlist, &config, device, display, latch.clone())?;
        let session = Session::start(scheduler, Box::new(ThreadTimer::new()), &config)?;

        loop {
            keys.pump(KEY_POLL)?;
            if latch.peek().contains(HotKeys::QUIT) || registration.stop_requested() {
                break;
            }
        }

        let report = session.teardown();
        drop(registration);
        print!(
            "{PROGRAM_NAME} stopped. Released {} tracks ({} bytes).\r\n",
            report.tracks, report.bytes
        );
        Ok(ExitCode::SUCCESS)
    }

    fn remove(registry: &PidFileRegistry) -> Result<ExitCode> {
        match registry.find_running(PROGRAM_NAME)? {
            Some(handle) => {
                registry.teardown(&handle)?;
                println!("removed {PROGRAM_NAME} successfully.");
                Ok(ExitCode::SUCCESS)
            }
            None => {
                println!("{PROGRAM_NAME} is not running.");
                Ok(ExitCode::from(EXIT_NOT_RUNNING))
            }
        }
    }

    fn print_format(config: &PlayerConfig) {
        let format = config.conversion;
        println!(" PCM frequency: {} [Hz]", format.output_rate());
        println!(
            " PCM channels: {}",
            match format.channels {
                ChannelMode::Mono => "mono",
                ChannelMode::Stereo => "stereo",
            }
        );
        println!(" PCM bits: {}", format.bits());
        println!();
    }
}

#[cfg(all(feature = "streaming", feature = "terminal"))]
fn main() -> std::process::ExitCode {
    cli::main()
}
