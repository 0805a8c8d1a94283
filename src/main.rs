use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use motioncam::{MotionCamConfig, MotionCamOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "motioncam")]
#[command(about = "Motion-triggered still image capture for V4L2 cameras")]
#[command(version)]
#[command(long_about = "Waits on a motion sensor character device and, for every motion \
event, captures a single frame from a V4L2 camera and writes it as a JPEG. \
Runs until SIGINT, SIGTERM or SIGQUIT.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "motioncam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (source locations and thread ids)
    #[arg(short, long, help = "Include source locations and thread ids in log output")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without opening devices")]
    validate_config: bool,

    /// Print effective configuration and exit
    #[arg(long, help = "Print the effective configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - check devices but don't enter the trigger loop
    #[arg(long, help = "Open the sensor and probe the camera, then exit")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = match MotionCamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    info!("Starting motioncam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut orchestrator = MotionCamOrchestrator::new(config).map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    if args.dry_run {
        orchestrator.check_devices().await?;
        println!("✓ Dry run completed successfully - devices available");
        return Ok(());
    }

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Startup failed: {}", e);
        e
    })?;

    info!("Motioncam exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    let log_level = if args.debug {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("motioncam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug || args.verbose)
            .with_file(args.debug || args.verbose)
            .with_line_number(args.debug || args.verbose)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}
