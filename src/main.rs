//! DCGAN for MNIST digit generation
//!
//! Main entry point providing CLI interface for:
//! - Training the DCGAN and writing sample grids (default)
//! - Writing a default configuration file

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dcgan_mnist::{
    data::ImageDataset,
    model::DCGAN,
    training::Trainer,
    utils::Config,
};

/// Train a DCGAN on MNIST and sample digit grids
#[derive(Parser)]
#[command(name = "dcgan_mnist")]
#[command(version = "0.1.0")]
#[command(about = "Train a DCGAN on MNIST digits, saving a sample grid every few epochs")]
struct Cli {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbosity level
    #[arg(short, long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the DCGAN model (default when no subcommand is given)
    Train(TrainArgs),

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },
}

/// Overrides applied on top of the configuration
#[derive(Args, Default)]
struct TrainArgs {
    /// Number of epochs (one mini-batch each)
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Batch size
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Save a sample grid every N epochs (0 disables)
    #[arg(short, long)]
    sample_interval: Option<usize>,

    /// Directory holding the MNIST IDX files
    #[arg(long)]
    data_dir: Option<String>,

    /// Directory for sample grids
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Use GPU if available
    #[arg(long)]
    gpu: bool,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Some(Commands::Init { output }) => init_config(&output),
        Some(Commands::Train(args)) => train_model(cli.config.as_deref(), args),
        None => train_model(cli.config.as_deref(), TrainArgs::default()),
    }
}

/// Build the effective configuration from file and command line
fn load_config(config_path: Option<&str>, args: TrainArgs) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::load(path).with_context(|| format!("failed to read config {}", path))?,
        None => Config::default(),
    };

    let training = &mut config.training;
    if let Some(epochs) = args.epochs {
        training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        training.batch_size = batch_size;
    }
    if let Some(interval) = args.sample_interval {
        training.sample_interval = interval;
    }
    if let Some(output_dir) = args.output_dir {
        training.output_dir = output_dir;
    }
    if args.seed.is_some() {
        training.seed = args.seed;
    }
    if args.gpu {
        training.device = "cuda".to_string();
    }
    if args.progress {
        training.progress = true;
    }
    if let Some(data_dir) = args.data_dir {
        config.data.data_dir = data_dir;
    }

    config.validate()?;
    Ok(config)
}

/// Train the DCGAN model
fn train_model(config_path: Option<&str>, args: TrainArgs) -> Result<()> {
    let config = load_config(config_path, args)?;

    // Determine device
    let device = config.get_device();
    info!("Using device: {:?}", device);

    // Load data
    info!("Loading MNIST from {}", config.data.data_dir);
    let dataset = ImageDataset::load_mnist(&config.data.data_dir)?;
    info!("Loaded {} training images", dataset.len());

    // Create model
    let mut model = DCGAN::with_seed(device, config.training.seed)?;
    info!("Created DCGAN\n{}", model.summary());

    // Train
    let mut trainer = Trainer::new(config.training_config(), &model)?;
    let metrics = trainer.train(&mut model, &dataset)?;

    info!(
        "Training complete. Final G_loss: {:.4}, D_loss: {:.4}",
        metrics.latest_gen_loss().unwrap_or(0.0),
        metrics.latest_disc_loss().unwrap_or(0.0)
    );
    info!("Samples written to {}", config.training.output_dir);

    Ok(())
}

/// Initialize default configuration file
fn init_config(output_path: &str) -> Result<()> {
    Config::default().save(output_path)?;
    info!("Created default configuration at {}", output_path);
    Ok(())
}
