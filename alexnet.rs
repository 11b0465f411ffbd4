// alexnet.rs
// Command-line entry point for the AlexNet library.
//
//   alexnet train --images DIR [--validation DIR] [--weights DIR] [--config FILE] [--epochs N]
//   alexnet visualize --image FILE [--weights DIR] [--classes N] [--out-dir DIR] [--gap N]
//   alexnet bench [--batches N] [--batch-size N] [--classes N]
//
// Image trees hold one subdirectory per class. Pretrained weight directories
// hold conv1..conv5 `.weights` / `.biases` files of little-endian f32 values.
// Log verbosity follows RUST_LOG (default "info").

use alexnet::alexnet::{INPUT_CHANNELS, INPUT_SIZE};
use alexnet::dataset::load_image;
use alexnet::mosaic::save_mosaic_png;
use alexnet::train::run_synthetic_benchmark;
use alexnet::utils::SimpleRng;
use alexnet::{
    load_config, AlexNet, ChannelOrder, DatasetOptions, ImageDataset, NetworkConfig, Tensor,
    Trainer, TrainingConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alexnet", version, about = "Train and inspect an AlexNet image classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train on a class-per-directory image tree
    Train {
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        validation: Option<PathBuf>,
        /// Directory with pretrained convolution weights
        #[arg(long)]
        weights: Option<PathBuf>,
        /// JSON training configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides the configured epoch count
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Write an activation mosaic PNG for every stage up to pool5
    Visualize {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        weights: Option<PathBuf>,
        #[arg(long, default_value_t = 1000)]
        classes: usize,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 1)]
        gap: usize,
    },
    /// Time training steps on all-zero batches
    Bench {
        #[arg(long, default_value_t = 5)]
        batches: usize,
        #[arg(long, default_value_t = 128)]
        batch_size: usize,
        #[arg(long, default_value_t = 1000)]
        classes: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Train {
            images,
            validation,
            weights,
            config,
            epochs,
        } => train(&images, validation.as_deref(), weights.as_deref(), config.as_deref(), epochs),
        Command::Visualize {
            image,
            weights,
            classes,
            out_dir,
            gap,
        } => visualize(&image, weights.as_deref(), classes, &out_dir, gap),
        Command::Bench {
            batches,
            batch_size,
            classes,
        } => bench(batches, batch_size, classes),
    }
}

fn seeded_rng(config: &TrainingConfig) -> SimpleRng {
    config.seed.map(SimpleRng::new).unwrap_or_else(SimpleRng::from_time)
}

fn build_network(
    network: &NetworkConfig,
    classes: usize,
    weights: Option<&Path>,
    rng: &mut SimpleRng,
) -> Result<AlexNet> {
    let net = match weights {
        Some(dir) => AlexNet::with_pretrained(network, classes, dir, rng)
            .with_context(|| format!("loading pretrained weights from {}", dir.display()))?,
        None => AlexNet::new(network, classes, rng)?,
    };
    Ok(net)
}

fn train(
    images: &Path,
    validation: Option<&Path>,
    weights: Option<&Path>,
    config_path: Option<&Path>,
    epochs: Option<usize>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => load_config(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    if let Some(epochs) = epochs {
        config.epochs = epochs;
    }

    let options = DatasetOptions::from_config(&config);
    let train_set = ImageDataset::load(images, &options)?;
    let validation_set = validation
        .map(|dir| ImageDataset::load(dir, &options)?.with_class_order(train_set.class_names()))
        .transpose()?;

    let mut rng = seeded_rng(&config);
    let mut model = build_network(&config.network, train_set.class_count(), weights, &mut rng)?;
    let mut trainer = Trainer::new(&model, config, rng.fork())?;
    let reports = trainer.fit(&mut model, &train_set, validation_set.as_ref())?;

    if let Some(last) = reports.last() {
        tracing::info!(report = %last, "training finished");
    }
    Ok(())
}

fn visualize(image: &Path, weights: Option<&Path>, classes: usize, out_dir: &Path, gap: usize) -> Result<()> {
    let options = DatasetOptions {
        channel_order: ChannelOrder::Bgr,
        ..DatasetOptions::default()
    };
    let pixels = load_image(image, &options)?;
    let input = Tensor::new(vec![1, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS], pixels)?;

    let mut rng = SimpleRng::from_time();
    let model = build_network(&NetworkConfig::default(), classes, weights, &mut rng)?;

    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for (name, activation) in model.debug_activations(&input)? {
        let path = save_mosaic_png(&activation, &name, out_dir, gap)?;
        tracing::info!(file = %path.display(), "wrote mosaic");
    }
    Ok(())
}

fn bench(batches: usize, batch_size: usize, classes: usize) -> Result<()> {
    let config = TrainingConfig {
        batch_size,
        ..TrainingConfig::default()
    };
    let mut rng = seeded_rng(&config);
    let mut model = AlexNet::new(&config.network, classes, &mut rng)?;
    let mut trainer = Trainer::new(&model, config, rng.fork())?;

    let report = run_synthetic_benchmark(
        &mut model,
        &mut trainer,
        &[INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS],
        batches,
        batch_size,
    )?;
    tracing::info!(
        batches = report.losses.len(),
        seconds = report.elapsed.as_secs_f32(),
        "benchmark finished"
    );
    Ok(())
}
