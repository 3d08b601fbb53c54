//! Train the digit classifier on an MNIST subset.
//!
//! Expected files under the data directory (IDX format):
//!   train-images.idx3-ubyte, train-labels.idx1-ubyte,
//!   t10k-images.idx3-ubyte, t10k-labels.idx1-ubyte
//!
//! Writes the sampled (epoch, loss) curve to logs/training_loss.txt and logs
//! the final train/test accuracies.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use convnet::config::{load_config, TrainingConfig};
use convnet::layers::conv::IMAGE_DIM;
use convnet::matrix::ImageBatch;
use convnet::utils::SimpleRng;
use convnet::{accuracy, classify, train};

#[derive(Parser, Debug)]
#[command(
    name = "convnet",
    about = "Train a fixed-shape CNN digit classifier on an MNIST subset"
)]
struct Args {
    /// Hidden layer widths, comma separated (the 3125 input and 10 output
    /// dimensions are appended automatically)
    #[arg(long, value_delimiter = ',', default_value = "800")]
    hidden_dims: Vec<usize>,

    /// Number of full-batch training epochs
    #[arg(long, default_value_t = 200)]
    epochs: usize,

    /// Initial gradient-descent step size
    #[arg(long, default_value_t = 0.8)]
    learning_rate: f64,

    /// Learning-rate decay per epoch
    #[arg(long, default_value_t = 0.003)]
    decay_rate: f64,

    /// Seed for parameter initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON config file; takes precedence over the hyperparameter flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the MNIST IDX files
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Training subset size
    #[arg(long, default_value_t = 800)]
    train_samples: usize,

    /// Testing subset size
    #[arg(long, default_value_t = 200)]
    test_samples: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            load_config(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => TrainingConfig {
            hidden_dims: args.hidden_dims.clone(),
            epochs: args.epochs,
            learning_rate: args.learning_rate,
            decay_rate: args.decay_rate,
            seed: args.seed,
        },
    };
    config.validate()?;
    info!(net_dims = ?config.net_dims(), "network dimensions");

    let train_images = read_idx_images(
        &args.data_dir.join("train-images.idx3-ubyte"),
        args.train_samples,
    )?;
    let train_labels = read_idx_labels(
        &args.data_dir.join("train-labels.idx1-ubyte"),
        args.train_samples,
    )?;
    let test_images = read_idx_images(
        &args.data_dir.join("t10k-images.idx3-ubyte"),
        args.test_samples,
    )?;
    let test_labels = read_idx_labels(
        &args.data_dir.join("t10k-labels.idx1-ubyte"),
        args.test_samples,
    )?;
    info!(
        train = train_labels.len(),
        test = test_labels.len(),
        "dataset loaded"
    );

    let mut rng = SimpleRng::new(config.seed);
    let outcome = train(&train_images, &train_labels, &config, &mut rng)?;

    let train_pred = classify(&train_images, &outcome.model)?;
    let test_pred = classify(&test_images, &outcome.model)?;
    info!(
        "training accuracy: {:.3}%",
        accuracy(&train_pred, &train_labels)
    );
    info!(
        "testing accuracy: {:.3}%",
        accuracy(&test_pred, &test_labels)
    );

    write_loss_curve(&outcome.costs)?;
    Ok(())
}

// IDX headers are big-endian u32 fields.
fn read_be_u32(data: &[u8], offset: &mut usize) -> anyhow::Result<u32> {
    let bytes: [u8; 4] = data
        .get(*offset..*offset + 4)
        .context("truncated IDX header")?
        .try_into()?;
    *offset += 4;
    Ok(u32::from_be_bytes(bytes))
}

/// Read up to `limit` IDX images, normalized to [0, 1].
fn read_idx_images(path: &Path, limit: usize) -> anyhow::Result<ImageBatch> {
    let data = fs::read(path).with_context(|| format!("could not open {}", path.display()))?;
    let mut offset = 0usize;
    let _magic = read_be_u32(&data, &mut offset)?;
    let total = read_be_u32(&data, &mut offset)? as usize;
    let rows = read_be_u32(&data, &mut offset)? as usize;
    let cols = read_be_u32(&data, &mut offset)? as usize;

    if rows != IMAGE_DIM || cols != IMAGE_DIM {
        bail!("unexpected MNIST image shape: {rows}x{cols}");
    }

    let count = limit.min(total);
    let total_bytes = count * rows * cols;
    let Some(pixels) = data.get(offset..offset + total_bytes) else {
        bail!("image file {} is truncated", path.display());
    };

    let normalized = pixels.iter().map(|&b| b as f64 / 255.0).collect();
    Ok(ImageBatch::from_vec(rows, cols, count, normalized)?)
}

/// Read up to `limit` IDX labels (digits 0-9).
fn read_idx_labels(path: &Path, limit: usize) -> anyhow::Result<Vec<usize>> {
    let data = fs::read(path).with_context(|| format!("could not open {}", path.display()))?;
    let mut offset = 0usize;
    let _magic = read_be_u32(&data, &mut offset)?;
    let total = read_be_u32(&data, &mut offset)? as usize;

    let count = limit.min(total);
    let Some(labels) = data.get(offset..offset + count) else {
        bail!("label file {} is truncated", path.display());
    };
    Ok(labels.iter().map(|&b| b as usize).collect())
}

fn write_loss_curve(costs: &[(usize, f64)]) -> anyhow::Result<()> {
    fs::create_dir_all("./logs").context("could not create logs directory")?;
    let file = File::create("./logs/training_loss.txt")?;
    let mut out = BufWriter::new(file);
    for (epoch, loss) in costs {
        writeln!(out, "{epoch},{loss}")?;
    }
    Ok(())
}
