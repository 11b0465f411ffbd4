//! Mini-batch training loop
//!
//! Each epoch reshuffles the training set, runs a training-mode forward pass
//! per mini-batch, takes the mean softmax cross-entropy, backpropagates and
//! applies one optimizer per trainable tensor. Accuracy is measured with
//! inference-mode forward passes.

use crate::config::{validate_config, TrainingConfig};
use crate::dataset::ImageDataset;
use crate::error::{AlexNetError, Result};
use crate::model::Model;
use crate::optimizers::{sgd_for_tensors, Optimizer};
use crate::tensor::Tensor;
use crate::utils::{argmax_rows, softmax_cross_entropy, SimpleRng};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Summary of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f32,
    /// Percent of training examples classified correctly.
    pub training_accuracy: f32,
    pub validation_accuracy: Option<f32>,
    pub elapsed: Duration,
}

impl EpochReport {
    /// `epoch,loss,training_accuracy,validation_accuracy,seconds` (validation may be empty).
    pub fn csv_line(&self) -> String {
        let validation = self
            .validation_accuracy
            .map(|v| v.to_string())
            .unwrap_or_default();
        format!(
            "{},{},{},{},{}",
            self.epoch,
            self.loss,
            self.training_accuracy,
            validation,
            self.elapsed.as_secs_f32()
        )
    }
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {:.6}, {:.2}",
            self.epoch, self.loss, self.training_accuracy
        )?;
        if let Some(validation) = self.validation_accuracy {
            write!(f, ", {:.2}", validation)?;
        }
        Ok(())
    }
}

/// Drives a `Model` through epochs of SGD.
pub struct Trainer {
    config: TrainingConfig,
    optimizers: Vec<Box<dyn Optimizer>>,
    rng: SimpleRng,
}

impl Trainer {
    /// One SGD optimizer (with the configured momentum) per trainable tensor of `model`.
    pub fn new<M: Model>(model: &M, config: TrainingConfig, rng: SimpleRng) -> Result<Self> {
        validate_config(&config)?;
        let optimizers = sgd_for_tensors(
            model.parameter_tensor_count(),
            config.learning_rate,
            config.momentum,
        );
        Ok(Self {
            config,
            optimizers,
            rng,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Forward, loss, backward and update on one batch; returns the mean loss.
    pub fn train_step<M: Model>(&mut self, model: &mut M, images: &Tensor, labels: &[usize]) -> Result<f32> {
        let classes = model.class_count();
        check_labels(labels, classes)?;
        let batch = images.shape().first().copied().unwrap_or(0);
        if batch != labels.len() {
            return Err(AlexNetError::ShapeMismatch {
                expected: batch,
                actual: labels.len(),
            });
        }

        let trace = model.forward_trace(images, true)?;
        let logits = trace.activation(trace.len().saturating_sub(1))?;
        let mut grad_logits = vec![0.0f32; logits.len()];
        let loss = softmax_cross_entropy(logits, labels, classes, &mut grad_logits);

        model.backward(&trace, &grad_logits)?;
        model.apply_gradients(&mut self.optimizers)?;
        Ok(loss)
    }

    /// One pass over `dataset` in shuffled mini-batches; returns the mean loss per example.
    pub fn train_epoch<M: Model>(&mut self, model: &mut M, dataset: &ImageDataset) -> Result<f32> {
        let batches = dataset.shuffled_batches(self.config.batch_size, &mut self.rng);
        let mut total_loss = 0.0f32;
        for indices in &batches {
            let (images, labels) = dataset.batch(indices)?;
            let loss = self.train_step(model, &images, &labels)?;
            total_loss += loss * indices.len() as f32;
            tracing::debug!(batch = indices.len(), loss, "trained batch");
        }
        Ok(total_loss / dataset.len().max(1) as f32)
    }

    /// Train for the configured number of epochs, reporting every `log_every`
    /// epochs and after the last one.
    pub fn fit<M: Model>(
        &mut self,
        model: &mut M,
        train: &ImageDataset,
        validation: Option<&ImageDataset>,
    ) -> Result<Vec<EpochReport>> {
        if let Some(set) = validation {
            if set.class_names() != train.class_names() {
                return Err(AlexNetError::ClassMismatch {
                    expected: train.class_names().to_vec(),
                    actual: set.class_names().to_vec(),
                });
            }
        }
        let mut log = match &self.config.log_path {
            Some(path) => Some(open_log(path)?),
            None => None,
        };

        tracing::info!(
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            learning_rate = self.config.learning_rate,
            momentum = self.config.momentum,
            examples = train.len(),
            "starting training"
        );

        let mut reports = Vec::new();
        for epoch in 1..=self.config.epochs {
            let start = Instant::now();
            let loss = self.train_epoch(model, train)?;

            if epoch % self.config.log_every != 0 && epoch != self.config.epochs {
                continue;
            }

            let training_accuracy = accuracy(model, train, self.config.batch_size)?;
            let validation_accuracy = match validation {
                Some(set) => Some(accuracy(model, set, self.config.batch_size)?),
                None => None,
            };
            let report = EpochReport {
                epoch,
                loss,
                training_accuracy,
                validation_accuracy,
                elapsed: start.elapsed(),
            };
            tracing::info!(%report, "epoch complete");

            if let Some((path, writer)) = log.as_mut() {
                writeln!(writer, "{}", report.csv_line())
                    .and_then(|_| writer.flush())
                    .map_err(|e| AlexNetError::io(path.as_path(), e))?;
            }
            reports.push(report);
        }
        Ok(reports)
    }
}

type LogWriter = (std::path::PathBuf, BufWriter<fs::File>);

fn open_log(path: &Path) -> Result<LogWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AlexNetError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AlexNetError::io(path, e))?;
    Ok((path.to_path_buf(), BufWriter::new(file)))
}

fn check_labels(labels: &[usize], classes: usize) -> Result<()> {
    match labels.iter().find(|&&l| l >= classes) {
        Some(&label) => Err(AlexNetError::LabelOutOfRange { label, classes }),
        None => Ok(()),
    }
}

/// Percent of `dataset` the model classifies correctly in inference mode.
pub fn accuracy<M: Model>(model: &M, dataset: &ImageDataset, batch_size: usize) -> Result<f32> {
    if dataset.is_empty() {
        return Ok(0.0);
    }
    let order: Vec<usize> = (0..dataset.len()).collect();
    let mut correct = 0usize;
    for indices in order.chunks(batch_size.max(1)) {
        let (images, labels) = dataset.batch(indices)?;
        let logits = model.forward(&images, false)?;
        let predicted = argmax_rows(logits.data(), model.class_count());
        correct += predicted
            .iter()
            .zip(&labels)
            .filter(|(p, l)| p == l)
            .count();
    }
    Ok(100.0 * correct as f32 / dataset.len() as f32)
}

/// Losses and wall time of a synthetic benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub losses: Vec<f32>,
    pub elapsed: Duration,
}

/// Train on `batches` all-zero batches labelled 0, logging each loss and the total time.
pub fn run_synthetic_benchmark<M: Model>(
    model: &mut M,
    trainer: &mut Trainer,
    input_shape: &[usize],
    batches: usize,
    batch_size: usize,
) -> Result<BenchmarkReport> {
    let mut shape = vec![batch_size];
    shape.extend_from_slice(input_shape);
    let images = Tensor::zeros(shape);
    let labels = vec![0usize; batch_size];

    tracing::info!(batches, batch_size, "start of training process");
    let start = Instant::now();
    let mut losses = Vec::with_capacity(batches);
    for batch in 0..batches {
        let loss = trainer.train_step(model, &images, &labels)?;
        tracing::info!(batch, loss, "completed batch");
        losses.push(loss);
    }
    let elapsed = start.elapsed();
    tracing::info!(seconds = elapsed.as_secs_f32(), "end of training process");

    Ok(BenchmarkReport { losses, elapsed })
}
