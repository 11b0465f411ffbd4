//! Labelled images loaded from a class-per-directory tree
//!
//! ```text
//! root/
//!   cat/  a.jpg b.png ...
//!   dog/  c.jpeg ...
//! ```
//!
//! Every subdirectory is one class; labels follow the sorted directory names.
//! Hidden entries and files without an image extension are skipped. Images
//! are resized (bilinear) to the network input size and kept as 0-255 values
//! minus a constant mean, in NHWC order.

use crate::config::TrainingConfig;
use crate::error::{AlexNetError, Result};
use crate::tensor::Tensor;
use crate::utils::SimpleRng;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Order of the colour channels written into the tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// How decoded images are turned into network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetOptions {
    pub image_height: usize,
    pub image_width: usize,
    pub channel_order: ChannelOrder,
    pub pixel_mean: f32,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            image_height: 227,
            image_width: 227,
            channel_order: ChannelOrder::Rgb,
            pixel_mean: 0.0,
        }
    }
}

impl DatasetOptions {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            channel_order: config.channel_order,
            pixel_mean: config.pixel_mean,
            ..Self::default()
        }
    }

    fn pixels_per_image(&self) -> usize {
        self.image_height * self.image_width * 3
    }
}

/// True for `.jpg`, `.jpeg` and `.png` file names (case-insensitive).
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Visible entries of `dir`, sorted by path.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| AlexNetError::io(dir, e))? {
        let path = entry.map_err(|e| AlexNetError::io(dir, e))?.path();
        if !is_hidden(&path) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Decode one image into `[height, width, 3]` values.
pub fn load_image(path: &Path, options: &DatasetOptions) -> Result<Vec<f32>> {
    let decoded = image::open(path).map_err(|source| AlexNetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let resized = image::imageops::resize(
        &decoded.to_rgb8(),
        options.image_width as u32,
        options.image_height as u32,
        FilterType::Triangle,
    );

    let mut values = Vec::with_capacity(options.pixels_per_image());
    for pixel in resized.pixels() {
        let [r, g, b] = pixel.0;
        let ordered = match options.channel_order {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        };
        values.extend(ordered.iter().map(|&v| v as f32 - options.pixel_mean));
    }
    Ok(values)
}

/// In-memory images and labels.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    class_names: Vec<String>,
    images: Tensor,
    labels: Vec<usize>,
}

impl ImageDataset {
    /// Walk `root`, decoding every image of every class directory.
    pub fn load(root: &Path, options: &DatasetOptions) -> Result<Self> {
        let mut class_names = Vec::new();
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for class_dir in sorted_entries(root)? {
            if !class_dir.is_dir() {
                continue;
            }
            let label = class_names.len();
            class_names.push(
                class_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );

            let mut count = 0usize;
            for file in sorted_entries(&class_dir)? {
                if !file.is_file() || !is_image(&file) {
                    continue;
                }
                data.extend(load_image(&file, options)?);
                labels.push(label);
                count += 1;
            }
            tracing::debug!(class = %class_names[label], label, images = count, "loaded class");
        }

        if labels.is_empty() {
            return Err(AlexNetError::EmptyDataset(root.to_path_buf()));
        }

        let images = Tensor::new(
            vec![labels.len(), options.image_height, options.image_width, 3],
            data,
        )?;
        tracing::info!(
            root = %root.display(),
            images = labels.len(),
            classes = class_names.len(),
            "loaded dataset"
        );
        Ok(Self {
            class_names,
            images,
            labels,
        })
    }

    /// Assemble a dataset from an `[N, H, W, C]` tensor and `N` labels.
    pub fn from_parts(images: Tensor, labels: Vec<usize>, class_names: Vec<String>) -> Result<Self> {
        if images.rank() != 4 {
            return Err(AlexNetError::RankMismatch {
                expected: 4,
                actual: images.rank(),
            });
        }
        if images.shape()[0] != labels.len() {
            return Err(AlexNetError::ShapeMismatch {
                expected: images.shape()[0],
                actual: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= class_names.len()) {
            return Err(AlexNetError::LabelOutOfRange {
                label,
                classes: class_names.len(),
            });
        }
        Ok(Self {
            class_names,
            images,
            labels,
        })
    }

    /// Relabel against `class_names` by name, so label `i` means `class_names[i]`.
    ///
    /// Classes of the reference list that this dataset lacks are allowed.
    /// A class of this dataset missing from the reference is an error.
    pub fn with_class_order(mut self, class_names: &[String]) -> Result<Self> {
        let mapping = self
            .class_names
            .iter()
            .map(|name| {
                class_names
                    .iter()
                    .position(|reference| reference == name)
                    .ok_or_else(|| AlexNetError::UnknownClass { name: name.clone() })
            })
            .collect::<Result<Vec<usize>>>()?;
        for label in &mut self.labels {
            *label = mapping[*label];
        }
        self.class_names = class_names.to_vec();
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn images(&self) -> &Tensor {
        &self.images
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Gather the examples at `indices` into one batch.
    pub fn batch(&self, indices: &[usize]) -> Result<(Tensor, Vec<usize>)> {
        let shape = self.images.shape();
        let stride: usize = shape[1..].iter().product();
        let mut data = Vec::with_capacity(indices.len() * stride);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            if i >= self.len() {
                return Err(AlexNetError::ShapeMismatch {
                    expected: self.len(),
                    actual: i + 1,
                });
            }
            data.extend_from_slice(&self.images.data()[i * stride..(i + 1) * stride]);
            labels.push(self.labels[i]);
        }
        let mut batch_shape = shape.to_vec();
        batch_shape[0] = indices.len();
        Ok((Tensor::new(batch_shape, data)?, labels))
    }

    /// Shuffled example indices split into mini-batches (the last may be short).
    pub fn shuffled_batches(&self, batch_size: usize, rng: &mut SimpleRng) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        rng.shuffle(&mut order);
        order
            .chunks(batch_size.max(1))
            .map(<[usize]>::to_vec)
            .collect()
    }
}
