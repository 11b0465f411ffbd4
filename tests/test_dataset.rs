//! Tests for loading labelled images from a directory tree
//!
//! - Class labels follow sorted directory names
//! - Hidden entries and non-image files are skipped
//! - Channel order and mean subtraction
//! - Batching and shuffling
//! - Relabelling a validation tree against the training classes

use alexnet::dataset::{is_image, load_image};
use alexnet::utils::SimpleRng;
use alexnet::{AlexNetError, ChannelOrder, DatasetOptions, ImageDataset};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const RED: [u8; 3] = [200, 10, 30];
const BLUE: [u8; 3] = [20, 40, 250];

fn small_options() -> DatasetOptions {
    DatasetOptions {
        image_height: 8,
        image_width: 8,
        ..DatasetOptions::default()
    }
}

fn write_png(path: &Path, color: [u8; 3], size: u32) {
    RgbImage::from_pixel(size, size, Rgb(color))
        .save(path)
        .expect("failed to write test image");
}

/// `a_cat` holds two red images, `b_dog` one blue image, plus entries to skip.
fn build_tree(root: &Path) {
    let cat = root.join("a_cat");
    let dog = root.join("b_dog");
    let hidden = root.join(".cache");
    for dir in [&cat, &dog, &hidden] {
        fs::create_dir_all(dir).unwrap();
    }

    write_png(&cat.join("one.png"), RED, 16);
    write_png(&cat.join("two.PNG"), RED, 5);
    write_png(&cat.join(".hidden.png"), BLUE, 4);
    fs::write(cat.join("notes.txt"), "not an image").unwrap();
    write_png(&dog.join("rex.png"), BLUE, 12);
    write_png(&hidden.join("ignored.png"), BLUE, 4);
    fs::write(root.join("README.txt"), "top-level file").unwrap();
}

// ============================================================================
// Loading
// ============================================================================

mod load_tests {
    use super::*;

    #[test]
    fn test_labels_follow_sorted_directories() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let data = ImageDataset::load(dir.path(), &small_options()).unwrap();
        assert_eq!(data.class_names(), &["a_cat".to_string(), "b_dog".to_string()]);
        assert_eq!(data.class_count(), 2);
        assert_eq!(data.labels(), &[0, 0, 1]);
        assert_eq!(data.images().shape(), &[3, 8, 8, 3]);
    }

    #[test]
    fn test_rgb_values_are_raw_bytes() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let data = ImageDataset::load(dir.path(), &small_options()).unwrap();
        let stride = 8 * 8 * 3;
        let first = &data.images().data()[..stride];
        assert_eq!(&first[..3], &[200.0, 10.0, 30.0]);
        let last = &data.images().data()[2 * stride..];
        assert_eq!(&last[last.len() - 3..], &[20.0, 40.0, 250.0]);
    }

    #[test]
    fn test_bgr_and_mean_subtraction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("red.png");
        write_png(&path, RED, 10);

        let options = DatasetOptions {
            channel_order: ChannelOrder::Bgr,
            pixel_mean: 117.0,
            ..small_options()
        };
        let values = load_image(&path, &options).unwrap();
        assert_eq!(values.len(), 8 * 8 * 3);
        for pixel in values.chunks_exact(3) {
            assert_eq!(pixel, &[30.0 - 117.0, 10.0 - 117.0, 200.0 - 117.0]);
        }
    }

    #[test]
    fn test_empty_tree_is_an_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty_class")).unwrap();
        fs::write(dir.path().join("empty_class/readme.md"), "nothing").unwrap();

        match ImageDataset::load(dir.path(), &small_options()) {
            Err(AlexNetError::EmptyDataset(path)) => assert_eq!(path, dir.path()),
            other => panic!("expected an empty dataset error, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_corrupt_image_is_an_error() {
        let dir = tempdir().unwrap();
        let class = dir.path().join("broken");
        fs::create_dir_all(&class).unwrap();
        fs::write(class.join("bad.png"), b"definitely not a png").unwrap();

        assert!(matches!(
            ImageDataset::load(dir.path(), &small_options()),
            Err(AlexNetError::Image { .. })
        ));
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            ImageDataset::load(&missing, &small_options()),
            Err(AlexNetError::Io { .. })
        ));
    }

    #[test]
    fn test_image_extensions() {
        assert!(is_image(Path::new("a/b.jpg")));
        assert!(is_image(Path::new("a/b.JPEG")));
        assert!(is_image(Path::new("b.png")));
        assert!(!is_image(Path::new("b.gif")));
        assert!(!is_image(Path::new("png")));
    }
}

// ============================================================================
// Batching
// ============================================================================

mod batch_tests {
    use super::*;

    #[test]
    fn test_batch_gathers_examples() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());
        let data = ImageDataset::load(dir.path(), &small_options()).unwrap();

        let (images, labels) = data.batch(&[2, 0]).unwrap();
        assert_eq!(images.shape(), &[2, 8, 8, 3]);
        assert_eq!(labels, vec![1, 0]);
        assert_eq!(&images.data()[..3], &[20.0, 40.0, 250.0]);

        assert!(data.batch(&[3]).is_err());
    }

    #[test]
    fn test_shuffled_batches_cover_every_example() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());
        let data = ImageDataset::load(dir.path(), &small_options()).unwrap();

        let mut rng = SimpleRng::new(5);
        let batches = data.shuffled_batches(2, &mut rng);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);

        let mut all: Vec<usize> = batches.concat();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);
    }
}

// ============================================================================
// Class alignment
// ============================================================================

mod class_order_tests {
    use super::*;

    fn class_tree(root: &Path, classes: &[&str]) {
        for class in classes {
            let dir = root.join(class);
            fs::create_dir_all(&dir).unwrap();
            write_png(&dir.join("img.png"), RED, 8);
        }
    }

    #[test]
    fn test_validation_labels_follow_training_names() {
        let train_dir = tempdir().unwrap();
        let validation_dir = tempdir().unwrap();
        class_tree(train_dir.path(), &["a", "b", "c"]);
        class_tree(validation_dir.path(), &["b", "c"]);

        let train = ImageDataset::load(train_dir.path(), &small_options()).unwrap();
        let validation = ImageDataset::load(validation_dir.path(), &small_options()).unwrap();
        assert_eq!(validation.labels(), &[0, 1]);

        let aligned = validation.with_class_order(train.class_names()).unwrap();
        assert_eq!(aligned.labels(), &[1, 2]);
        assert_eq!(aligned.class_names(), train.class_names());
        assert_eq!(aligned.class_count(), 3);
    }

    #[test]
    fn test_unknown_validation_class_is_an_error() {
        let train_dir = tempdir().unwrap();
        let validation_dir = tempdir().unwrap();
        class_tree(train_dir.path(), &["a", "b"]);
        class_tree(validation_dir.path(), &["b", "zebra"]);

        let train = ImageDataset::load(train_dir.path(), &small_options()).unwrap();
        let validation = ImageDataset::load(validation_dir.path(), &small_options()).unwrap();

        match validation.with_class_order(train.class_names()) {
            Err(AlexNetError::UnknownClass { name }) => assert_eq!(name, "zebra"),
            other => panic!("expected an unknown class error, got {:?}", other.map(|d| d.len())),
        }
    }
}
