use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("category directory {name:?} is not named by an integer label")]
    InvalidLabelName { name: String },
    #[error("category directories {first:?} and {second:?} both name label {label}")]
    DuplicateLabel {
        label: usize,
        first: String,
        second: String,
    },
    #[error("found {found} category directories, but label {missing} is missing; labels must run from 0 without gaps")]
    NonContiguousLabels { found: usize, missing: usize },
    #[error("found {found} category directories but the model expects {expected}")]
    CategoryMismatch { expected: usize, found: usize },
    #[error("no images found under {}", .0.display())]
    EmptyDataset(PathBuf),
    #[error("label {label} is out of range for {categories} categories")]
    LabelOutOfRange { label: usize, categories: usize },
    #[error("{images} images but {labels} labels; every image needs exactly one label")]
    LengthMismatch { images: usize, labels: usize },
    #[error("test size {test_size} splits {samples} samples into {train} train and {test} test samples")]
    InvalidSplit {
        test_size: f64,
        samples: usize,
        train: usize,
        test: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("model file {} could not be encoded or decoded: {source}", .path.display())]
    Bincode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("model file {} could not be encoded or decoded: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn check_lengths(images: usize, labels: usize) -> Result<()> {
        if images != labels {
            return Err(Self::LengthMismatch { images, labels });
        }
        Ok(())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
