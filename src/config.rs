use crate::{Error, Float, Result};

/// Settings shared by the loader, splitter, model builder and trainer.
///
/// `Config::default()` reproduces the traffic-sign setup: 30x30 images,
/// 43 categories, 10 epochs and 40% of the samples held out for testing.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// width every image is resized to
    pub image_width: u32,
    /// height every image is resized to
    pub image_height: u32,
    /// number of category directories, and of output units
    pub categories: usize,
    pub epochs: usize,
    /// fraction of the samples held out for evaluation
    pub test_size: f64,
    pub batch_size: usize,
    pub learning_rate: Float,
    /// seeds shuffling when set, so that runs are reproducible
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_width: 30,
            image_height: 30,
            categories: 43,
            epochs: 10,
            test_size: 0.4,
            batch_size: 32,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

// two valid 3x3 convolutions and two 2x2 pools need at least 10 pixels per side
const MIN_IMAGE_SIDE: u32 = 10;

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.image_width < MIN_IMAGE_SIDE || self.image_height < MIN_IMAGE_SIDE {
            return Err(Error::InvalidConfig(format!(
                "images must be at least {MIN_IMAGE_SIDE}x{MIN_IMAGE_SIDE}, got {}x{}",
                self.image_width, self.image_height
            )));
        }
        if self.categories < 2 {
            return Err(Error::InvalidConfig(format!(
                "at least 2 categories are required, got {}",
                self.categories
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "test size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
