use std::path::{Path, PathBuf};

use log::info;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    dataset::load_data,
    model::build,
    split::{one_hot, train_test_split},
    trainer::{EpochStats, Evaluation},
    Config, Result,
};

/// What a training run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub history: Vec<EpochStats>,
    pub evaluation: Evaluation,
    /// where the model was written, if an output path was given
    pub saved_to: Option<PathBuf>,
}

/// Loads the images under `data_dir`, trains the network on a random split
/// and evaluates it on the held-out part.
///
/// The trained model is written to `output` when one is given.
pub fn run(config: &Config, data_dir: &Path, output: Option<&Path>) -> Result<RunReport> {
    config.validate()?;

    let dataset = load_data(data_dir, config)?;
    let targets = one_hot(&dataset.labels, dataset.categories)?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let split = train_test_split(dataset.images, targets, config.test_size, &mut rng)?;
    info!(
        "{} training samples, {} test samples",
        split.train_images.len(),
        split.test_images.len()
    );

    let mut model = build(config)?;
    let history = model.fit(&split.train_images, &split.train_labels)?;

    let evaluation = model.evaluate(&split.test_images, &split.test_labels)?;
    println!(
        "{} samples - loss: {:.4} - accuracy: {:.4}",
        evaluation.samples, evaluation.loss, evaluation.accuracy
    );

    let saved_to = match output {
        Some(path) => {
            model.save(path)?;
            println!("Model saved to {}.", path.display());
            Some(path.to_path_buf())
        }
        None => None,
    };

    Ok(RunReport {
        history,
        evaluation,
        saved_to,
    })
}
