use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use log::{debug, info};

use crate::{
    net::{Activation, EndLayer, Layer, Net},
    trainer::{evaluate, EpochStats, Evaluation, Method, Trainer},
    vol::Vol,
    Config, Error, Float, Result,
};

const CONV_FILTERS: usize = 40;
const HIDDEN_NEURONS: usize = 128;
const DROP_PROB: Float = 0.4;

/// The traffic-sign network: two conv/pool stages followed by dense layers.
pub fn build_net(config: &Config) -> Net {
    let conv = Layer::Conv {
        sx: 3,
        filters: CONV_FILTERS,
        stride: 1,
        padding: 0,
        activation: Activation::Relu,
    };
    let pool = Layer::Pool { sx: 2, stride: 2 };
    let dense = Layer::Dense {
        neurons: HIDDEN_NEURONS,
        activation: Activation::Relu,
    };

    Net::new(
        &[
            Layer::Input {
                width: config.image_width as usize,
                height: config.image_height as usize,
                depth: 3,
            },
            conv,
            pool,
            conv,
            pool,
            dense,
            dense,
            dense,
            Layer::Dropout {
                drop_prob: DROP_PROB,
            },
            dense,
        ],
        EndLayer::Softmax {
            classes: config.categories,
        },
    )
}

/// A freshly initialised net together with the optimizer that trains it.
///
/// The loss is the categorical cross-entropy of the softmax output,
/// the reported metric is accuracy.
pub struct CompiledModel {
    pub net: Net,
    pub trainer: Trainer,
}

pub fn build(config: &Config) -> Result<CompiledModel> {
    config.validate()?;

    let mut net = build_net(config);
    debug!("layer shapes: {:?}", net.layer_shapes());
    info!("built network with {} parameters", net.num_params());

    let trainer = Trainer::builder()
        .learning_rate(config.learning_rate)
        .batch_size(config.batch_size)
        .epochs(config.epochs)
        .method(Method::ADAM)
        .seed(config.seed)
        .build();

    Ok(CompiledModel { net, trainer })
}

impl CompiledModel {
    pub fn fit(&mut self, images: &[Vol], targets: &[Vec<Float>]) -> Result<Vec<EpochStats>> {
        self.trainer.fit(&mut self.net, images, targets)
    }

    pub fn evaluate(&mut self, images: &[Vol], targets: &[Vec<Float>]) -> Result<Evaluation> {
        evaluate(&mut self.net, images, targets)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_model(&self.net, path)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Writes the architecture and weights of `net`.
///
/// Paths ending in `.json` are written as JSON, anything else as bincode.
pub fn save_model(net: &Net, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::io(path, source))?;
    let mut writer = BufWriter::new(file);

    if is_json(path) {
        serde_json::to_writer(&mut writer, net).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
    } else {
        bincode::serialize_into(&mut writer, net).map_err(|source| Error::Bincode {
            path: path.to_path_buf(),
            source,
        })?;
    }

    writer.flush().map_err(|source| Error::io(path, source))
}

/// Reads a net written by [`save_model`].
pub fn load_model(path: &Path) -> Result<Net> {
    let file = File::open(path).map_err(|source| Error::io(path, source))?;
    let reader = BufReader::new(file);

    if is_json(path) {
        serde_json::from_reader(reader).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        bincode::deserialize_from(reader).map_err(|source| Error::Bincode {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, Error, Float, Vol};

    use super::{build, build_net, load_model, save_model};

    fn small_config() -> Config {
        Config {
            image_width: 12,
            image_height: 12,
            categories: 3,
            ..Config::default()
        }
    }

    fn image(config: &Config) -> Vol {
        let (w, h) = (config.image_width, config.image_height);
        let bytes: Vec<u8> = (0..w * h * 3).map(|i| (i * 31 % 256) as u8).collect();
        Vol::from_rgb_image(&bytes, w, h)
    }

    #[test]
    fn traffic_sign_topology() {
        let net = build_net(&Config::default());
        assert_eq!(
            net.layer_shapes(),
            vec![
                (30, 30, 3),
                (28, 28, 40),
                (28, 28, 40),
                (14, 14, 40),
                (12, 12, 40),
                (12, 12, 40),
                (6, 6, 40),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 128),
                (1, 1, 43),
                (1, 1, 43),
            ]
        );
        assert_eq!(net.input_shape(), (30, 30, 3));
        assert_eq!(net.num_classes(), 43);
    }

    #[test]
    fn output_is_a_distribution_over_categories() {
        let config = small_config();
        let mut model = build(&config).unwrap();
        let probabilities = model.net.predict(&image(&config));

        assert_eq!(probabilities.len(), 3);
        let sum: Float = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum is {sum}");
    }

    #[test]
    fn builds_are_independent() {
        let config = small_config();
        let mut a = build(&config).unwrap();
        let mut b = build(&config).unwrap();

        assert_eq!(a.net.layer_shapes(), b.net.layer_shapes());
        assert_eq!(a.net.num_params(), b.net.num_params());
        assert_ne!(
            a.net.params_and_grads()[0].params.to_vec(),
            b.net.params_and_grads()[0].params.to_vec()
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config {
            image_width: 4,
            ..small_config()
        };
        assert!(matches!(build(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn saved_model_predicts_the_same() {
        let config = small_config();
        let temp = tempfile::tempdir().unwrap();

        for name in ["model.bin", "model.json"] {
            let path = temp.path().join(name);
            let mut net = build_net(&config);
            let before = net.predict(&image(&config));

            save_model(&net, &path).unwrap();
            let mut restored = load_model(&path).unwrap();
            let after = restored.predict(&image(&config));

            assert_eq!(restored.layer_shapes(), net.layer_shapes());
            for (a, b) in before.iter().zip(&after) {
                assert!((a - b).abs() < 1e-6, "{name}: {a} != {b}");
            }
        }
    }

    #[test]
    fn loading_garbage_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("model.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(load_model(&path), Err(Error::Json { .. })));

        let missing = temp.path().join("missing.bin");
        assert!(matches!(load_model(&missing), Err(Error::Io { .. })));
    }
}
