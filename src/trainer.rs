use log::{debug, info};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{net::Net, utils::argmax, utils::zeros, vol::Vol, Error, Float, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    Sgd {
        momentum: Float,
    },
    Adam {
        eps: Float,
        beta1: Float,
        beta2: Float,
    },
}

impl Method {
    /// Adam with the usual moment decay rates.
    pub const ADAM: Method = Method::Adam {
        eps: 1e-7,
        beta1: 0.9,
        beta2: 0.999,
    };
}

/// Mean loss and accuracy over one pass of the training samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: Float,
    pub accuracy: Float,
}

/// Mean loss and accuracy on held-out samples, with dropout disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub samples: usize,
    pub loss: Float,
    pub accuracy: Float,
}

pub struct Trainer {
    learning_rate: Float,
    batch_size: usize,
    epochs: usize,
    method: Method,

    rng: StdRng,

    /// samples seen since the last parameter update
    pending: usize,
    /// number of parameter updates so far
    step: i32,

    // first moment (adam) or last update (momentum) per parameter set
    gsum: Vec<Vec<Float>>,

    // second moment, only used by adam
    xsum: Vec<Vec<Float>>,

    // receives the gradient wrt the input, which training discards
    scratch: Option<Vol>,
}

impl Trainer {
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::new()
    }

    /// Trains on a single sample and returns its loss.
    ///
    /// Gradients accumulate, the parameters are updated once every `batch_size` samples.
    pub fn train(&mut self, net: &mut Net, x: &Vol, target: &[Float]) -> Float {
        let (loss, _) = self.train_sample(net, x, target);
        loss
    }

    fn train_sample(&mut self, net: &mut Net, x: &Vol, target: &[Float]) -> (Float, bool) {
        let correct = {
            let out = net.forward(x, true);
            argmax(&out.w) == argmax(target)
        };

        let (sx, sy, depth) = x.shape();
        let mut scratch = self
            .scratch
            .take()
            .filter(|scratch| scratch.shape() == (sx, sy, depth))
            .unwrap_or_else(|| Vol::zeros(sx, sy, depth));
        let loss = net.backward(target, &mut scratch);
        self.scratch = Some(scratch);

        self.pending += 1;
        if self.pending == self.batch_size {
            self.flush(net);
        }

        (loss, correct)
    }

    /// Applies the gradients of a partially filled batch, if any.
    pub fn flush(&mut self, net: &mut Net) {
        if self.pending == 0 {
            return;
        }
        let batch_size = self.pending as Float;
        self.pending = 0;
        self.step += 1;

        let mut pg_list = net.params_and_grads();

        // initialize lists for accumulators. Will only be done once on first update
        if self.gsum.is_empty() {
            for pg in &pg_list {
                self.gsum.push(zeros(pg.params.len()));
                if matches!(self.method, Method::Adam { .. }) {
                    self.xsum.push(zeros(pg.params.len()));
                } else {
                    self.xsum.push(Vec::new()); // conserve memory
                }
            }
        }

        // perform an update for all sets of weights
        for (i, pg) in pg_list.iter_mut().enumerate() {
            let gsumi = &mut self.gsum[i];
            let xsumi = &mut self.xsum[i];

            for j in 0..pg.params.len() {
                let gij = pg.grads[j] / batch_size; // raw batch gradient

                match self.method {
                    Method::Adam { eps, beta1, beta2 } => {
                        gsumi[j] = gsumi[j] * beta1 + (1.0 - beta1) * gij; // update biased first moment estimate
                        xsumi[j] = xsumi[j] * beta2 + (1.0 - beta2) * gij * gij; // update biased second moment estimate
                        let bias_corr1 = gsumi[j] / (1.0 - beta1.powi(self.step)); // correct bias first moment estimate
                        let bias_corr2 = xsumi[j] / (1.0 - beta2.powi(self.step)); // correct bias second moment estimate
                        pg.params[j] -= self.learning_rate * bias_corr1 / (bias_corr2.sqrt() + eps);
                    }
                    Method::Sgd { momentum } => {
                        let dx = momentum * gsumi[j] - self.learning_rate * gij;
                        gsumi[j] = dx;
                        pg.params[j] += dx;
                    }
                }
                pg.grads[j] = 0.0;
            }
        }
    }

    /// Runs `epochs` passes over the samples, in a new random order each time.
    pub fn fit(
        &mut self,
        net: &mut Net,
        images: &[Vol],
        targets: &[Vec<Float>],
    ) -> Result<Vec<EpochStats>> {
        Error::check_lengths(images.len(), targets.len())?;

        let mut order: Vec<usize> = (0..images.len()).collect();
        let mut history = Vec::with_capacity(self.epochs);

        for epoch in 1..=self.epochs {
            order.shuffle(&mut self.rng);

            let mut loss_sum = 0.0;
            let mut correct = 0;
            for (k, &i) in order.iter().enumerate() {
                let (loss, hit) = self.train_sample(net, &images[i], &targets[i]);
                loss_sum += loss;
                correct += usize::from(hit);
                if (k + 1) % 1000 == 0 {
                    debug!("epoch {epoch}: {} / {} samples", k + 1, images.len());
                }
            }
            self.flush(net);

            let seen = images.len().max(1) as Float;
            let stats = EpochStats {
                epoch,
                loss: loss_sum / seen,
                accuracy: correct as Float / seen,
            };
            info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4}",
                epoch, self.epochs, stats.loss, stats.accuracy
            );
            history.push(stats);
        }

        Ok(history)
    }
}

/// Mean cross-entropy and accuracy of `net` on the given samples.
pub fn evaluate(net: &mut Net, images: &[Vol], targets: &[Vec<Float>]) -> Result<Evaluation> {
    Error::check_lengths(images.len(), targets.len())?;

    let mut loss_sum = 0.0;
    let mut correct = 0;
    for (image, target) in images.iter().zip(targets) {
        loss_sum += net.get_cost_loss(image, target);
        if Some(net.get_prediction()) == argmax(target) {
            correct += 1;
        }
    }

    let samples = images.len();
    let seen = samples.max(1) as Float;
    Ok(Evaluation {
        samples,
        loss: loss_sum / seen,
        accuracy: correct as Float / seen,
    })
}

pub struct TrainerBuilder {
    learning_rate: Float,
    batch_size: usize,
    epochs: usize,
    method: Method,
    seed: Option<u64>,
}

impl TrainerBuilder {
    fn new() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 1,
            method: Method::ADAM,
            seed: None,
        }
    }

    /// default: 0.001
    pub fn learning_rate(mut self, value: Float) -> Self {
        self.learning_rate = value;
        self
    }

    /// default: 32
    pub fn batch_size(mut self, value: usize) -> Self {
        self.batch_size = value;
        self
    }

    /// default: 1
    pub fn epochs(mut self, value: usize) -> Self {
        self.epochs = value;
        self
    }

    /// default: [`Method::ADAM`]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// seeds the order in which `fit` visits samples
    ///
    /// default: from entropy
    pub fn seed(mut self, value: Option<u64>) -> Self {
        self.seed = value;
        self
    }

    pub fn build(self) -> Trainer {
        assert!(self.batch_size > 0, "batch size must be positive");

        Trainer {
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            epochs: self.epochs,
            method: self.method,
            rng: match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            pending: 0,
            step: 0,
            gsum: vec![],
            xsum: vec![],
            scratch: None,
        }
    }
}
