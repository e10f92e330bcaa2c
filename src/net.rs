mod serde;

use crate::{
    layers::{
        ConvLayer, DropoutLayer, FinalLayer, FullyConnLayer, InputLayer, LayerDetails, NetLayer,
        PoolLayer, ReluLayer, SoftmaxLayer,
    },
    utils::argmax,
    vol::Vol,
    Float,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    /// no nonlinearity, the layer output is used as is
    Linear,
}

#[derive(Debug, Clone, Copy)]
pub enum Layer {
    Input {
        width: usize,
        height: usize,
        depth: usize,
    },
    Conv {
        sx: usize,
        filters: usize,
        stride: usize,
        padding: usize,
        activation: Activation,
    },
    Pool {
        sx: usize,
        stride: usize,
    },
    Dense {
        neurons: usize,
        activation: Activation,
    },
    Dropout {
        drop_prob: Float,
    },
}

pub enum EndLayer {
    Softmax { classes: usize },
}

// Net manages a set of layers
// For now constraints: Simple linear order of layers, first layer input last layer a cost layer
pub struct Net {
    layers: Vec<Box<dyn NetLayer>>,
    final_layer: Box<dyn FinalLayer>,
    acts: Vec<Vol>,
}

// relus like a bit of positive bias to get gradients early
// otherwise it's technically possible that a relu unit will never turn on (by chance)
// and will never get any gradient and never contribute any computation. Dead relu.
fn initial_bias(activation: Activation) -> Float {
    match activation {
        Activation::Relu => 0.1,
        Activation::Linear => 0.0,
    }
}

fn out_dim(layer: &dyn NetLayer) -> (usize, usize, usize) {
    (layer.out_sx(), layer.out_sy(), layer.out_depth())
}

fn push_activation(layers: &mut Vec<Box<dyn NetLayer>>, activation: Activation) {
    let (sx, sy, depth) = out_dim(layers.last().expect("activation follows a layer").as_ref());
    match activation {
        Activation::Relu => layers.push(Box::new(ReluLayer::new(sx, sy, depth))),
        Activation::Linear => {}
    }
}

impl Net {
    pub fn new(def_layers: &[Layer], def_final_layer: EndLayer) -> Self {
        let mut layers: Vec<Box<dyn NetLayer>> = Vec::new();

        for def in def_layers {
            let dim = layers.last().map(|layer| out_dim(layer.as_ref()));

            let (in_sx, in_sy, in_depth) = match (def, dim) {
                (
                    Layer::Input {
                        width,
                        height,
                        depth,
                    },
                    None,
                ) => {
                    layers.push(Box::new(InputLayer::with_dimensions(
                        *depth, *width, *height,
                    )));
                    continue;
                }
                (Layer::Input { .. }, Some(_)) => panic!("input layer must be the first"),
                (_, None) => panic!("dim must be specified"),
                (_, Some(dim)) => dim,
            };

            match *def {
                Layer::Input { .. } => unreachable!("handled above"),
                Layer::Conv {
                    sx,
                    filters,
                    stride,
                    padding,
                    activation,
                } => {
                    let layer = ConvLayer::builder(filters, sx, in_depth, in_sx, in_sy)
                        .padding(padding)
                        .stride(stride)
                        .bias(initial_bias(activation))
                        .build();
                    layers.push(Box::new(layer));
                    push_activation(&mut layers, activation);
                }
                Layer::Pool { sx, stride } => {
                    let layer = PoolLayer::builder(sx, in_depth, in_sx, in_sy)
                        .stride(stride)
                        .build();
                    layers.push(Box::new(layer));
                }
                Layer::Dense {
                    neurons,
                    activation,
                } => {
                    let layer = FullyConnLayer::builder(neurons, in_sx, in_sy, in_depth)
                        .bias(initial_bias(activation))
                        .build();
                    layers.push(Box::new(layer));
                    push_activation(&mut layers, activation);
                }
                Layer::Dropout { drop_prob } => {
                    layers.push(Box::new(DropoutLayer::new(
                        in_sx, in_sy, in_depth, drop_prob,
                    )));
                }
            }
        }

        let final_layer: Box<dyn FinalLayer> = match def_final_layer {
            EndLayer::Softmax { classes } => {
                let (in_sx, in_sy, in_depth) = out_dim(
                    layers
                        .last()
                        .expect("dim must be specified for final layer")
                        .as_ref(),
                );

                // add an fc layer here, there is no reason the user should
                // have to worry about this and we almost always want to
                let layer = FullyConnLayer::builder(classes, in_sx, in_sy, in_depth)
                    .bias(0.1)
                    .build();
                layers.push(Box::new(layer));

                Box::new(SoftmaxLayer::new(1, 1, classes))
            }
        };

        Self::from_layers(layers, final_layer)
    }

    // activations are scratch space, one per layer plus the final output
    pub(crate) fn from_layers(
        layers: Vec<Box<dyn NetLayer>>,
        final_layer: Box<dyn FinalLayer>,
    ) -> Self {
        let mut acts: Vec<Vol> = layers
            .iter()
            .map(|layer| Vol::zeros(layer.out_sx(), layer.out_sy(), layer.out_depth()))
            .collect();
        acts.push(Vol::zeros(
            final_layer.out_sx(),
            final_layer.out_sy(),
            final_layer.out_depth(),
        ));

        Self {
            layers,
            final_layer,
            acts,
        }
    }

    fn adjecent(acts: &mut [Vol], at: usize) -> (&mut Vol, &mut Vol) {
        let (a, b) = acts.split_at_mut(at);
        (
            a.last_mut().expect("should be at least one element"),
            &mut b[0],
        )
    }

    /// Forward prop the network.
    ///
    /// The trainer passes `is_training = true`, which enables dropout.
    /// Everything else predicts with `is_training = false`.
    pub fn forward(&mut self, vol: &Vol, is_training: bool) -> &Vol {
        debug_assert_eq!(self.layers.len() + 1, self.acts.len());

        let n = self.acts.len();

        self.layers[0].forward(vol, &mut self.acts[0], is_training);
        for i in 1..self.layers.len() {
            let (a, b) = Self::adjecent(&mut self.acts, i);
            self.layers[i].forward(a, b, is_training);
        }

        let (a, b) = Self::adjecent(&mut self.acts, n - 1);
        self.final_layer.forward(a, b, is_training);

        &self.acts[n - 1]
    }

    /// Class probabilities for a single image.
    pub fn predict(&mut self, vol: &Vol) -> Vec<Float> {
        self.forward(vol, false).w.clone()
    }

    /// Backprop: compute gradients wrt all parameters for the last forward pass.
    ///
    /// Parameter gradients accumulate until the trainer applies them.
    /// The gradient wrt the data ends up in `vol.dw`.
    pub fn backward(&mut self, target: &[Float], vol: &mut Vol) -> Float {
        let n = self.acts.len();

        let (a, b) = Self::adjecent(&mut self.acts, n - 1);
        let loss = self.final_layer.backward(target, a, b);

        for i in (1..self.layers.len()).rev() {
            let (a, b) = Self::adjecent(&mut self.acts, i);
            self.layers[i].backward(a, b);
        }

        self.layers[0].backward(vol, &self.acts[0]);

        loss
    }

    // this is a convenience function for returning the argmax
    // prediction of the last forward pass
    pub fn get_prediction(&self) -> usize {
        let out = self.acts.last().expect("net always has an output");
        argmax(&out.w).expect("net has at least one class")
    }

    pub fn get_cost_loss(&mut self, vol: &Vol, target: &[Float]) -> Float {
        self.forward(vol, false);
        self.final_layer.loss(target)
    }

    pub fn params_and_grads(&mut self) -> Vec<LayerDetails<'_>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.params_and_grads())
            .collect()
    }

    pub fn num_params(&mut self) -> usize {
        self.params_and_grads()
            .iter()
            .map(|pg| pg.params.len())
            .sum()
    }

    /// Output shape `(sx, sy, depth)` of every layer, the final output last.
    pub fn layer_shapes(&self) -> Vec<(usize, usize, usize)> {
        self.acts.iter().map(Vol::shape).collect()
    }

    pub fn input_shape(&self) -> (usize, usize, usize) {
        out_dim(self.layers[0].as_ref())
    }

    pub fn num_classes(&self) -> usize {
        self.final_layer.out_depth()
    }
}

#[cfg(test)]
mod tests {
    use rand::random;

    use crate::{vol::Vol, Float, Method, Trainer};

    use super::{Activation, EndLayer, Layer, Net};

    fn setup(activation: Activation) -> Net {
        Net::new(
            &[
                Layer::Input {
                    width: 1,
                    height: 1,
                    depth: 2,
                },
                Layer::Dense {
                    neurons: 5,
                    activation,
                },
                Layer::Dense {
                    neurons: 5,
                    activation,
                },
            ],
            EndLayer::Softmax { classes: 3 },
        )
    }

    fn one_hot(class: usize) -> Vec<Float> {
        let mut target = vec![0.0; 3];
        target[class] = 1.0;
        target
    }

    fn random_point() -> Vol {
        Vol::from(vec![random::<Float>() * 2.0 - 1.0, random::<Float>() * 2.0 - 1.0])
    }

    #[test]
    fn layer_count() {
        let net = setup(Activation::Relu);

        // relus are their own layers. Softmax gets its own fully connected layer.
        // this should all get desugared just fine.
        assert_eq!(net.layers.len(), 6);
        assert_eq!(net.acts.len(), 7);
        assert_eq!(setup(Activation::Linear).layers.len(), 4);
    }

    #[test]
    fn forward_probabilities() {
        let mut net = setup(Activation::Relu);
        let probability_volume = net.forward(&Vol::from([0.2, -0.3].as_ref()), false);

        assert_eq!(probability_volume.w.len(), 3); // 3 classes output
        for w in &probability_volume.w {
            assert!(*w > 0.0);
            assert!(*w < 1.0);
        }
        let sum: Float = probability_volume.w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn prediction_is_the_most_likely_class() {
        let mut net = setup(Activation::Relu);
        let probabilities = net.predict(&random_point());
        let best = net.get_prediction();
        assert!(probabilities.iter().all(|p| *p <= probabilities[best]));
    }

    #[test]
    fn convolutional_shapes() {
        let net = Net::new(
            &[
                Layer::Input {
                    width: 30,
                    height: 30,
                    depth: 3,
                },
                Layer::Conv {
                    sx: 3,
                    filters: 4,
                    stride: 1,
                    padding: 0,
                    activation: Activation::Relu,
                },
                Layer::Pool { sx: 2, stride: 2 },
                Layer::Dropout { drop_prob: 0.5 },
            ],
            EndLayer::Softmax { classes: 7 },
        );

        assert_eq!(net.input_shape(), (30, 30, 3));
        assert_eq!(net.num_classes(), 7);
        assert_eq!(
            net.layer_shapes(),
            vec![
                (30, 30, 3),
                (28, 28, 4),
                (28, 28, 4),
                (14, 14, 4),
                (14, 14, 4),
                (1, 1, 7),
                (1, 1, 7),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "input layer must be the first")]
    fn input_layer_only_first() {
        Net::new(
            &[
                Layer::Input {
                    width: 1,
                    height: 1,
                    depth: 2,
                },
                Layer::Input {
                    width: 1,
                    height: 1,
                    depth: 2,
                },
            ],
            EndLayer::Softmax { classes: 2 },
        );
    }

    #[test]
    fn increse_prob_for_ground_truth_class_when_trained() {
        let mut net = setup(Activation::Relu);
        let mut trainer = Trainer::builder()
            .learning_rate(0.001)
            .method(Method::Sgd { momentum: 0.0 })
            .batch_size(1)
            .build();

        // lets test 100 random point and label settings
        // an issue is that if step size is too high, this could technically fail...
        for _k in 0..100 {
            let x = random_point();
            let gti = (random::<Float>() * 3.0).floor() as usize;
            let pv = net.predict(&x);

            trainer.train(&mut net, &x, &one_hot(gti));

            let pv2 = net.predict(&x);
            assert!(pv2[gti] > pv[gti]);
        }
    }

    #[test]
    fn compute_correct_gradient_at_data() {
        // here we only test the gradient at data, but if this is
        // right then that's comforting, because it is a function
        // of all gradients above, for all layers.
        // linear layers keep the loss smooth around x.
        let mut net = setup(Activation::Linear);

        let mut x = random_point();
        let gti = (random::<Float>() * 3.0).floor() as usize;
        let target = one_hot(gti);

        net.forward(&x, true);
        net.backward(&target, &mut x); // computes gradients at all layers, and at x

        let delta = 0.01;

        for i in 0..x.w.len() {
            let grad_analytic = x.dw[i];
            let xold = x.w[i];

            x.w[i] += delta;
            let c0 = net.get_cost_loss(&x, &target);

            x.w[i] -= 2.0 * delta;
            let c1 = net.get_cost_loss(&x, &target);

            x.w[i] = xold; // reset

            let grad_numeric = (c0 - c1) / (2.0 * delta);
            let abs_error = (grad_analytic - grad_numeric).abs();
            let rel_error = abs_error / (grad_analytic + grad_numeric).abs();

            println!(
                "{i}: numeric: {grad_numeric}, analytic: {grad_analytic}, rel error: {rel_error}"
            );

            assert!(abs_error < 1e-3 || rel_error < 1e-2);
        }
    }
}
