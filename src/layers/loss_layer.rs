// Layers that implement a loss. Currently these are the layers that
// can initiate a backward() pass. One of the layers in this
// file must be the final layer in a Net.

use crate::{vol::Vol, Float};

use super::FinalLayer;

// probabilities are clipped before taking the log so that a confident
// wrong prediction gives a large but finite loss
const PROB_EPSILON: Float = 1e-7;

/// This is a classifier, with N discrete classes from 0 to N-1
/// it gets a stream of N incoming numbers and computes the softmax
/// function (exponentiate and normalize to sum to 1 as probabilities should)
///
/// The loss is the categorical cross-entropy against a one-hot target.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SoftmaxLayer {
    num_inputs: usize,
    out_depth: usize,
    out_sx: usize,
    out_sy: usize,

    #[serde(skip)]
    es: Vec<Float>,
}

impl SoftmaxLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        let num_inputs = in_sx * in_sy * in_depth;
        Self {
            num_inputs,
            out_depth: num_inputs,
            out_sx: 1,
            out_sy: 1,

            es: vec![0.0; num_inputs],
        }
    }
}

#[typetag::serde]
impl FinalLayer for SoftmaxLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, _is_training: bool) {
        let v = in_act;

        debug_assert_eq!(v.w.len(), self.num_inputs);
        debug_assert_eq!(out_act.sx(), 1);
        debug_assert_eq!(out_act.sy(), 1);
        debug_assert_eq!(out_act.depth(), self.out_depth);

        self.es.resize(self.out_depth, 0.0);

        // compute max activation
        let amax = v.w.iter().copied().fold(Float::NEG_INFINITY, Float::max);

        // compute exponentials (carefully to not blow up)
        let mut esum = 0.0;
        for i in 0..self.out_depth {
            let e = (v.w[i] - amax).exp();
            esum += e;
            self.es[i] = e;
        }

        // normalize and output to sum to one
        for i in 0..self.out_depth {
            self.es[i] /= esum;
            out_act.w[i] = self.es[i];
        }
    }

    fn backward(&mut self, target: &[Float], in_act: &mut Vol, _out_act: &Vol) -> Float {
        assert_eq!(
            target.len(),
            self.out_depth,
            "target should have one entry per class"
        );

        // for a target that sums to one the gradient of softmax followed by
        // cross-entropy w.r.t. the softmax inputs is p - t
        let x = in_act;
        for i in 0..self.out_depth {
            x.dw[i] = self.es[i] - target[i];
        }

        self.loss(target)
    }

    fn loss(&self, target: &[Float]) -> Float {
        target
            .iter()
            .zip(&self.es)
            .filter(|(t, _)| **t != 0.0)
            .map(|(t, p)| -t * p.clamp(PROB_EPSILON, 1.0).ln())
            .sum()
    }

    fn out_sx(&self) -> usize {
        self.out_sx
    }
    fn out_sy(&self) -> usize {
        self.out_sy
    }
    fn out_depth(&self) -> usize {
        self.out_depth
    }
}
