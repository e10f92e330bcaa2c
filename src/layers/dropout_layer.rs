use crate::{utils::randf, vol::Vol, Float};

use super::NetLayer;

// Randomly zeroes a fraction `drop_prob` of the activations during training.
// Kept activations are scaled by 1 / (1 - drop_prob) so that nothing has to
// change at prediction time, where the layer is the identity.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DropoutLayer {
    out_sx: usize,
    out_sy: usize,
    out_depth: usize,

    drop_prob: Float,

    // mask of the last training pass
    #[serde(skip)]
    dropped: Vec<bool>,
}

impl DropoutLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize, drop_prob: Float) -> Self {
        assert!(
            (0.0..1.0).contains(&drop_prob),
            "drop probability must be in [0, 1)"
        );
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
            drop_prob,
            dropped: vec![false; in_sx * in_sy * in_depth],
        }
    }
}

#[typetag::serde]
impl NetLayer for DropoutLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, is_training: bool) {
        assert_eq!(
            in_act.w.len(),
            out_act.w.len(),
            "in and out should have the same length"
        );

        self.dropped.resize(in_act.w.len(), false);

        if !is_training {
            out_act.w.copy_from_slice(&in_act.w);
            self.dropped.fill(false);
            return;
        }

        let scale = 1.0 / (1.0 - self.drop_prob);
        for ((in_w, out_w), dropped) in in_act
            .w
            .iter()
            .copied()
            .zip(out_act.w.iter_mut())
            .zip(self.dropped.iter_mut())
        {
            *dropped = randf(0.0, 1.0) < self.drop_prob;
            *out_w = if *dropped { 0.0 } else { in_w * scale };
        }
    }

    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol) {
        let scale = 1.0 / (1.0 - self.drop_prob);
        for i in 0..in_act.dw.len() {
            in_act.dw[i] = if self.dropped[i] {
                0.0
            } else {
                out_act.dw[i] * scale
            };
        }
    }

    fn out_depth(&self) -> usize {
        self.out_depth
    }
    fn out_sx(&self) -> usize {
        self.out_sx
    }
    fn out_sy(&self) -> usize {
        self.out_sy
    }

    fn params_and_grads(&mut self) -> Vec<super::LayerDetails<'_>> {
        Vec::new()
    }
}
