use crate::vol::Vol;

use super::{LayerDetails, NetLayer};

/// Elementwise `max(0, x)`.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ReluLayer {
    out_sx: usize,
    out_sy: usize,
    out_depth: usize,
}

impl ReluLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
        }
    }
}

#[typetag::serde]
impl NetLayer for ReluLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, _is_training: bool) {
        assert_eq!(
            in_act.w.len(),
            out_act.w.len(),
            "in and out should have the same length"
        );

        for (out, x) in out_act.w.iter_mut().zip(&in_act.w) {
            *out = x.max(0.0);
        }
    }

    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol) {
        assert_eq!(
            in_act.w.len(),
            out_act.w.len(),
            "in and out should have the same length"
        );

        // units that were clamped pass no gradient
        for ((grad, &y), &chain_grad) in in_act.dw.iter_mut().zip(&out_act.w).zip(&out_act.dw) {
            *grad = if y > 0.0 { chain_grad } else { 0.0 };
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

    fn params_and_grads(&mut self) -> Vec<LayerDetails<'_>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::{layers::NetLayer, vol::Vol};

    use super::ReluLayer;

    #[test]
    fn clamps_negatives_and_blocks_their_gradient() {
        let mut layer = ReluLayer::new(1, 1, 3);
        let mut input = Vol::from(vec![-1.0, 0.0, 2.5]);
        let mut out = Vol::zeros(1, 1, 3);

        layer.forward(&input, &mut out, true);
        assert_eq!(out.w, vec![0.0, 0.0, 2.5]);

        out.dw = vec![1.0, 1.0, 1.0];
        layer.backward(&mut input, &out);
        assert_eq!(input.dw, vec![0.0, 0.0, 1.0]);
    }
}
