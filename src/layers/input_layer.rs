use crate::vol::Vol;

use super::{LayerDetails, NetLayer};

/// Checks the shape of incoming images and hands them to the first real layer.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct InputLayer {
    out_depth: usize,
    out_sx: usize,
    out_sy: usize,
}

impl InputLayer {
    pub fn with_dimensions(depth: usize, width: usize, height: usize) -> Self {
        Self {
            out_depth: depth,
            out_sx: width,
            out_sy: height,
        }
    }
}

#[typetag::serde]
impl NetLayer for InputLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, _is_training: bool) {
        assert_eq!(
            in_act.shape(),
            (self.out_sx, self.out_sy, self.out_depth),
            "input volume does not match the input layer"
        );
        out_act.w.copy_from_slice(&in_act.w);
    }

    // gradient w.r.t. the data, only needed for inspection
    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol) {
        debug_assert_eq!(in_act.dw.len(), out_act.dw.len());
        in_act.dw.copy_from_slice(&out_act.dw);
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
