use crate::{vol::Vol, Float};

use super::{clip, origin, LayerDetails, NetLayer};

/// Max pooling over square `sx x sx` windows of each depth slice, without padding.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PoolLayer {
    // required
    sx: usize,
    in_depth: usize,
    in_sx: usize,
    in_sy: usize,

    // optional
    stride: usize,

    // computed
    out_depth: usize,
    out_sx: usize,
    out_sy: usize,

    // input index of the maximum behind each output value
    #[serde(skip)]
    switches: Vec<usize>,
}

impl PoolLayer {
    pub fn builder(sx: usize, in_depth: usize, in_sx: usize, in_sy: usize) -> PoolLayerBuilder {
        PoolLayerBuilder::new(sx, in_depth, in_sx, in_sy)
    }
}

pub struct PoolLayerBuilder {
    // required
    sx: usize,
    in_depth: usize,
    in_sx: usize,
    in_sy: usize,

    // optional
    stride: usize,
}

impl PoolLayerBuilder {
    fn new(sx: usize, in_depth: usize, in_sx: usize, in_sy: usize) -> Self {
        Self {
            sx,
            in_depth,
            in_sx,
            in_sy,

            stride: 2,
        }
    }

    /// default: 2
    pub fn stride(mut self, value: usize) -> Self {
        self.stride = value;
        self
    }

    pub fn build(self) -> PoolLayer {
        assert!(
            self.in_sx >= self.sx && self.in_sy >= self.sx,
            "pooling window does not fit into the input volume"
        );

        let out_depth = self.in_depth;
        let out_sx = (self.in_sx - self.sx) / self.stride + 1;
        let out_sy = (self.in_sy - self.sx) / self.stride + 1;

        PoolLayer {
            sx: self.sx,
            in_depth: self.in_depth,
            in_sx: self.in_sx,
            in_sy: self.in_sy,
            stride: self.stride,

            out_depth,
            out_sx,
            out_sy,

            switches: vec![0; out_sx * out_sy * out_depth],
        }
    }
}

#[typetag::serde]
impl NetLayer for PoolLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, _is_training: bool) {
        debug_assert_eq!(in_act.shape(), (self.in_sx, self.in_sy, self.in_depth));

        // switches are not serialized, a restored layer sizes them on first use
        self.switches
            .resize(self.out_sx * self.out_sy * self.out_depth, 0);

        for ay in 0..self.out_sy {
            let y0 = origin(ay, self.stride, 0);
            let ys = clip(y0, self.sx, self.in_sy);

            for ax in 0..self.out_sx {
                let x0 = origin(ax, self.stride, 0);
                let xs = clip(x0, self.sx, self.in_sx);

                for d in 0..self.out_depth {
                    let mut best = Float::NEG_INFINITY;
                    let mut best_at = None;

                    for fy in ys.clone() {
                        let iy = (y0 + fy as isize) as usize;
                        for fx in xs.clone() {
                            let ix = (x0 + fx as isize) as usize;
                            let at = (iy * self.in_sx + ix) * self.in_depth + d;
                            if best_at.is_none() || in_act.w[at] > best {
                                best = in_act.w[at];
                                best_at = Some(at);
                            }
                        }
                    }

                    let out_at = (ay * self.out_sx + ax) * self.out_depth + d;
                    self.switches[out_at] = best_at.expect("pooling window overlaps the input");
                    out_act.w[out_at] = best;
                }
            }
        }
    }

    // no parameters, only the gradient wrt the input
    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol) {
        debug_assert_eq!(in_act.w.len(), in_act.dw.len());

        in_act.dw.fill(0.0);
        for (&at, &chain_grad) in self.switches.iter().zip(&out_act.dw) {
            in_act.dw[at] += chain_grad;
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
