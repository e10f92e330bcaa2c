//! Layers that take dot products of their input with learned weights.
//!
//! [`ConvLayer`] slides its filters over the image, sharing weights spatially.
//! [`FullyConnLayer`] connects every neuron to every input value.

use crate::{vol::Vol, Float};

use super::{clip, origin, LayerDetails, NetLayer};

#[derive(serde::Serialize, serde::Deserialize)]
pub struct ConvLayer {
    out_depth: usize,
    sx: usize,
    sy: usize,

    in_depth: usize,
    in_sx: usize,
    in_sy: usize,

    stride: usize,
    padding: usize,

    out_sx: usize,
    out_sy: usize,

    filters: Vec<Vol>,
    biases: Vol,
}

impl ConvLayer {
    pub fn builder(
        filters: usize,
        sx: usize,
        in_depth: usize,
        in_sx: usize,
        in_sy: usize,
    ) -> ConvLayerBuilder {
        ConvLayerBuilder::new(filters, sx, in_depth, in_sx, in_sy)
    }

    pub fn filters(&self) -> &[Vol] {
        &self.filters
    }
}

pub struct ConvLayerBuilder {
    out_depth: usize,
    sx: usize,

    in_depth: usize,
    in_sx: usize,
    in_sy: usize,

    stride: usize,
    padding: usize,

    bias: Float,
}

impl ConvLayerBuilder {
    pub fn new(filters: usize, sx: usize, in_depth: usize, in_sx: usize, in_sy: usize) -> Self {
        Self {
            // required
            out_depth: filters,
            sx,
            in_depth,
            in_sx,
            in_sy,

            // optional
            stride: 1,
            padding: 0,
            bias: 0.0,
        }
    }

    /// stride at which we apply filters to input volume
    ///
    /// default: 1
    pub fn stride(mut self, value: usize) -> Self {
        self.stride = value;
        self
    }

    /// padding to add around borders of input volume
    ///
    /// default: 0
    pub fn padding(mut self, value: usize) -> Self {
        self.padding = value;
        self
    }

    /// default: 0.0
    pub fn bias(mut self, value: Float) -> Self {
        self.bias = value;
        self
    }

    pub fn build(self) -> ConvLayer {
        assert!(
            self.in_sx + self.padding * 2 >= self.sx && self.in_sy + self.padding * 2 >= self.sx,
            "filter does not fit into the input volume"
        );

        let filters = (0..self.out_depth)
            .map(|_| Vol::new(self.sx, self.sx, self.in_depth))
            .collect();
        ConvLayer {
            out_depth: self.out_depth,
            sx: self.sx,
            sy: self.sx,
            in_depth: self.in_depth,
            in_sx: self.in_sx,
            in_sy: self.in_sy,
            stride: self.stride,
            padding: self.padding,
            // positions where the filter would overhang the padded input are dropped
            out_sx: ((self.in_sx + self.padding * 2 - self.sx) / self.stride + 1),
            out_sy: ((self.in_sy + self.padding * 2 - self.sx) / self.stride + 1),
            filters,
            biases: Vol::with_constant(1, 1, self.out_depth, self.bias),
        }
    }
}

fn dot(a: &[Float], b: &[Float]) -> Float {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// one entry per filter, the biases last
fn weights_and_biases<'a>(filters: &'a mut [Vol], biases: &'a mut Vol) -> Vec<LayerDetails<'a>> {
    filters
        .iter_mut()
        .chain(std::iter::once(biases))
        .map(|vol| LayerDetails {
            params: &mut vol.w,
            grads: &mut vol.dw,
        })
        .collect()
}

#[typetag::serde]
impl NetLayer for ConvLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, _is_training: bool) {
        debug_assert_eq!(in_act.shape(), (self.in_sx, self.in_sy, self.in_depth));

        let depth = self.in_depth;
        for (d, (filter, bias)) in self.filters.iter().zip(&self.biases.w).enumerate() {
            for ay in 0..self.out_sy {
                let y0 = origin(ay, self.stride, self.padding);

                for ax in 0..self.out_sx {
                    let x0 = origin(ax, self.stride, self.padding);
                    let mut a = *bias;

                    for fy in clip(y0, self.sy, self.in_sy) {
                        let iy = (y0 + fy as isize) as usize;
                        for fx in clip(x0, self.sx, self.in_sx) {
                            let ix = (x0 + fx as isize) as usize;
                            let f_at = (fy * self.sx + fx) * depth;
                            let v_at = (iy * self.in_sx + ix) * depth;
                            a += dot(&filter.w[f_at..f_at + depth], &in_act.w[v_at..v_at + depth]);
                        }
                    }

                    out_act.set(ax, ay, d, a);
                }
            }
        }
    }

    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol) {
        debug_assert_eq!(in_act.w.len(), in_act.dw.len());

        // the input gradient is rebuilt from scratch, filter gradients accumulate
        in_act.dw.fill(0.0);

        let depth = self.in_depth;
        for (d, filter) in self.filters.iter_mut().enumerate() {
            for ay in 0..self.out_sy {
                let y0 = origin(ay, self.stride, self.padding);

                for ax in 0..self.out_sx {
                    let x0 = origin(ax, self.stride, self.padding);
                    let chain_grad = out_act.get_grad(ax, ay, d);

                    for fy in clip(y0, self.sy, self.in_sy) {
                        let iy = (y0 + fy as isize) as usize;
                        for fx in clip(x0, self.sx, self.in_sx) {
                            let ix = (x0 + fx as isize) as usize;
                            let f_at = (fy * self.sx + fx) * depth;
                            let v_at = (iy * self.in_sx + ix) * depth;

                            for k in 0..depth {
                                filter.dw[f_at + k] += in_act.w[v_at + k] * chain_grad;
                                in_act.dw[v_at + k] += filter.w[f_at + k] * chain_grad;
                            }
                        }
                    }

                    self.biases.dw[d] += chain_grad;
                }
            }
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
        weights_and_biases(&mut self.filters, &mut self.biases)
    }
}

/// Dense layer: every output neuron sees the whole input volume as a flat vector,
/// so no explicit flatten layer is needed in front of it.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct FullyConnLayer {
    out_depth: usize,

    // computed
    num_inputs: usize,
    out_sx: usize,
    out_sy: usize,

    filters: Vec<Vol>,
    biases: Vol,
}

impl FullyConnLayer {
    pub fn builder(
        num_neurons: usize,
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
    ) -> FullyConnLayerBuilder {
        FullyConnLayerBuilder::new(num_neurons, in_sx, in_sy, in_depth)
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }
}

#[typetag::serde]
impl NetLayer for FullyConnLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, _is_training: bool) {
        debug_assert_eq!(in_act.w.len(), self.num_inputs);
        debug_assert_eq!(out_act.shape(), (1, 1, self.out_depth));

        for ((out, neuron), bias) in out_act.w.iter_mut().zip(&self.filters).zip(&self.biases.w) {
            *out = dot(&in_act.w, &neuron.w) + bias;
        }
    }

    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol) {
        in_act.dw.fill(0.0);

        for ((neuron, bias_grad), &chain_grad) in self
            .filters
            .iter_mut()
            .zip(&mut self.biases.dw)
            .zip(&out_act.dw)
        {
            for (k, (x_grad, w_grad)) in in_act.dw.iter_mut().zip(&mut neuron.dw).enumerate() {
                *x_grad += neuron.w[k] * chain_grad;
                *w_grad += in_act.w[k] * chain_grad;
            }
            *bias_grad += chain_grad;
        }
    }

    fn out_sx(&self) -> usize {
        self.out_sx
    }

    fn out_depth(&self) -> usize {
        self.out_depth
    }

    fn out_sy(&self) -> usize {
        self.out_sy
    }

    fn params_and_grads(&mut self) -> Vec<LayerDetails<'_>> {
        weights_and_biases(&mut self.filters, &mut self.biases)
    }
}

pub struct FullyConnLayerBuilder {
    // required
    out_depth: usize,

    // optional
    bias: Float,

    in_sx: usize,
    in_sy: usize,
    in_depth: usize,
}

impl FullyConnLayerBuilder {
    fn new(num_neurons: usize, in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        Self {
            out_depth: num_neurons,
            bias: 0.0,

            in_sx,
            in_sy,
            in_depth,
        }
    }

    /// default: 0.0
    pub fn bias(mut self, value: Float) -> Self {
        self.bias = value;
        self
    }

    pub fn build(self) -> FullyConnLayer {
        let num_inputs = self.in_sx * self.in_sy * self.in_depth;

        let filters = (0..self.out_depth)
            .map(|_| Vol::new(1, 1, num_inputs))
            .collect();

        FullyConnLayer {
            out_depth: self.out_depth,
            num_inputs,
            out_sx: 1,
            out_sy: 1,
            filters,
            biases: Vol::with_constant(1, 1, self.out_depth, self.bias),
        }
    }
}
