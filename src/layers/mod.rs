mod conv_layer;
mod dropout_layer;
mod input_layer;
mod loss_layer;
mod nonlinear_layer;
mod pool_layer;

pub use conv_layer::*;
pub use dropout_layer::*;
pub use input_layer::*;
pub use loss_layer::*;
pub use nonlinear_layer::*;
pub use pool_layer::*;

use std::ops::Range;

use crate::{vol::Vol, Float};

#[typetag::serde]
pub trait NetLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, is_training: bool);
    fn backward(&mut self, in_act: &mut Vol, out_act: &Vol);
    fn params_and_grads(&mut self) -> Vec<LayerDetails<'_>>;

    fn out_sx(&self) -> usize;
    fn out_sy(&self) -> usize;
    fn out_depth(&self) -> usize;
}

/// The last layer of a net: turns activations into an output and starts backprop.
#[typetag::serde]
pub trait FinalLayer {
    fn forward(&mut self, in_act: &Vol, out_act: &mut Vol, is_training: bool);
    /// Computes the gradient w.r.t. `in_act` for the given `target` and returns the loss.
    fn backward(&mut self, target: &[Float], in_act: &mut Vol, out_act: &Vol) -> Float;
    /// Loss of the last forward pass, without touching any gradient.
    fn loss(&self, target: &[Float]) -> Float;

    fn out_sx(&self) -> usize;
    fn out_sy(&self) -> usize;
    fn out_depth(&self) -> usize;
}

#[derive(Debug)]
pub struct LayerDetails<'a> {
    pub params: &'a mut [Float],
    pub grads: &'a mut [Float],
}

// position of the first window tap for output coordinate `out`, negative inside the padding
fn origin(out: usize, stride: usize, padding: usize) -> isize {
    (out * stride) as isize - padding as isize
}

// window offsets in `0..size` that land inside an input of length `len`
// when the window starts at `start`
fn clip(start: isize, size: usize, len: usize) -> Range<usize> {
    let lo = (-start).clamp(0, size as isize) as usize;
    let hi = (len as isize - start).clamp(0, size as isize) as usize;
    lo.min(hi)..hi
}
