mod serde;

use crate::{utils::randn, Float};

/// A `sx x sy x depth` block of numbers together with the gradient of the loss
/// w.r.t. each of them.
///
/// Images, activations, filters and biases are all volumes. Values are laid out
/// row by row with the depth innermost, the same order as an interleaved RGB buffer.
#[derive(Debug, Clone, ::serde::Serialize)]
pub struct Vol {
    sx: usize,
    sy: usize,
    depth: usize,

    pub w: Vec<Float>,

    #[serde(skip)]
    pub dw: Vec<Float>,
}

impl From<Vec<Float>> for Vol {
    fn from(value: Vec<Float>) -> Self {
        let depth = value.len();
        Self {
            sx: 1,
            sy: 1,
            depth,
            w: value,
            dw: vec![0.0; depth],
        }
    }
}

impl From<&[Float]> for Vol {
    fn from(value: &[Float]) -> Self {
        Self::from(value.to_vec())
    }
}

impl Vol {
    pub fn new(sx: usize, sy: usize, depth: usize) -> Self {
        let n = sx * sy * depth;

        // weight normalization is done to equalize the output
        // variance of every neuron, otherwise neurons with a lot
        // of incoming connections have outputs of larger variance
        let scale = (1.0 / (n as Float)).sqrt();
        let w = (0..n).map(|_| randn(0.0, scale)).collect();

        Self {
            sx,
            sy,
            depth,
            w,
            dw: vec![0.0; n],
        }
    }

    pub fn with_constant(sx: usize, sy: usize, depth: usize, constant: Float) -> Self {
        let n = sx * sy * depth;
        Self {
            sx,
            sy,
            depth,
            w: vec![constant; n],
            dw: vec![0.0; n],
        }
    }

    pub fn zeros(sx: usize, sy: usize, depth: usize) -> Self {
        Self::with_constant(sx, sy, depth, 0.0)
    }

    fn get_index(&self, x: usize, y: usize, d: usize) -> usize {
        ((self.sx * y) + x) * self.depth + d
    }

    pub fn get(&self, x: usize, y: usize, d: usize) -> Float {
        self.w[self.get_index(x, y, d)]
    }

    pub fn set(&mut self, x: usize, y: usize, d: usize, value: Float) {
        let index = self.get_index(x, y, d);
        self.w[index] = value;
    }

    pub fn get_grad(&self, x: usize, y: usize, d: usize) -> Float {
        self.dw[self.get_index(x, y, d)]
    }

    /// Builds a `width x height x 3` volume from interleaved RGB bytes, row by row.
    ///
    /// Pixel intensities are kept as they are, in `[0, 255]`.
    pub fn from_rgb_image(img: &[u8], width: u32, height: u32) -> Self {
        let bytes = img;

        assert_eq!(
            (3 * width * height) as usize,
            bytes.len(),
            "image should have 3 components rgb"
        );

        // the rgb buffer layout ((width * y) + x) * 3 + c matches get_index
        let w = bytes.iter().map(|pixel| Float::from(*pixel)).collect();
        Self {
            sx: width as usize,
            sy: height as usize,
            depth: 3,
            w,
            dw: vec![0.0; bytes.len()],
        }
    }

    pub fn sx(&self) -> usize {
        self.sx
    }
    pub fn sy(&self) -> usize {
        self.sy
    }
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.sx, self.sy, self.depth)
    }
}
