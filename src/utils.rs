use rand_distr::{Distribution, Normal, Uniform};

use crate::Float;

pub fn gauss_random(mean: Float, std: Float) -> Float {
    let normal = Normal::new(mean, std).expect("std must be finite");

    normal.sample(&mut rand::thread_rng())
}

pub fn randf(a: Float, b: Float) -> Float {
    let uniform = Uniform::new(a, b);
    uniform.sample(&mut rand::thread_rng())
}

pub fn randn(mu: Float, std: Float) -> Float {
    mu + gauss_random(0.0, 1.0) * std
}

pub fn zeros(n: usize) -> Vec<Float> {
    vec![0.0; n]
}

// index of the largest value, first one wins on ties.
pub fn argmax(values: &[Float]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }

    let mut maxv = values[0];
    let mut maxi = 0;
    for (i, value) in values.iter().copied().enumerate().skip(1) {
        if value > maxv {
            maxv = value;
            maxi = i;
        }
    }
    Some(maxi)
}

#[cfg(test)]
mod tests {
    use super::{argmax, randf};

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
    }

    #[test]
    fn randf_stays_in_range() {
        for _ in 0..1000 {
            let value = randf(0.0, 1.0);
            assert!((0.0..1.0).contains(&value));
        }
    }
}
