use rand::{seq::SliceRandom, Rng};

use crate::{vol::Vol, Error, Float, Result};

/// A train/test partition of the samples, labels one-hot encoded.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub train_images: Vec<Vol>,
    pub test_images: Vec<Vol>,
    pub train_labels: Vec<Vec<Float>>,
    pub test_labels: Vec<Vec<Float>>,
}

/// Expands every label into a vector of `categories` entries with a single 1.
pub fn one_hot(labels: &[usize], categories: usize) -> Result<Vec<Vec<Float>>> {
    labels
        .iter()
        .map(|&label| {
            if label >= categories {
                return Err(Error::LabelOutOfRange { label, categories });
            }
            let mut row = vec![0.0; categories];
            row[label] = 1.0;
            Ok(row)
        })
        .collect()
}

/// Shuffles the samples and holds out `ceil(test_size * n)` of them for testing.
///
/// The split is not stratified, class balance only holds approximately.
pub fn train_test_split<R: Rng + ?Sized>(
    images: Vec<Vol>,
    labels: Vec<Vec<Float>>,
    test_size: f64,
    rng: &mut R,
) -> Result<SplitDataset> {
    Error::check_lengths(images.len(), labels.len())?;

    let samples = images.len();
    let test = (test_size * samples as f64).ceil() as usize;
    let train = samples.saturating_sub(test);
    if !(test_size > 0.0 && test_size < 1.0) || test == 0 || train == 0 {
        return Err(Error::InvalidSplit {
            test_size,
            samples,
            train,
            test,
        });
    }

    let mut shuffled: Vec<(Vol, Vec<Float>)> = images.into_iter().zip(labels).collect();
    shuffled.shuffle(rng);

    let test_part = shuffled.split_off(train);
    let (train_images, train_labels) = shuffled.into_iter().unzip();
    let (test_images, test_labels) = test_part.into_iter().unzip();

    Ok(SplitDataset {
        train_images,
        test_images,
        train_labels,
        test_labels,
    })
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::{vol::Vol, Error};

    use super::{one_hot, train_test_split};

    fn samples(n: usize) -> (Vec<Vol>, Vec<Vec<f32>>) {
        let images = (0..n).map(|i| Vol::from(vec![i as f32])).collect();
        let labels = one_hot(&(0..n).map(|i| i % 3).collect::<Vec<_>>(), 3).unwrap();
        (images, labels)
    }

    #[test]
    fn one_hot_rows_sum_to_one() {
        let rows = one_hot(&[0, 2, 1, 2], 3).unwrap();
        assert_eq!(rows[1], vec![0.0, 0.0, 1.0]);
        for row in rows {
            assert_eq!(row.iter().sum::<f32>(), 1.0);
        }
    }

    #[test]
    fn one_hot_rejects_unknown_labels() {
        let err = one_hot(&[0, 3], 3).unwrap_err();
        assert!(matches!(
            err,
            Error::LabelOutOfRange {
                label: 3,
                categories: 3
            }
        ));
    }

    #[test]
    fn split_is_disjoint_and_exhaustive() {
        let (images, labels) = samples(10);
        let mut rng = StdRng::seed_from_u64(42);
        let split = train_test_split(images, labels, 0.4, &mut rng).unwrap();

        assert_eq!(split.train_images.len(), 6);
        assert_eq!(split.test_images.len(), 4);
        assert_eq!(split.train_labels.len(), 6);
        assert_eq!(split.test_labels.len(), 4);

        let mut seen: Vec<usize> = split
            .train_images
            .iter()
            .chain(&split.test_images)
            .map(|vol| vol.w[0] as usize)
            .collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        // labels travel with their image
        for (image, label) in split.train_images.iter().zip(&split.train_labels) {
            assert_eq!(label[image.w[0] as usize % 3], 1.0);
        }
    }

    #[test]
    fn test_count_rounds_up() {
        let (images, labels) = samples(7);
        let mut rng = StdRng::seed_from_u64(1);
        let split = train_test_split(images, labels, 0.4, &mut rng).unwrap();

        // 0.4 * 7 = 2.8
        assert_eq!(split.test_images.len(), 3);
        assert_eq!(split.train_images.len(), 4);
    }

    #[test]
    fn same_seed_same_split() {
        let (images, labels) = samples(20);
        let a = train_test_split(
            images.clone(),
            labels.clone(),
            0.4,
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        let b = train_test_split(images, labels, 0.4, &mut StdRng::seed_from_u64(3)).unwrap();

        let ids = |vols: &[Vol]| vols.iter().map(|v| v.w[0]).collect::<Vec<_>>();
        assert_eq!(ids(&a.test_images), ids(&b.test_images));
    }

    #[test]
    fn unequal_lengths_are_an_error() {
        let (images, mut labels) = samples(5);
        labels.pop();
        let err = train_test_split(images, labels, 0.4, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                images: 5,
                labels: 4
            }
        ));
    }

    #[test]
    fn too_few_samples_to_split() {
        let (images, labels) = samples(1);
        let err = train_test_split(images, labels, 0.4, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidSplit { train: 0, test: 1, .. }));
    }
}
