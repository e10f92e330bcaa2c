use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use image::{ImageReader, Rgb, RgbImage};
use log::{debug, info, warn};

use crate::{vol::Vol, Config, Error, Result};

/// Images and their integer labels, in directory traversal order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub images: Vec<Vol>,
    pub labels: Vec<usize>,
    pub categories: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Loads every image under `data_dir`.
///
/// `data_dir` holds one directory per category, named `0` through `C - 1`,
/// where `C` is `config.categories`. Every file inside a category directory
/// is decoded as an image and resized to `image_width x image_height` RGB.
pub fn load_data(data_dir: &Path, config: &Config) -> Result<Dataset> {
    let categories = category_dirs(data_dir)?;
    if categories.len() != config.categories {
        return Err(Error::CategoryMismatch {
            expected: config.categories,
            found: categories.len(),
        });
    }

    let mut images = Vec::new();
    let mut labels = Vec::new();
    for (label, dir) in categories.iter().enumerate() {
        let files = image_files(dir)?;
        debug!("category {label}: {} images in {}", files.len(), dir.display());

        for path in files {
            images.push(load_image(&path, config.image_width, config.image_height)?);
            labels.push(label);
        }
    }

    if images.is_empty() {
        return Err(Error::EmptyDataset(data_dir.to_path_buf()));
    }

    info!(
        "loaded {} images in {} categories from {}",
        images.len(),
        categories.len(),
        data_dir.display()
    );

    Ok(Dataset {
        images,
        labels,
        categories: categories.len(),
    })
}

/// Decodes one image and stretches it to `width x height`.
pub fn load_image(path: &Path, width: u32, height: u32) -> Result<Vol> {
    let decode = |source| Error::Decode {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .map_err(|source| Error::io(path, source))?
        .with_guessed_format()
        .map_err(|source| Error::io(path, source))?
        .decode()
        .map_err(decode)?;

    let rgb = resize_area(&img.to_rgb8(), width, height);
    Ok(Vol::from_rgb_image(rgb.as_raw(), width, height))
}

/// Area resampling: every target pixel is the mean of the source region it
/// covers, partially covered source pixels weighted by the covered fraction.
///
/// Aspect ratio is not preserved.
pub fn resize_area(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    let xs = area_weights(img.width(), width);
    let ys = area_weights(img.height(), height);

    RgbImage::from_fn(width, height, |x, y| {
        let mut sum = [0.0f64; 3];
        for &(sy, wy) in &ys[y as usize] {
            for &(sx, wx) in &xs[x as usize] {
                let pixel = img.get_pixel(sx, sy);
                for (acc, &c) in sum.iter_mut().zip(&pixel.0) {
                    *acc += wy * wx * f64::from(c);
                }
            }
        }
        Rgb(sum.map(|c| c.round().clamp(0.0, 255.0) as u8))
    })
}

// for every target index, the source indices it overlaps and the overlapped
// fraction of the target pixel; each list sums to one
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = f64::from(src) / f64::from(dst);

    (0..dst)
        .map(|i| {
            let start = f64::from(i) * scale;
            let end = start + scale;
            (start.floor() as u32..src)
                .take_while(|&s| f64::from(s) < end)
                .filter_map(|s| {
                    let covered = end.min(f64::from(s + 1)) - start.max(f64::from(s));
                    (covered > 0.0).then_some((s, covered / scale))
                })
                .collect()
        })
        .collect()
}

// category directories indexed by label, checked to be 0..C without gaps
fn category_dirs(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut by_label: BTreeMap<usize, (String, PathBuf)> = BTreeMap::new();

    for entry in read_dir(data_dir)? {
        let path = entry.path();
        if !path.is_dir() {
            warn!("skipping {}, not a category directory", path.display());
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let label: usize = name
            .parse()
            .map_err(|_| Error::InvalidLabelName { name: name.clone() })?;

        if let Some((first, _)) = by_label.get(&label) {
            let (first, second) = if *first < name {
                (first.clone(), name)
            } else {
                (name, first.clone())
            };
            return Err(Error::DuplicateLabel {
                label,
                first,
                second,
            });
        }
        by_label.insert(label, (name, path));
    }

    let found = by_label.len();
    if let Some(missing) = (0..found).find(|label| !by_label.contains_key(label)) {
        return Err(Error::NonContiguousLabels { found, missing });
    }

    Ok(by_label.into_values().map(|(_, path)| path).collect())
}

// files of a category, sorted by name so that loading order is stable
fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in read_dir(dir)? {
        let path = entry.path();
        if path.is_dir() {
            warn!("skipping nested directory {}", path.display());
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    fs::read_dir(dir)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(|source| Error::io(dir, source))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use image::{Rgb, RgbImage};

    use crate::{Config, Error};

    use super::{area_weights, category_dirs, load_image, resize_area};

    fn mkdirs(root: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir(root.join(name)).unwrap();
        }
    }

    #[test]
    fn categories_are_ordered_numerically() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["10", "2", "0", "1", "3", "4", "5", "6", "7", "8", "9"]);

        let dirs = category_dirs(temp.path()).unwrap();
        assert_eq!(dirs.len(), 11);
        assert!(dirs[2].ends_with("2"));
        assert!(dirs[10].ends_with("10"));
    }

    #[test]
    fn stray_files_in_the_root_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["0", "1"]);
        fs::write(temp.path().join("README"), "signs").unwrap();

        assert_eq!(category_dirs(temp.path()).unwrap().len(), 2);
    }

    #[test]
    fn non_numeric_names_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["0", "stop"]);

        let err = category_dirs(temp.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidLabelName { name } if name == "stop"));
    }

    #[test]
    fn gaps_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["0", "1", "3"]);

        let err = category_dirs(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::NonContiguousLabels {
                found: 3,
                missing: 2
            }
        ));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["0", "1", "01"]);

        let err = category_dirs(temp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel { label: 1, .. }));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = category_dirs(&temp.path().join("gtsrb")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("gtsrb"));
    }

    #[test]
    fn images_are_stretched_to_the_target_box() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wide.png");
        RgbImage::from_pixel(64, 16, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let config = Config::default();
        let vol = load_image(&path, config.image_width, config.image_height).unwrap();
        assert_eq!(vol.shape(), (30, 30, 3));
        assert!((vol.get(15, 15, 0) - 10.0).abs() <= 1.0);
        assert!((vol.get(0, 29, 2) - 30.0).abs() <= 1.0);
    }

    #[test]
    fn shrinking_averages_whole_blocks() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("split.png");
        let img = RgbImage::from_fn(60, 60, |x, _| {
            if x < 30 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        img.save(&path).unwrap();

        let vol = load_image(&path, 30, 30).unwrap();
        let row: Vec<f32> = (12..18).map(|x| vol.get(x, 15, 0)).collect();
        assert_eq!(row, vec![0.0, 0.0, 0.0, 255.0, 255.0, 255.0]);
    }

    #[test]
    fn partially_covered_pixels_are_weighted() {
        let img = RgbImage::from_fn(3, 1, |x, _| Rgb([(x * 90) as u8, 0, 0]));
        let out = resize_area(&img, 2, 1);

        // [0, 1.5) covers 0 fully and half of 90, [1.5, 3) half of 90 and 180
        assert_eq!(out.get_pixel(0, 0).0[0], 30);
        assert_eq!(out.get_pixel(1, 0).0[0], 150);
    }

    #[test]
    fn area_weights_sum_to_one() {
        for (src, dst) in [(64, 30), (16, 30), (30, 30), (7, 3)] {
            for weights in area_weights(src, dst) {
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                assert!((total - 1.0).abs() < 1e-9, "{src} -> {dst}: {total}");
            }
        }
    }

    #[test]
    fn format_is_guessed_from_content() {
        let temp = tempfile::tempdir().unwrap();
        let png = temp.path().join("sign.png");
        RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])).save(&png).unwrap();
        let unnamed = temp.path().join("sign.data");
        fs::rename(&png, &unnamed).unwrap();

        assert_eq!(load_image(&unnamed, 10, 12).unwrap().shape(), (10, 12, 3));
    }

    #[test]
    fn undecodable_files_are_errors() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "not an image").unwrap();

        let err = load_image(&path, 30, 30).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err:?}");
    }
}
