//! Small generated problems with a known solution.
//!
//! Every generator is deterministic given its rng, so seeded runs are reproducible.

use std::f32::consts::PI;

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{StandardNormal, Uniform};

use super::{ClassificationDataset, InMemoryDataset, SequenceDataset, Word};
use crate::error::{NnErr, Result};

/// The amount of features of a digit image, a flattened 28x28 grid.
pub const DIGIT_FEATURES: usize = 784;

/// The amount of digit classes.
pub const DIGIT_CLASSES: usize = 10;

const MARGIN: f32 = 0.1;
const PIXEL_NOISE: f32 = 0.4;
const CHAR_NOISE: f64 = 0.1;

/// Samples `n` points of the `[-1, 1]^dims` cube labeled `+1` or `-1` by the side of a random
/// hyperplane through the origin they fall on.
///
/// Points closer than a fixed margin to the hyperplane are resampled, so the perceptron
/// procedure is guaranteed to converge on the result.
pub fn linearly_separable<R: Rng + ?Sized>(
    n: usize,
    dims: usize,
    rng: &mut R,
) -> Result<InMemoryDataset> {
    if dims == 0 {
        return Err(NnErr::InvalidDataset("points need at least one dimension"));
    }

    let normal: Array1<f32> = Array1::random_using(dims, StandardNormal, rng);
    let norm = normal.dot(&normal).sqrt().max(f32::EPSILON);
    let normal = normal.mapv(|v| v / norm);

    let cube = Uniform::new(-1f32, 1.).map_err(|_| NnErr::InvalidDataset("empty sampling range"))?;
    let mut x = Array2::<f32>::zeros((n, dims));
    let mut y = Array2::<f32>::zeros((n, 1));

    for (mut row, label) in x.axis_iter_mut(Axis(0)).zip(y.iter_mut()) {
        let (point, side) = loop {
            let point: Array1<f32> = Array1::random_using(dims, &cube, rng);
            let side = point.dot(&normal);
            if side.abs() >= MARGIN {
                break (point, side);
            }
        };

        row.assign(&point);
        *label = if side >= 0. { 1. } else { -1. };
    }

    InMemoryDataset::new(x, y)
}

/// Samples `sin(x)` at `n` evenly spaced points of `[-2π, 2π]`.
pub fn sine(n: usize) -> Result<InMemoryDataset> {
    let x = Array1::linspace(-2. * PI, 2. * PI, n).insert_axis(Axis(1));
    let y = x.mapv(f32::sin);
    InMemoryDataset::new(x, y)
}

/// Generates noisy digit-like images.
///
/// Every class lights up its own band of pixels and every pixel gets uniform noise on top,
/// clamped to `[0, 1]`. Classes are assigned round robin, so all of them show up whenever
/// there are at least ten examples.
pub fn digit_blobs<R: Rng + ?Sized>(
    n_train: usize,
    n_dev: usize,
    rng: &mut R,
) -> Result<ClassificationDataset> {
    let (train_x, train_labels) = blobs(n_train, rng)?;
    let (dev_x, dev_labels) = blobs(n_dev, rng)?;
    ClassificationDataset::new(train_x, &train_labels, dev_x, dev_labels, DIGIT_CLASSES)
}

fn blobs<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<(Array2<f32>, Vec<usize>)> {
    let band = DIGIT_FEATURES / DIGIT_CLASSES;
    let noise = Uniform::new(-PIXEL_NOISE, PIXEL_NOISE)
        .map_err(|_| NnErr::InvalidDataset("empty sampling range"))?;

    let labels: Vec<usize> = (0..n).map(|i| i % DIGIT_CLASSES).collect();
    let mut x = Array2::random_using((n, DIGIT_FEATURES), noise, rng);

    for (mut row, &label) in x.axis_iter_mut(Axis(0)).zip(&labels) {
        for (pixel, v) in row.indexed_iter_mut() {
            let lit = if pixel / band == label { 1. } else { 0. };
            *v = (*v + lit).clamp(0., 1.);
        }
    }

    Ok((x, labels))
}

/// Generates words of `1..=max_len` characters for a language identification task.
///
/// Every class owns a disjoint range of `alphabet / classes` characters and its words are drawn
/// from it, except for the occasional character drawn from the whole alphabet.
pub fn language_words<R: Rng + ?Sized>(
    n_train: usize,
    n_dev: usize,
    alphabet: usize,
    classes: usize,
    max_len: usize,
    rng: &mut R,
) -> Result<SequenceDataset> {
    if classes == 0 || alphabet < classes {
        return Err(NnErr::InvalidDataset(
            "every class needs at least one character of its own",
        ));
    }
    if max_len == 0 {
        return Err(NnErr::InvalidDataset("words can't be empty"));
    }

    let mut words = |n: usize| -> Vec<Word> {
        let per_class = alphabet / classes;
        (0..n)
            .map(|i| {
                let label = i % classes;
                let len = rng.random_range(1..=max_len);
                let chars = (0..len)
                    .map(|_| {
                        if rng.random_bool(CHAR_NOISE) {
                            rng.random_range(0..alphabet)
                        } else {
                            label * per_class + rng.random_range(0..per_class)
                        }
                    })
                    .collect();

                Word::new(chars, label)
            })
            .collect()
    };

    let train = words(n_train);
    let dev = words(n_dev);
    SequenceDataset::new(train, dev, alphabet, classes)
}
