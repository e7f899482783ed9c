use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::Result;

/// A supervised batch: inputs and their targets share the leading batch dimension.
#[derive(Debug, Clone)]
pub struct Batch<X> {
    pub x: X,
    pub y: Array2<f32>,
}

impl<X> Batch<X> {
    /// Returns the amount of examples in the batch.
    pub fn len(&self) -> usize {
        self.y.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.y.nrows() == 0
    }
}

/// The batches of a single pass over a dataset.
pub type Batches<'a, X> = Box<dyn Iterator<Item = Batch<X>> + 'a>;

/// A source of training batches.
pub trait Dataset {
    /// The input type of every batch.
    type Input;

    /// Returns the amount of training examples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the whole dataset exactly once.
    ///
    /// The yielded batches don't overlap and together cover every example. Every call starts a
    /// fresh pass; datasets may change the order of the examples between passes.
    ///
    /// # Arguments
    /// * `batch_size` - The maximum size of each batch, only the last one can be smaller.
    fn iterate_once(&mut self, batch_size: NonZeroUsize) -> Batches<'_, Self::Input>;
}

/// A dataset that holds out a labeled split for measuring accuracy.
pub trait Validation: Dataset {
    /// Measures the fraction of held-out examples whose highest scoring class is the right one.
    ///
    /// # Arguments
    /// * `predict` - Maps a held-out input to a `B x classes` matrix of scores.
    ///
    /// # Returns
    /// The accuracy in `[0, 1]`, or the first error `predict` returned.
    fn validation_accuracy<F>(&self, predict: F) -> Result<f32>
    where
        F: FnMut(&Self::Input) -> Result<Array2<f32>>;
}

/// Returns the index of the highest score of every row.
pub fn argmax_rows(scores: ArrayView2<'_, f32>) -> Vec<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 { (i, v) } else { best }
                })
                .0
        })
        .collect()
}

/// Builds a `rows x classes` matrix with a single one per row at the given class.
pub fn one_hot(classes: &[usize], width: usize) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((classes.len(), width));
    for (row, &class) in classes.iter().enumerate() {
        out[[row, class]] = 1.;
    }
    out
}
