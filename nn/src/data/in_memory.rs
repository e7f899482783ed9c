use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, Batches, Dataset};
use crate::error::{NnErr, Result};

/// A minimal in-memory dataset of row examples.
///
/// Row `i` of `x` is the input of example `i` and row `i` of `y` its target. Without a seed
/// the examples are always visited in storage order.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    x: Array2<f32>,
    y: Array2<f32>,
    order: Vec<usize>,
    rng: Option<StdRng>,
}

impl InMemoryDataset {
    /// Creates a new `InMemoryDataset`.
    ///
    /// # Arguments
    /// * `x` - The inputs, one example per row.
    /// * `y` - The targets, one example per row.
    ///
    /// # Returns
    /// An error if the amount of rows differ or there are no examples.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(NnErr::ShapeMismatch {
                op: "dataset",
                left: x.dim(),
                right: y.dim(),
            });
        }
        if x.nrows() == 0 {
            return Err(NnErr::InvalidDataset("there are no examples"));
        }

        Ok(Self {
            order: (0..x.nrows()).collect(),
            x,
            y,
            rng: None,
        })
    }

    /// Makes every pass visit the examples in a new random order.
    ///
    /// # Arguments
    /// * `seed` - The seed of the shuffling rng.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }
}

impl Dataset for InMemoryDataset {
    type Input = Array2<f32>;

    fn len(&self) -> usize {
        self.x.nrows()
    }

    fn iterate_once(&mut self, batch_size: NonZeroUsize) -> Batches<'_, Array2<f32>> {
        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }

        let Self { x, y, order, .. } = &*self;
        Box::new(order.chunks(batch_size.get()).map(move |rows| Batch {
            x: x.select(Axis(0), rows),
            y: y.select(Axis(0), rows),
        }))
    }
}
