use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2};

use super::{Batches, Dataset, InMemoryDataset, Validation, argmax_rows, one_hot};
use crate::error::{NnErr, Result};

/// A classification dataset with a held-out split.
///
/// Training targets are one-hot rows; held-out labels are kept as class indices.
#[derive(Debug, Clone)]
pub struct ClassificationDataset {
    train: InMemoryDataset,
    dev_x: Array2<f32>,
    dev_labels: Vec<usize>,
    classes: usize,
}

fn check_labels(labels: &[usize], classes: usize) -> Result<()> {
    if labels.iter().any(|&label| label >= classes) {
        return Err(NnErr::InvalidDataset("label out of range"));
    }
    Ok(())
}

impl ClassificationDataset {
    /// Creates a new `ClassificationDataset`.
    ///
    /// # Arguments
    /// * `train_x` - The training inputs, one example per row.
    /// * `train_labels` - The class of every training example.
    /// * `dev_x` - The held-out inputs, one example per row.
    /// * `dev_labels` - The class of every held-out example.
    /// * `classes` - The amount of classes.
    pub fn new(
        train_x: Array2<f32>,
        train_labels: &[usize],
        dev_x: Array2<f32>,
        dev_labels: Vec<usize>,
        classes: usize,
    ) -> Result<Self> {
        check_labels(train_labels, classes)?;
        check_labels(&dev_labels, classes)?;

        if dev_x.nrows() != dev_labels.len() {
            return Err(NnErr::InvalidDataset(
                "held-out inputs and labels differ in length",
            ));
        }
        if dev_labels.is_empty() {
            return Err(NnErr::InvalidDataset("there are no held-out examples"));
        }
        if dev_x.ncols() != train_x.ncols() {
            return Err(NnErr::ShapeMismatch {
                op: "dataset",
                left: train_x.dim(),
                right: dev_x.dim(),
            });
        }

        let train = InMemoryDataset::new(train_x, one_hot(train_labels, classes))?;

        Ok(Self {
            train,
            dev_x,
            dev_labels,
            classes,
        })
    }

    /// Makes every training pass visit the examples in a new random order.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.train = self.train.shuffled(seed);
        self
    }

    pub fn dev_x(&self) -> ArrayView2<'_, f32> {
        self.dev_x.view()
    }
}

impl Dataset for ClassificationDataset {
    type Input = Array2<f32>;

    fn len(&self) -> usize {
        self.train.len()
    }

    fn iterate_once(&mut self, batch_size: NonZeroUsize) -> Batches<'_, Array2<f32>> {
        self.train.iterate_once(batch_size)
    }
}

impl Validation for ClassificationDataset {
    fn validation_accuracy<F>(&self, mut predict: F) -> Result<f32>
    where
        F: FnMut(&Array2<f32>) -> Result<Array2<f32>>,
    {
        let scores = predict(&self.dev_x)?;
        let expected = (self.dev_labels.len(), self.classes);
        if scores.dim() != expected {
            return Err(NnErr::ShapeMismatch {
                op: "validation",
                left: scores.dim(),
                right: expected,
            });
        }

        let correct = argmax_rows(scores.view())
            .into_iter()
            .zip(&self.dev_labels)
            .filter(|(predicted, label)| predicted == *label)
            .count();

        Ok(correct as f32 / self.dev_labels.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn dataset() -> ClassificationDataset {
        ClassificationDataset::new(
            array![[1., 0.], [0., 1.], [1., 1.]],
            &[0, 1, 1],
            array![[1., 0.], [0., 1.], [0., 0.], [2., 0.]],
            vec![0, 1, 1, 0],
            2,
        )
        .unwrap()
    }

    #[test]
    fn training_targets_are_one_hot() {
        let mut ds = dataset();
        let batch = ds.iterate_once(NonZeroUsize::new(3).unwrap()).next().unwrap();
        assert_eq!(batch.y, array![[1., 0.], [0., 1.], [0., 1.]]);
    }

    #[test]
    fn accuracy_counts_argmax_hits() {
        let ds = dataset();
        // predicts the first feature as class 0's score and the second as class 1's
        let accuracy = ds.validation_accuracy(|x| Ok(x.clone())).unwrap();
        assert_eq!(accuracy, 0.75);
    }

    #[test]
    fn accuracy_checks_score_shape() {
        let ds = dataset();
        let err = ds
            .validation_accuracy(|x| Ok(Array2::zeros((x.nrows(), 3))))
            .unwrap_err();
        assert!(matches!(err, NnErr::ShapeMismatch { op: "validation", .. }));
    }

    #[test]
    fn out_of_range_labels_are_rejected() {
        let err = ClassificationDataset::new(
            array![[1.]],
            &[2],
            array![[1.]],
            vec![0],
            2,
        )
        .unwrap_err();
        assert_eq!(err, NnErr::InvalidDataset("label out of range"));
    }
}
