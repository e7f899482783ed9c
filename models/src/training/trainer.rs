use std::num::NonZeroUsize;

use log::{debug, info};
use nn::{
    NnErr, Result,
    data::{Batch, Dataset, Validation},
    optimization::{GradientDescent, Optimizer},
};

use super::{TrainReport, TrainState};
use crate::{config::TrainingConfig, model::Model};

/// Trains `Model`s by mini-batch gradient descent until a threshold is crossed.
///
/// The threshold is only ever checked once a full epoch is over.
#[derive(Debug, Clone)]
pub struct GradientTrainer<O: Optimizer> {
    optimizer: O,
    batch_size: NonZeroUsize,
    threshold: f32,
    max_epochs: Option<NonZeroUsize>,
}

impl GradientTrainer<GradientDescent> {
    /// Returns a gradient descent `GradientTrainer` with the given hyperparameters.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(
            GradientDescent::new(config.learning_rate),
            config.batch_size,
            config.threshold,
            config.max_epochs,
        )
    }
}

impl<O: Optimizer> GradientTrainer<O> {
    /// Returns a new `GradientTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - Turns every batch gradient into a parameter update.
    /// * `batch_size` - The maximum amount of examples per batch.
    /// * `threshold` - The loss to go below or the accuracy to reach.
    /// * `max_epochs` - The amount of epochs after which training gives up, if any.
    pub fn new(
        optimizer: O,
        batch_size: NonZeroUsize,
        threshold: f32,
        max_epochs: Option<NonZeroUsize>,
    ) -> Self {
        Self {
            optimizer,
            batch_size,
            threshold,
            max_epochs,
        }
    }

    fn out_of_epochs(&self, epochs: usize) -> bool {
        self.max_epochs.is_some_and(|max| epochs >= max.get())
    }

    fn step<M: Model>(
        &mut self,
        model: &mut M,
        batch: &Batch<M::Input>,
        report: &mut TrainReport,
        skip_below: Option<f32>,
    ) -> Result<f32> {
        if batch.is_empty() {
            return Err(NnErr::InvalidDataset("a pass yielded an empty batch"));
        }

        let (loss, mut grads) = model.loss_and_gradients(&batch.x, batch.y.view())?;
        report.last_loss = Some(loss);

        if skip_below.is_some_and(|threshold| loss < threshold) {
            debug!(loss = loss; "batch already below threshold, skipping update");
            return Ok(loss);
        }

        for id in model.frozen() {
            grads.remove(id);
        }
        model.params_mut().apply(&grads, &mut self.optimizer)?;
        report.updates += 1;
        debug!(loss = loss, grad_norm = grads.norm(); "applied batch update");
        Ok(loss)
    }

    /// Trains `model` until the loss of the last batch of an epoch is below the threshold.
    ///
    /// Batches whose loss is already below the threshold don't update the parameters. Only the
    /// last batch of each epoch decides whether training goes on, no full-dataset loss is ever
    /// computed.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `dataset` - The examples to train with.
    pub fn train_until_loss<M, D>(&mut self, model: &mut M, dataset: &mut D) -> Result<TrainReport>
    where
        M: Model,
        D: Dataset<Input = M::Input>,
    {
        let mut report = TrainReport::default();

        loop {
            let mut last = None;
            for batch in dataset.iterate_once(self.batch_size) {
                last = Some(self.step(model, &batch, &mut report, Some(self.threshold))?);
            }

            let loss = last.ok_or(NnErr::InvalidDataset("a pass yielded no batches"))?;
            report.epochs += 1;
            info!(epoch = report.epochs, loss = loss; "epoch finished");

            if loss < self.threshold {
                report.state = TrainState::Converged;
                return Ok(report);
            }
            if self.out_of_epochs(report.epochs) {
                return Ok(report);
            }
        }
    }

    /// Trains `model` until the held-out accuracy measured after an epoch reaches the
    /// threshold.
    ///
    /// # Arguments
    /// * `model` - The model to train, its outputs are read as class scores.
    /// * `dataset` - The examples to train and validate with.
    pub fn train_until_accuracy<M, D>(
        &mut self,
        model: &mut M,
        dataset: &mut D,
    ) -> Result<TrainReport>
    where
        M: Model,
        D: Validation<Input = M::Input>,
    {
        let mut report = TrainReport::default();

        loop {
            for batch in dataset.iterate_once(self.batch_size) {
                self.step(model, &batch, &mut report, None)?;
            }

            let accuracy = dataset.validation_accuracy(|x| model.run(x))?;
            report.epochs += 1;
            report.validation_accuracy = Some(accuracy);
            info!(
                epoch = report.epochs,
                loss = report.last_loss.unwrap_or(f32::NAN),
                accuracy = accuracy;
                "epoch finished"
            );

            if accuracy >= self.threshold {
                report.state = TrainState::Converged;
                return Ok(report);
            }
            if self.out_of_epochs(report.epochs) {
                return Ok(report);
            }
        }
    }
}
