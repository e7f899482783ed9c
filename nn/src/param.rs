use ndarray::{Array2, ArrayView2};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::{
    error::{NnErr, Result},
    graph::Gradients,
    optimization::Optimizer,
};

/// Identifies a parameter inside the `ParamSet` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(usize);

impl ParamId {
    /// Returns the position of this parameter inside its set.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The trainable parameters of a single model.
///
/// Every parameter keeps the shape it was created with for its entire life, the set only ever
/// mutates values in place.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    params: Vec<Array2<f32>>,
}

impl ParamSet {
    /// Creates a new empty `ParamSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new trainable parameter of shape `rows x cols`.
    ///
    /// Values are sampled uniformly from `[-l, l)` where `l = sqrt(3 / mean(rows, cols))`.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows of the parameter.
    /// * `cols` - The amount of columns of the parameter.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// The id of the new parameter or an error if the shape is empty.
    pub fn parameter<R: Rng + ?Sized>(
        &mut self,
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Result<ParamId> {
        if rows == 0 || cols == 0 {
            return Err(NnErr::InvalidParameter { rows, cols });
        }

        let limit = (3. / ((rows + cols) as f32 / 2.)).sqrt();
        let distribution =
            Uniform::new(-limit, limit).map_err(|_| NnErr::InvalidParameter { rows, cols })?;

        Ok(self.push(Array2::random_using((rows, cols), distribution, rng)))
    }

    /// Adds an already initialized parameter to the set.
    ///
    /// # Arguments
    /// * `value` - The initial value of the parameter.
    ///
    /// # Returns
    /// The id of the new parameter or an error if the value is empty.
    pub fn from_value(&mut self, value: Array2<f32>) -> Result<ParamId> {
        let (rows, cols) = value.dim();
        if rows == 0 || cols == 0 {
            return Err(NnErr::InvalidParameter { rows, cols });
        }

        Ok(self.push(value))
    }

    fn push(&mut self, value: Array2<f32>) -> ParamId {
        self.params.push(value);
        ParamId(self.params.len() - 1)
    }

    /// Returns the amount of parameters in the set.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the ids of every parameter in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ParamId> + use<> {
        (0..self.params.len()).map(ParamId)
    }

    /// Returns the total amount of scalars held by the set.
    pub fn size(&self) -> usize {
        self.params.iter().map(|param| param.len()).sum()
    }

    /// Gives a view of the current value of a parameter.
    pub fn value(&self, id: ParamId) -> Result<ArrayView2<'_, f32>> {
        self.get(id).map(|param| param.view())
    }

    pub fn shape(&self, id: ParamId) -> Result<(usize, usize)> {
        self.get(id).map(|param| param.dim())
    }

    fn get(&self, id: ParamId) -> Result<&Array2<f32>> {
        self.params.get(id.0).ok_or(NnErr::UnknownParameter {
            id: id.0,
            len: self.params.len(),
        })
    }

    fn get_mut(&mut self, id: ParamId) -> Result<&mut Array2<f32>> {
        let len = self.params.len();
        self.params
            .get_mut(id.0)
            .ok_or(NnErr::UnknownParameter { id: id.0, len })
    }

    /// Updates a parameter in place: `param += multiplier * direction`.
    ///
    /// # Arguments
    /// * `id` - The parameter to update.
    /// * `direction` - The direction of the step, must have the parameter's shape.
    /// * `multiplier` - The length of the step.
    pub fn update(
        &mut self,
        id: ParamId,
        direction: ArrayView2<'_, f32>,
        multiplier: f32,
    ) -> Result<()> {
        let param = self.get_mut(id)?;
        if param.dim() != direction.dim() {
            return Err(NnErr::ShapeMismatch {
                op: "update",
                left: param.dim(),
                right: direction.dim(),
            });
        }

        param.scaled_add(multiplier, &direction);
        Ok(())
    }

    /// Applies the optimizer to every parameter that has a gradient.
    ///
    /// Parameters absent from `grads` did not take part in the computation and are left as is.
    /// Every gradient is checked before any parameter is touched, so on error the set is left
    /// unchanged.
    ///
    /// # Arguments
    /// * `grads` - The gradients of a loss with respect to the parameters of this set.
    /// * `optimizer` - The optimizer that dictates how each step is taken.
    pub fn apply<O: Optimizer + ?Sized>(&mut self, grads: &Gradients, optimizer: &mut O) -> Result<()> {
        for (id, grad) in grads.iter() {
            let param = self.get(id)?;
            if param.dim() != grad.dim() {
                return Err(NnErr::ShapeMismatch {
                    op: "apply",
                    left: param.dim(),
                    right: grad.dim(),
                });
            }
        }

        for (id, grad) in grads.iter() {
            let param = self.get_mut(id)?;
            optimizer.update_params(param.view_mut(), grad.view());
        }

        Ok(())
    }
}
