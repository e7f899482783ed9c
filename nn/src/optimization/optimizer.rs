use ndarray::{ArrayView2, ArrayViewMut2};

/// A learning rule that turns a gradient into a parameter update.
pub trait Optimizer {
    /// Updates `params` in place given the gradient of the loss with respect to them.
    ///
    /// # Arguments
    /// * `params` - The parameter that is going to be modified.
    /// * `grad` - The gradient, it has the same shape as `params`.
    fn update_params(&mut self, params: ArrayViewMut2<'_, f32>, grad: ArrayView2<'_, f32>);
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn update_params(&mut self, params: ArrayViewMut2<'_, f32>, grad: ArrayView2<'_, f32>) {
        (**self).update_params(params, grad)
    }
}
