use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use crate::param::ParamId;

/// The gradients of a loss, keyed by the parameter they belong to.
#[derive(Debug, Clone, Default)]
pub struct Gradients {
    grads: BTreeMap<ParamId, Array2<f32>>,
}

impl Gradients {
    pub(crate) fn insert(&mut self, id: ParamId, grad: Array2<f32>) {
        self.grads.insert(id, grad);
    }

    /// Gives a view of the gradient of a parameter, if it took part in the computation.
    pub fn get(&self, id: ParamId) -> Option<ArrayView2<'_, f32>> {
        self.grads.get(&id).map(|grad| grad.view())
    }

    /// Takes out the gradient of a parameter, so that applying the rest leaves it untouched.
    pub fn remove(&mut self, id: ParamId) -> Option<Array2<f32>> {
        self.grads.remove(&id)
    }

    /// Iterates the gradients in parameter creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &Array2<f32>)> {
        self.grads.iter().map(|(&id, grad)| (id, grad))
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    /// Returns the euclidean norm of all the gradients stacked together.
    pub fn norm(&self) -> f32 {
        self.grads
            .values()
            .flat_map(|grad| grad.iter())
            .map(|g| g * g)
            .sum::<f32>()
            .sqrt()
    }
}
