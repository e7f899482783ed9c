mod classification;
mod dataset;
mod in_memory;
mod sequence;
pub mod synthetic;

pub use classification::ClassificationDataset;
pub use dataset::{Batch, Batches, Dataset, Validation, argmax_rows, one_hot};
pub use in_memory::InMemoryDataset;
pub use sequence::{SequenceDataset, Word};
