use std::{collections::BTreeMap, num::NonZeroUsize};

use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, Batches, Dataset, Validation, argmax_rows, one_hot};
use crate::error::{NnErr, Result};

/// A labeled sequence of characters, each given by its index in the alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub chars: Vec<usize>,
    pub label: usize,
}

impl Word {
    pub fn new(chars: Vec<usize>, label: usize) -> Self {
        Self { chars, label }
    }
}

/// A dataset of variable length words.
///
/// Batches only ever contain words of the same length. Their input is one `B x alphabet`
/// one-hot matrix per character position.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    train: Vec<Word>,
    dev: Vec<Word>,
    alphabet: usize,
    classes: usize,
    rng: Option<StdRng>,
}

fn check_words(words: &[Word], alphabet: usize, classes: usize) -> Result<()> {
    if words.is_empty() {
        return Err(NnErr::InvalidDataset("there are no words"));
    }

    for word in words {
        if word.chars.is_empty() {
            return Err(NnErr::InvalidDataset("words can't be empty"));
        }
        if word.chars.iter().any(|&c| c >= alphabet) {
            return Err(NnErr::InvalidDataset("character out of the alphabet"));
        }
        if word.label >= classes {
            return Err(NnErr::InvalidDataset("label out of range"));
        }
    }

    Ok(())
}

/// Groups the indices of `words` by word length.
fn buckets(words: &[Word]) -> BTreeMap<usize, Vec<usize>> {
    let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, word) in words.iter().enumerate() {
        buckets.entry(word.chars.len()).or_default().push(i);
    }
    buckets
}

/// One-hot encodes a group of words that share their length.
fn encode(words: &[&Word], alphabet: usize) -> Vec<Array2<f32>> {
    let len = words.first().map_or(0, |word| word.chars.len());

    (0..len)
        .map(|t| {
            let mut step = Array2::<f32>::zeros((words.len(), alphabet));
            for (row, word) in words.iter().enumerate() {
                step[[row, word.chars[t]]] = 1.;
            }
            step
        })
        .collect()
}

impl SequenceDataset {
    /// Creates a new `SequenceDataset`.
    ///
    /// # Arguments
    /// * `train` - The training words.
    /// * `dev` - The held-out words.
    /// * `alphabet` - The amount of distinct characters.
    /// * `classes` - The amount of labels.
    pub fn new(train: Vec<Word>, dev: Vec<Word>, alphabet: usize, classes: usize) -> Result<Self> {
        check_words(&train, alphabet, classes)?;
        check_words(&dev, alphabet, classes)?;

        Ok(Self {
            train,
            dev,
            alphabet,
            classes,
            rng: None,
        })
    }

    /// Makes every pass visit the words in a new random order.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    fn batch(&self, rows: &[usize]) -> Batch<Vec<Array2<f32>>> {
        let words: Vec<&Word> = rows.iter().map(|&i| &self.train[i]).collect();
        let labels: Vec<usize> = words.iter().map(|word| word.label).collect();

        Batch {
            x: encode(&words, self.alphabet),
            y: one_hot(&labels, self.classes),
        }
    }
}

impl Dataset for SequenceDataset {
    type Input = Vec<Array2<f32>>;

    fn len(&self) -> usize {
        self.train.len()
    }

    fn iterate_once(&mut self, batch_size: NonZeroUsize) -> Batches<'_, Vec<Array2<f32>>> {
        let mut groups = Vec::new();
        for mut indices in buckets(&self.train).into_values() {
            if let Some(rng) = self.rng.as_mut() {
                indices.shuffle(rng);
            }
            groups.extend(indices.chunks(batch_size.get()).map(<[usize]>::to_vec));
        }

        if let Some(rng) = self.rng.as_mut() {
            groups.shuffle(rng);
        }

        let this = &*self;
        Box::new(groups.into_iter().map(move |rows| this.batch(&rows)))
    }
}

impl Validation for SequenceDataset {
    fn validation_accuracy<F>(&self, mut predict: F) -> Result<f32>
    where
        F: FnMut(&Vec<Array2<f32>>) -> Result<Array2<f32>>,
    {
        let mut correct = 0;

        for indices in buckets(&self.dev).into_values() {
            let words: Vec<&Word> = indices.iter().map(|&i| &self.dev[i]).collect();
            let scores = predict(&encode(&words, self.alphabet))?;

            let expected = (words.len(), self.classes);
            if scores.dim() != expected {
                return Err(NnErr::ShapeMismatch {
                    op: "validation",
                    left: scores.dim(),
                    right: expected,
                });
            }

            correct += argmax_rows(scores.view())
                .into_iter()
                .zip(&words)
                .filter(|(predicted, word)| *predicted == word.label)
                .count();
        }

        Ok(correct as f32 / self.dev.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn words() -> Vec<Word> {
        vec![
            Word::new(vec![0, 1], 0),
            Word::new(vec![2], 1),
            Word::new(vec![1, 1], 1),
            Word::new(vec![2, 0, 1], 0),
            Word::new(vec![0], 0),
        ]
    }

    #[test]
    fn batches_share_word_length() {
        let mut ds = SequenceDataset::new(words(), words(), 3, 2).unwrap().shuffled(5);
        let batches: Vec<_> = ds.iterate_once(NonZeroUsize::new(4).unwrap()).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 5);
        for batch in &batches {
            assert!(batch.x.iter().all(|step| step.nrows() == batch.len()));
        }
    }

    #[test]
    fn words_are_one_hot_per_position() {
        let mut ds = SequenceDataset::new(words(), words(), 3, 2).unwrap();
        let batch = ds
            .iterate_once(NonZeroUsize::new(8).unwrap())
            .find(|batch| batch.x.len() == 3)
            .unwrap();

        assert_eq!(batch.x[0], array![[0., 0., 1.]]);
        assert_eq!(batch.x[1], array![[1., 0., 0.]]);
        assert_eq!(batch.x[2], array![[0., 1., 0.]]);
        assert_eq!(batch.y, array![[1., 0.]]);
    }

    #[test]
    fn accuracy_is_counted_over_every_bucket() {
        let ds = SequenceDataset::new(words(), words(), 3, 2).unwrap();
        // predicts class 1 exactly when the word ends in character 2
        let accuracy = ds
            .validation_accuracy(|xs| {
                let last = xs.last().unwrap();
                Ok(Array2::from_shape_fn((last.nrows(), 2), |(row, class)| {
                    let is_two = last[[row, 2]];
                    if class == 1 { is_two } else { 1. - is_two }
                }))
            })
            .unwrap();

        // [1, 1] is the only miss
        assert_eq!(accuracy, 4. / 5.);
    }

    #[test]
    fn empty_words_are_rejected() {
        let err = SequenceDataset::new(vec![Word::new(vec![], 0)], words(), 3, 2).unwrap_err();
        assert_eq!(err, NnErr::InvalidDataset("words can't be empty"));
    }
}
