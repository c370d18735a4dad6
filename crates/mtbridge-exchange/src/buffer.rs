use crate::error::Result;
use crate::marshal::{copy_into, copy_texts_into, TextSlot};

/// Current lengths of the three sequences of an [`ExchangeBuffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferSizes {
    pub ints: usize,
    pub reals: usize,
    pub texts: usize,
}

/// The unit of data moved in one exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeBuffer {
    ints: Vec<i64>,
    reals: Vec<f64>,
    texts: Vec<String>,
}

impl ExchangeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer from its three sequences.
    pub fn from_parts(ints: Vec<i64>, reals: Vec<f64>, texts: Vec<String>) -> Self {
        Self { ints, reals, texts }
    }

    pub fn sizes(&self) -> BufferSizes {
        BufferSizes {
            ints: self.ints.len(),
            reals: self.reals.len(),
            texts: self.texts.len(),
        }
    }

    /// True when all three sequences are empty.
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.reals.is_empty() && self.texts.is_empty()
    }

    pub fn ints(&self) -> &[i64] {
        &self.ints
    }

    pub fn reals(&self) -> &[f64] {
        &self.reals
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Replace the integer sequence. An empty slice clears it.
    pub fn set_ints(&mut self, values: &[i64]) {
        self.ints.clear();
        self.ints.extend_from_slice(values);
    }

    /// Replace the real sequence. An empty slice clears it.
    pub fn set_reals(&mut self, values: &[f64]) {
        self.reals.clear();
        self.reals.extend_from_slice(values);
    }

    /// Replace the text sequence. An empty input clears it.
    pub fn set_texts<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texts.clear();
        self.texts.extend(values.into_iter().map(Into::into));
    }

    /// Copy the integers into `dest`; see [`copy_into`].
    pub fn copy_ints(&self, dest: &mut [i64]) -> Result<usize> {
        copy_into(&self.ints, dest)
    }

    /// Copy the reals into `dest`; see [`copy_into`].
    pub fn copy_reals(&self, dest: &mut [f64]) -> Result<usize> {
        copy_into(&self.reals, dest)
    }

    /// Copy the texts into caller slots; see [`copy_texts_into`].
    pub fn copy_texts(&self, dest: &mut [TextSlot<'_>]) -> Result<usize> {
        copy_texts_into(&self.texts, dest)
    }

    /// Replace the whole triple with `other`.
    pub fn replace(&mut self, other: ExchangeBuffer) {
        *self = other;
    }

    /// Empty all three sequences.
    pub fn clear(&mut self) {
        self.ints.clear();
        self.reals.clear();
        self.texts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;

    #[test]
    fn setters_then_getters_reproduce_sequences() {
        let mut buffer = ExchangeBuffer::new();
        buffer.set_ints(&[3, -1, 7]);
        buffer.set_reals(&[0.25, -8.5]);
        buffer.set_texts(["EURUSD", "", "H1"]);

        let sizes = buffer.sizes();
        assert_eq!(
            sizes,
            BufferSizes {
                ints: 3,
                reals: 2,
                texts: 3
            }
        );

        let mut ints = vec![0i64; sizes.ints];
        let mut reals = vec![0f64; sizes.reals];
        assert_eq!(buffer.copy_ints(&mut ints).unwrap(), 3);
        assert_eq!(buffer.copy_reals(&mut reals).unwrap(), 2);
        assert_eq!(ints, [3, -1, 7]);
        assert_eq!(reals, [0.25, -8.5]);

        let mut storage = vec![[0u8; 16]; sizes.texts];
        let mut slots: Vec<TextSlot<'_>> = storage.iter_mut().map(|b| TextSlot::new(b)).collect();
        assert_eq!(buffer.copy_texts(&mut slots).unwrap(), 3);
        let lens: Vec<usize> = slots.iter().map(TextSlot::written_len).collect();
        assert_eq!(lens, [7, 1, 3]);
    }

    #[test]
    fn setters_replace_wholesale_and_empty_input_clears() {
        let mut buffer = ExchangeBuffer::from_parts(vec![1, 2, 3], vec![1.0], vec!["a".into()]);

        buffer.set_ints(&[9]);
        assert_eq!(buffer.ints(), [9]);

        buffer.set_reals(&[]);
        buffer.set_texts(Vec::<String>::new());
        assert!(buffer.reals().is_empty());
        assert!(buffer.texts().is_empty());
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn getters_on_empty_buffer_copy_nothing() {
        let buffer = ExchangeBuffer::new();
        let mut ints = [5i64; 2];
        assert_eq!(buffer.copy_ints(&mut ints).unwrap(), 0);
        assert_eq!(ints, [5, 5]);
        assert_eq!(buffer.copy_texts(&mut []).unwrap(), 0);
    }

    #[test]
    fn undersized_getter_destination_is_reported() {
        let buffer = ExchangeBuffer::from_parts(vec![], vec![1.0, 2.0, 3.0], vec![]);
        let mut reals = [0f64; 1];
        assert!(matches!(
            buffer.copy_reals(&mut reals),
            Err(ExchangeError::BufferTooSmall {
                needed: 3,
                capacity: 1
            })
        ));
    }
}
