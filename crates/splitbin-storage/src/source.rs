//! Record Source Capability
//!
//! [`RecordSource`] is the producer side of the prefetch pipeline: a finite,
//! lazy sequence of items pulled one at a time. The bin-wise scan implements
//! it, and [`IterSource`] lifts any plain iterator into it so arbitrary
//! in-memory producers can be prefetched too.

use async_trait::async_trait;

use splitbin_core::error::Result;

/// A finite, lazy sequence of items.
///
/// Yields `Ok(Some(item))` until exhausted (`Ok(None)`) or failed. Sources
/// are one-shot: after `Ok(None)` or an error, further calls are undefined.
#[async_trait]
pub trait RecordSource: Send {
    type Item: Send;

    async fn try_next(&mut self) -> Result<Option<Self::Item>>;
}

/// Adapter lifting an infallible [`Iterator`] into a [`RecordSource`].
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I> RecordSource for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Item = I::Item;

    async fn try_next(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.inner.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iter_source_drains_in_order() {
        let mut source = IterSource::new(0..4u32);
        let mut seen = Vec::new();
        while let Some(item) = source.try_next().await.unwrap() {
            seen.push(item);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(source.try_next().await.unwrap().is_none());
    }
}
