//! Random splitting: one seeded shuffle cut into consecutive slices.

use super::{SegmentSizes, Segments, SplitPolicy};
use crate::row::Row;
use crate::sampler::SeededSampler;
use crate::Result;

/// Seeded shuffle, then consecutive slices. Segments are always disjoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSplit;

impl SplitPolicy for RandomSplit {
    fn name(&self) -> &'static str {
        "random"
    }

    fn split(
        &self,
        rows: &[Row],
        sizes: SegmentSizes,
        sampler: &SeededSampler,
    ) -> Result<Segments> {
        let shuffled = sampler.shuffle(rows);
        let mut rest = shuffled.as_slice();

        let mut take = |n: usize| -> Vec<Row> {
            let (head, tail) = rest.split_at(n.min(rest.len()));
            rest = tail;
            head.to_vec()
        };

        let training = take(sizes.training);
        let validation = take(sizes.validation);
        let testing = take(sizes.testing);
        Ok(Segments {
            training,
            validation,
            testing,
        })
    }
}
