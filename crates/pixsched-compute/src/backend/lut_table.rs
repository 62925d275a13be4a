//! Lookup table as seen by the host executors.

use crate::pipeline::{lut_value, LutIndexing, LUT_SIZE};
use crate::plan::LutPlan;

/// Either a precomputed table or the curve evaluated at every use.
pub(crate) enum LutTable {
    Table([u8; LUT_SIZE]),
    Inline,
}

impl LutTable {
    /// Produces the table the way `plan` asks: block by block when the
    /// table is split into blocks, all at once otherwise.
    pub(crate) fn compute(plan: &LutPlan) -> Self {
        if !plan.materialized {
            return Self::Inline;
        }
        let block = plan.block.map_or(LUT_SIZE, |b| b as usize);
        let mut table = [0u8; LUT_SIZE];
        for (b, entries) in table.chunks_mut(block).enumerate() {
            for (t, entry) in entries.iter_mut().enumerate() {
                *entry = lut_value((b * block + t) as u32);
            }
        }
        Self::Table(table)
    }

    #[inline(always)]
    pub(crate) fn get(&self, i: usize) -> u8 {
        match self {
            Self::Table(t) => t[i],
            Self::Inline => lut_value(i as u32),
        }
    }

    /// `lut(index(sharpened))`.
    #[inline(always)]
    pub(crate) fn curve(&self, indexing: LutIndexing, sharpened: i16) -> u8 {
        self.get(indexing.index(sharpened))
    }
}
