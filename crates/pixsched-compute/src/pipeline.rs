//! Pixel pipeline definition.
//!
//! Five pure stages over an input image:
//!
//! ```text
//! input ──> padded ──> padded16 ──> sharpen ──┐
//!                                             ├──> curved (output)
//! lut ────────────────────────────────────────┘
//! ```
//!
//! - `lut(i)`: gamma 1.2 curve over `0..=255`
//! - `padded(x, y, c)`: input with coordinates clamped into bounds
//! - `padded16`: `padded` widened to `i16`
//! - `sharpen`: `2*p(x,y) - (p(x-1,y) + p(x,y-1) + p(x+1,y) + p(x,y+1)) / 4`
//! - `curved`: `lut(index(sharpen))`
//!
//! The methods on [`Pipeline`] evaluate each stage directly with no schedule;
//! this is the semantic reference every compiled artifact must reproduce.

use std::fmt;

use pixsched_core::{Extent, Image};

use crate::schedule::Var;

/// Number of entries in the lookup table.
pub const LUT_SIZE: usize = 256;

/// Gamma exponent of the lookup table.
pub const LUT_GAMMA: f32 = 1.2;

/// Pipeline stages in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    Lut,
    Padded,
    Padded16,
    Sharpen,
    Curved,
}

impl StageId {
    /// All stages, producers before consumers.
    pub const ALL: [StageId; 5] = [
        StageId::Lut,
        StageId::Padded,
        StageId::Padded16,
        StageId::Sharpen,
        StageId::Curved,
    ];

    /// The stage realized into the output buffer.
    pub const OUTPUT: StageId = StageId::Curved;

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lut => "lut",
            Self::Padded => "padded",
            Self::Padded16 => "padded16",
            Self::Sharpen => "sharpen",
            Self::Curved => "curved",
        }
    }

    /// Pure dimensions, innermost first.
    pub fn dims(&self) -> &'static [Var] {
        static IMAGE_DIMS: [Var; 3] = [Var::X, Var::Y, Var::C];
        static LUT_DIMS: [Var; 1] = [Var::I];
        match self {
            Self::Lut => &LUT_DIMS,
            _ => &IMAGE_DIMS,
        }
    }

    /// Stages read directly by this one. `padded` reads the input image.
    pub fn producers(&self) -> &'static [StageId] {
        match self {
            Self::Lut | Self::Padded => &[],
            Self::Padded16 => &[StageId::Padded],
            Self::Sharpen => &[StageId::Padded16],
            Self::Curved => &[StageId::Sharpen, StageId::Lut],
        }
    }

    /// Stages that read this one directly.
    pub fn consumers(&self) -> Vec<StageId> {
        StageId::ALL
            .into_iter()
            .filter(|s| s.producers().contains(self))
            .collect()
    }

    /// Returns `true` if `self` reads `producer`, directly or transitively.
    pub fn depends_on(&self, producer: StageId) -> bool {
        self.producers()
            .iter()
            .any(|&p| p == producer || p.depends_on(producer))
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How `sharpen` results outside `0..=255` index the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutIndexing {
    /// Clamp to `[0, 255]`.
    #[default]
    Clamp,
    /// Narrow to `u16` with wraparound, then saturate at the table end.
    ///
    /// Negative results wrap to large indices and read the last entry.
    Wrap16,
}

impl LutIndexing {
    /// Maps a sharpen result to a table index.
    #[inline(always)]
    pub fn index(self, value: i16) -> usize {
        match self {
            Self::Clamp => value.clamp(0, 255) as usize,
            Self::Wrap16 => (value as u16 as usize).min(LUT_SIZE - 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clamp => "clamp",
            Self::Wrap16 => "wrap16",
        }
    }
}

/// `lut(i)`: `round(clamp((i / 255)^1.2 * 255, 0, 255))`, in `f32`.
#[inline]
pub fn lut_value(i: u32) -> u8 {
    let v = (i as f32 / 255.0).powf(LUT_GAMMA) * 255.0;
    v.clamp(0.0, 255.0).round() as u8
}

/// The 5-tap sharpen kernel on widened samples.
#[inline(always)]
pub fn sharpen_tap(center: i16, left: i16, up: i16, right: i16, down: i16) -> i16 {
    center * 2 - (left + up + right + down) / 4
}

/// A pipeline bound to one input image.
///
/// Construct one per schedule variant; the input is shared, not copied.
#[derive(Debug, Clone)]
pub struct Pipeline {
    input: Image,
    indexing: LutIndexing,
}

impl Pipeline {
    pub fn new(input: Image) -> Self {
        Self {
            input,
            indexing: LutIndexing::default(),
        }
    }

    pub fn with_indexing(mut self, indexing: LutIndexing) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn input(&self) -> &Image {
        &self.input
    }

    /// Extent of the output stage (same as the input).
    pub fn extent(&self) -> Extent {
        self.input.extent()
    }

    pub fn indexing(&self) -> LutIndexing {
        self.indexing
    }

    pub fn lut(&self, i: u32) -> u8 {
        lut_value(i)
    }

    pub fn padded(&self, x: i32, y: i32, c: u32) -> u8 {
        let cx = x.clamp(0, self.input.width() as i32 - 1) as u32;
        let cy = y.clamp(0, self.input.height() as i32 - 1) as u32;
        self.input.get(cx, cy, c)
    }

    pub fn padded16(&self, x: i32, y: i32, c: u32) -> i16 {
        i16::from(self.padded(x, y, c))
    }

    pub fn sharpen(&self, x: i32, y: i32, c: u32) -> i16 {
        sharpen_tap(
            self.padded16(x, y, c),
            self.padded16(x - 1, y, c),
            self.padded16(x, y - 1, c),
            self.padded16(x + 1, y, c),
            self.padded16(x, y + 1, c),
        )
    }

    pub fn curved(&self, x: i32, y: i32, c: u32) -> u8 {
        let idx = self.indexing.index(self.sharpen(x, y, c));
        self.lut(idx as u32)
    }

    /// Evaluates `curved` over the full extent with no schedule.
    pub fn realize_reference(&self) -> pixsched_core::Result<Image> {
        let e = self.extent();
        Image::from_fn(e.width, e.height, e.channels, |x, y, c| {
            self.curved(x as i32, y as i32, c)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Image {
        Image::from_fn(5, 4, 3, |x, y, c| (x * 40 + y * 13 + c * 7) as u8).unwrap()
    }

    #[test]
    fn test_graph_is_acyclic_and_ordered() {
        for (pos, stage) in StageId::ALL.iter().enumerate() {
            for p in stage.producers() {
                let ppos = StageId::ALL.iter().position(|s| s == p).unwrap();
                assert!(ppos < pos, "{p} must precede {stage}");
            }
            assert!(!stage.depends_on(*stage));
        }
    }

    #[test]
    fn test_dependencies() {
        assert!(StageId::Curved.depends_on(StageId::Padded));
        assert!(StageId::Curved.depends_on(StageId::Lut));
        assert!(!StageId::Sharpen.depends_on(StageId::Lut));
        assert_eq!(StageId::Padded16.consumers(), vec![StageId::Sharpen]);
        assert!(StageId::Curved.consumers().is_empty());
    }

    #[test]
    fn test_clamp_at_borders() {
        let input = ramp();
        let p = Pipeline::new(input.clone());
        let (w, h) = (input.width() as i32, input.height() as i32);
        for y in 0..h {
            for c in 0..3 {
                assert_eq!(p.padded(-1, y, c), input.get(0, y as u32, c));
                assert_eq!(p.padded(w, y, c), input.get(w as u32 - 1, y as u32, c));
                assert_eq!(p.padded(-7, y, c), input.get(0, y as u32, c));
            }
        }
        for x in 0..w {
            assert_eq!(p.padded(x, -1, 1), input.get(x as u32, 0, 1));
            assert_eq!(p.padded(x, h, 1), input.get(x as u32, h as u32 - 1, 1));
        }
        assert_eq!(p.padded(-1, -1, 2), input.get(0, 0, 2));
    }

    #[test]
    fn test_sharpen_identity_on_flat_field() {
        for v in [0u8, 1, 77, 128, 254, 255] {
            let p = Pipeline::new(Image::filled(3, 3, 3, v).unwrap());
            for y in -1..4 {
                for x in -1..4 {
                    assert_eq!(p.sharpen(x, y, 0), i16::from(v));
                }
            }
        }
    }

    #[test]
    fn test_sharpen_extremes_fit_i16() {
        assert_eq!(sharpen_tap(255, 0, 0, 0, 0), 510);
        assert_eq!(sharpen_tap(0, 255, 255, 255, 255), -255);
        // (1 + 1 + 1 + 0) / 4 truncates to 0
        assert_eq!(sharpen_tap(5, 1, 1, 1, 0), 10);
    }

    #[test]
    fn test_lut_endpoints_and_monotonic() {
        assert_eq!(lut_value(0), 0);
        assert_eq!(lut_value(255), 255);
        assert_eq!(lut_value(128), 112);
        for i in 1..LUT_SIZE as u32 {
            assert!(lut_value(i) >= lut_value(i - 1), "lut decreases at {i}");
        }
    }

    #[test]
    fn test_lut_indexing_policies() {
        assert_eq!(LutIndexing::Clamp.index(-255), 0);
        assert_eq!(LutIndexing::Clamp.index(-1), 0);
        assert_eq!(LutIndexing::Clamp.index(128), 128);
        assert_eq!(LutIndexing::Clamp.index(510), 255);

        assert_eq!(LutIndexing::Wrap16.index(-1), 255);
        assert_eq!(LutIndexing::Wrap16.index(-255), 255);
        assert_eq!(LutIndexing::Wrap16.index(0), 0);
        assert_eq!(LutIndexing::Wrap16.index(200), 200);
        assert_eq!(LutIndexing::Wrap16.index(300), 255);
    }

    #[test]
    fn test_dark_pixel_next_to_bright_depends_on_indexing() {
        // center 0 surrounded by 255: sharpen = -255
        let input = Image::from_fn(3, 3, 1, |x, y, _| if x == 1 && y == 1 { 0 } else { 255 }).unwrap();
        let clamp = Pipeline::new(input.clone());
        let wrap = Pipeline::new(input).with_indexing(LutIndexing::Wrap16);
        assert_eq!(clamp.sharpen(1, 1, 0), -255);
        assert_eq!(clamp.curved(1, 1, 0), 0);
        assert_eq!(wrap.curved(1, 1, 0), 255);
    }

    #[test]
    fn test_reference_flat_field() {
        let p = Pipeline::new(Image::filled(4, 4, 3, 128).unwrap());
        let out = p.realize_reference().unwrap();
        assert!(out.data().iter().all(|&v| v == lut_value(128)));
    }
}
