//! Host strip executor using rayon for parallelization.
//!
//! Runs a [`StripPlan`]. Output rows are grouped into strips; strips run on
//! the rayon pool when the plan is parallel. Within a strip each row is
//! produced in two steps:
//!
//! 1. sharpen values for the row, from clamped input reads (inline `padded`)
//!    or from three widened rows (`padded` per row or at root);
//! 2. the curve, with the channel loop unrolled when its extent is bound.
//!
//! Lane counts become const generics so the per-lane loops have fixed trip
//! counts.

use rayon::prelude::*;

use pixsched_core::{Extent, Image};

use super::lut_table::LutTable;
use crate::pipeline::{sharpen_tap, LutIndexing, Pipeline};
use crate::plan::{ChannelOrder, PaddedPlan, SharpenPlan, StripPlan};

pub(crate) struct StripExecutor {
    plan: StripPlan,
    pipeline: Pipeline,
}

impl StripExecutor {
    pub(crate) fn new(plan: StripPlan, pipeline: Pipeline) -> Self {
        Self { plan, pipeline }
    }

    /// Writes `curved` for the whole extent into `out`.
    pub(crate) fn run(&self, out: &mut [u8]) {
        let extent = self.pipeline.extent();
        let lut = LutTable::compute(&self.plan.lut);
        let root = match self.plan.padded {
            PaddedPlan::Root { lanes } => Some(PaddedImage::compute(self.pipeline.input(), lanes)),
            _ => None,
        };

        let strip_rows = self.plan.strip_height.unwrap_or(extent.height).max(1) as usize;
        let chunk = extent.row_len() * strip_rows;
        if self.plan.parallel {
            out.par_chunks_mut(chunk).enumerate().for_each(|(s, strip)| {
                self.strip((s * strip_rows) as u32, strip, &lut, root.as_ref());
            });
        } else {
            for (s, strip) in out.chunks_mut(chunk).enumerate() {
                self.strip((s * strip_rows) as u32, strip, &lut, root.as_ref());
            }
        }
    }

    fn strip(&self, y0: u32, strip: &mut [u8], lut: &LutTable, root: Option<&PaddedImage>) {
        let input = self.pipeline.input();
        let extent = input.extent();
        let ch = extent.channels as usize;

        let mut source = match (self.plan.padded, root) {
            (PaddedPlan::Scanline { lanes, reuse }, _) => {
                RowSource::Window(PaddedWindow::new(extent, lanes, reuse))
            }
            (PaddedPlan::Root { .. }, Some(root)) => RowSource::Root(root),
            _ => RowSource::Inline,
        };
        let mut sharpened = match self.plan.sharpen {
            SharpenPlan::Row { .. } => vec![0i16; extent.row_len()],
            SharpenPlan::Inline => Vec::new(),
        };

        for (r, out_row) in strip.chunks_exact_mut(extent.row_len()).enumerate() {
            let y = y0 + r as u32;
            match &mut source {
                RowSource::Inline => {
                    let p = &self.pipeline;
                    let yi = y as i32;
                    let at = move |j: usize| p.sharpen((j / ch) as i32, yi, (j % ch) as u32);
                    self.emit_row(at, &mut sharpened, lut, out_row);
                }
                RowSource::Window(window) => {
                    let (up, mid, down) = window.rows_around(input, y);
                    self.emit_row(stencil(up, mid, down, ch), &mut sharpened, lut, out_row);
                }
                RowSource::Root(root) => {
                    let (up, mid, down) = root.rows_around(y);
                    self.emit_row(stencil(up, mid, down, ch), &mut sharpened, lut, out_row);
                }
            }
        }
    }

    /// Sharpens one row (materialized first when the plan asks) and curves it.
    fn emit_row<F>(&self, at: F, sharpened: &mut [i16], lut: &LutTable, out: &mut [u8])
    where
        F: Fn(usize) -> i16,
    {
        match self.plan.sharpen {
            SharpenPlan::Row { lanes } => {
                fill_lanes(lanes, &at, sharpened);
                let row = &*sharpened;
                self.curve_row(|j| row[j], lut, out);
            }
            SharpenPlan::Inline => self.curve_row(at, lut, out),
        }
    }

    fn curve_row<F>(&self, at: F, lut: &LutTable, out: &mut [u8])
    where
        F: Fn(usize) -> i16,
    {
        let indexing = self.pipeline.indexing();
        let ch = self.pipeline.extent().channels as usize;
        let channels = self.plan.channels;
        let unrolled = if channels.unrolled { channels.bound } else { None };

        match (self.plan.order, unrolled) {
            (ChannelOrder::Planar, _) => curve_planar(at, lut, indexing, ch, out),
            (ChannelOrder::Interleaved, Some(1)) => curve_pixels::<1, _>(at, lut, indexing, out),
            (ChannelOrder::Interleaved, Some(2)) => curve_pixels::<2, _>(at, lut, indexing, out),
            (ChannelOrder::Interleaved, Some(3)) => curve_pixels::<3, _>(at, lut, indexing, out),
            (ChannelOrder::Interleaved, Some(4)) => curve_pixels::<4, _>(at, lut, indexing, out),
            (ChannelOrder::Interleaved, _) => {
                for (j, v) in out.iter_mut().enumerate() {
                    *v = lut.curve(indexing, at(j));
                }
            }
        }
    }
}

enum RowSource<'a> {
    Inline,
    Window(PaddedWindow),
    Root(&'a PaddedImage),
}

/// The 5-tap stencil over widened rows carrying one border pixel per side.
#[inline(always)]
fn stencil<'a>(up: &'a [i16], mid: &'a [i16], down: &'a [i16], ch: usize) -> impl Fn(usize) -> i16 + 'a {
    move |j| sharpen_tap(mid[j + ch], mid[j], up[j + ch], mid[j + 2 * ch], down[j + ch])
}

fn curve_pixels<const C: usize, F>(at: F, lut: &LutTable, indexing: LutIndexing, out: &mut [u8])
where
    F: Fn(usize) -> i16,
{
    for (px, pixel) in out.chunks_exact_mut(C).enumerate() {
        let base = px * C;
        for c in 0..C {
            pixel[c] = lut.curve(indexing, at(base + c));
        }
    }
}

fn curve_planar<F>(at: F, lut: &LutTable, indexing: LutIndexing, ch: usize, out: &mut [u8])
where
    F: Fn(usize) -> i16,
{
    let width = out.len() / ch;
    for c in 0..ch {
        for x in 0..width {
            let j = x * ch + c;
            out[j] = lut.curve(indexing, at(j));
        }
    }
}

fn fill_lanes<F: Fn(usize) -> i16>(lanes: u32, at: &F, dst: &mut [i16]) {
    match lanes {
        32 => fill::<32, F>(at, dst),
        16 => fill::<16, F>(at, dst),
        8 => fill::<8, F>(at, dst),
        4 => fill::<4, F>(at, dst),
        2 => fill::<2, F>(at, dst),
        _ => fill::<1, F>(at, dst),
    }
}

fn fill<const L: usize, F: Fn(usize) -> i16>(at: &F, dst: &mut [i16]) {
    let mut chunks = dst.chunks_exact_mut(L);
    let mut base = 0;
    for chunk in &mut chunks {
        let lanes: [i16; L] = std::array::from_fn(|k| at(base + k));
        chunk.copy_from_slice(&lanes);
        base += L;
    }
    for (k, v) in chunks.into_remainder().iter_mut().enumerate() {
        *v = at(base + k);
    }
}

fn widen_lanes(lanes: u32, src: &[u8], dst: &mut [i16]) {
    match lanes {
        32 => widen::<32>(src, dst),
        16 => widen::<16>(src, dst),
        8 => widen::<8>(src, dst),
        4 => widen::<4>(src, dst),
        2 => widen::<2>(src, dst),
        _ => widen::<1>(src, dst),
    }
}

fn widen<const L: usize>(src: &[u8], dst: &mut [i16]) {
    let mut s = src.chunks_exact(L);
    let mut d = dst.chunks_exact_mut(L);
    for (si, di) in (&mut s).zip(&mut d) {
        for k in 0..L {
            di[k] = i16::from(si[k]);
        }
    }
    for (v, &b) in d.into_remainder().iter_mut().zip(s.remainder()) {
        *v = i16::from(b);
    }
}

/// Widens input row `y` (clamped) into `dst`, adding one clamped pixel on
/// each side: `dst.len() == (width + 2) * channels`.
fn fill_padded_row(input: &Image, y: i32, lanes: u32, dst: &mut [i16]) {
    let extent = input.extent();
    let ch = extent.channels as usize;
    let cy = y.clamp(0, extent.height as i32 - 1) as u32;
    let src = input.row(cy);

    let (left, rest) = dst.split_at_mut(ch);
    let (body, right) = rest.split_at_mut(src.len());
    widen_lanes(lanes, src, body);
    let last = src.len() - ch;
    for c in 0..ch {
        left[c] = i16::from(src[c]);
        right[c] = i16::from(src[last + c]);
    }
}

/// Three widened rows around the current output row.
struct PaddedWindow {
    rows: [Vec<i16>; 3],
    center: Option<i32>,
    lanes: u32,
    reuse: bool,
}

impl PaddedWindow {
    fn new(extent: Extent, lanes: u32, reuse: bool) -> Self {
        let len = (extent.width as usize + 2) * extent.channels as usize;
        Self {
            rows: [vec![0; len], vec![0; len], vec![0; len]],
            center: None,
            lanes,
            reuse,
        }
    }

    /// Rows `y - 1`, `y`, `y + 1`. With reuse, stepping down one row widens
    /// only the new bottom row.
    fn rows_around(&mut self, input: &Image, y: u32) -> (&[i16], &[i16], &[i16]) {
        let y = y as i32;
        let lanes = self.lanes;
        if self.reuse && self.center == Some(y - 1) {
            self.rows.rotate_left(1);
            fill_padded_row(input, y + 1, lanes, &mut self.rows[2]);
        } else {
            for (k, row) in self.rows.iter_mut().enumerate() {
                fill_padded_row(input, y - 1 + k as i32, lanes, row);
            }
        }
        self.center = Some(y);
        (&self.rows[0], &self.rows[1], &self.rows[2])
    }
}

/// `padded16` over `[-1, width] x [-1, height]`, computed once per run.
struct PaddedImage {
    data: Vec<i16>,
    row_len: usize,
}

impl PaddedImage {
    fn compute(input: &Image, lanes: u32) -> Self {
        let extent = input.extent();
        let row_len = (extent.width as usize + 2) * extent.channels as usize;
        let mut data = vec![0i16; row_len * (extent.height as usize + 2)];
        data.par_chunks_mut(row_len).enumerate().for_each(|(k, row)| {
            fill_padded_row(input, k as i32 - 1, lanes, row);
        });
        Self { data, row_len }
    }

    fn rows_around(&self, y: u32) -> (&[i16], &[i16], &[i16]) {
        let row = |k: usize| &self.data[k * self.row_len..(k + 1) * self.row_len];
        let k = y as usize;
        (row(k), row(k + 1), row(k + 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ChannelPlan, LutPlan};

    fn image() -> Image {
        Image::from_fn(13, 7, 3, |x, y, c| ((x * 37 + y * 91 + c * 53) % 256) as u8).unwrap()
    }

    fn plan(padded: PaddedPlan, sharpen: SharpenPlan) -> StripPlan {
        StripPlan {
            lut: LutPlan { materialized: true, block: None },
            channels: ChannelPlan { bound: Some(3), unrolled: true },
            order: ChannelOrder::Interleaved,
            strip_height: Some(4),
            parallel: true,
            sharpen,
            padded,
        }
    }

    fn run(plan: StripPlan, input: &Image) -> Vec<u8> {
        let exec = StripExecutor::new(plan, Pipeline::new(input.clone()));
        let mut out = vec![0u8; input.extent().len()];
        exec.run(&mut out);
        out
    }

    #[test]
    fn test_padded_row_has_clamped_border() {
        let input = Image::from_fn(3, 2, 2, |x, y, c| (x * 10 + y * 100 + c) as u8).unwrap();
        let mut row = vec![0i16; 5 * 2];
        fill_padded_row(&input, -3, 4, &mut row);
        assert_eq!(row, [0, 1, 0, 1, 10, 11, 20, 21, 20, 21]);
        fill_padded_row(&input, 5, 1, &mut row);
        assert_eq!(row, [100, 101, 100, 101, 110, 111, 120, 121, 120, 121]);
    }

    #[test]
    fn test_window_reuse_matches_fresh_rows() {
        let input = image();
        let mut reused = PaddedWindow::new(input.extent(), 8, true);
        let mut fresh = PaddedWindow::new(input.extent(), 8, false);
        for y in 0..input.height() {
            let a = reused.rows_around(&input, y);
            let (a0, a1, a2) = (a.0.to_vec(), a.1.to_vec(), a.2.to_vec());
            let b = fresh.rows_around(&input, y);
            assert_eq!((a0.as_slice(), a1.as_slice(), a2.as_slice()), b, "row {y}");
        }
    }

    #[test]
    fn test_all_row_sources_agree_with_reference() {
        let input = image();
        let reference = Pipeline::new(input.clone()).realize_reference().unwrap();
        let paddeds = [
            PaddedPlan::Inline,
            PaddedPlan::Scanline { lanes: 16, reuse: true },
            PaddedPlan::Scanline { lanes: 4, reuse: false },
            PaddedPlan::Root { lanes: 32 },
        ];
        let sharpens = [SharpenPlan::Inline, SharpenPlan::Row { lanes: 8 }];
        for padded in paddeds {
            for sharpen in sharpens {
                let out = run(plan(padded, sharpen), &input);
                assert_eq!(out, reference.data(), "{padded:?} / {sharpen:?}");
            }
        }
    }

    #[test]
    fn test_planar_serial_single_strip() {
        let input = image();
        let reference = Pipeline::new(input.clone()).realize_reference().unwrap();
        let mut p = plan(PaddedPlan::Scanline { lanes: 2, reuse: true }, SharpenPlan::Inline);
        p.order = ChannelOrder::Planar;
        p.strip_height = None;
        p.parallel = false;
        p.channels = ChannelPlan { bound: None, unrolled: false };
        assert_eq!(run(p, &input), reference.data());
    }
}
