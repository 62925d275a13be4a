//! Host tile executor: block/thread execution emulated on the CPU.
//!
//! Runs a [`TilePlan`] the way a device would: the output is cut into
//! `tile_width x tile_height` blocks, every block stages its clamped
//! neighbourhood in a block-local buffer (the "shared" tile) when the plan
//! asks for it, then every thread of the block produces one pixel. Rows of
//! blocks run on the rayon pool.
//!
//! With [`DeviceApi::Emulated`] the result lands in an [`EmulatedStorage`]
//! attached to the output buffer, so it stays invisible to the host until
//! `copy_to_host`.

use rayon::prelude::*;
use tracing::debug;

use super::lut_table::LutTable;
use super::tiling::{generate_tiles, Tile};
use super::DEVICE_TARGET;
use crate::buffer::{AsAny, DeviceStorage, OutputBuffer};
use crate::error::ComputeResult;
use crate::pipeline::{sharpen_tap, Pipeline};
use crate::plan::TilePlan;
use crate::target::DeviceApi;

pub(crate) struct TileExecutor {
    plan: TilePlan,
    pipeline: Pipeline,
}

impl TileExecutor {
    pub(crate) fn new(plan: TilePlan, pipeline: Pipeline) -> Self {
        Self { plan, pipeline }
    }

    /// Writes `curved` for the whole extent into `out`.
    pub(crate) fn run(&self, out: &mut [u8]) {
        let extent = self.pipeline.extent();
        let lut = LutTable::compute(&self.plan.lut);
        let band_rows = self.plan.tile_height as usize;

        out.par_chunks_mut(extent.row_len() * band_rows)
            .enumerate()
            .for_each(|(band, rows)| {
                let y0 = (band * band_rows) as u32;
                let height = (rows.len() / extent.row_len()) as u32;
                let mut shared = Vec::new();
                for tile in generate_tiles(extent.width, height, self.plan.tile_width, height) {
                    let tile = Tile::new(tile.x, y0, tile.width, tile.height);
                    self.block(tile, y0, rows, &lut, &mut shared);
                }
            });
    }

    /// One block: optional shared staging, then one "thread" per pixel.
    fn block(&self, tile: Tile, y0: u32, rows: &mut [u8], lut: &LutTable, shared: &mut Vec<i16>) {
        let extent = self.pipeline.extent();
        let ch = extent.channels as usize;
        let indexing = self.pipeline.indexing();
        let staged = self.plan.padded_shared;
        if staged {
            self.stage_shared(tile, shared);
        }
        let stride = (tile.width as usize + 2) * ch;

        for ty in 0..tile.height {
            let y = tile.y + ty;
            let row = &mut rows[(y - y0) as usize * extent.row_len()..][..extent.row_len()];
            for tx in 0..tile.width {
                let x = tile.x + tx;
                let pixel = &mut row[x as usize * ch..][..ch];
                for (c, v) in pixel.iter_mut().enumerate() {
                    let s = if staged {
                        let at = |dx: usize, dy: usize| {
                            shared[(ty as usize + dy) * stride + (tx as usize + dx) * ch + c]
                        };
                        sharpen_tap(at(1, 1), at(0, 1), at(1, 0), at(2, 1), at(1, 2))
                    } else {
                        self.pipeline.sharpen(x as i32, y as i32, c as u32)
                    };
                    *v = lut.curve(indexing, s);
                }
            }
        }
    }

    /// Loads `padded16` over the tile plus a one-pixel halo.
    fn stage_shared(&self, tile: Tile, shared: &mut Vec<i16>) {
        let ch = self.pipeline.extent().channels;
        let (sw, sh) = (tile.width + 2, tile.height + 2);
        shared.clear();
        shared.reserve((sw * sh * ch) as usize);
        for sy in 0..sh {
            let y = tile.y as i32 + sy as i32 - 1;
            for sx in 0..sw {
                let x = tile.x as i32 + sx as i32 - 1;
                for c in 0..ch {
                    shared.push(self.pipeline.padded16(x, y, c));
                }
            }
        }
    }

    /// Runs into emulated device storage attached to `out`.
    pub(crate) fn realize_emulated(&self, out: &mut OutputBuffer, debug: bool) -> ComputeResult<()> {
        let len = out.extent().len();
        let storage = out.device_mut(
            |s: &EmulatedStorage| s.data.len() == len,
            || {
                if debug {
                    debug!(target: DEVICE_TARGET, bytes = len, "emulated: allocate output");
                }
                Ok(EmulatedStorage { data: vec![0; len], debug })
            },
        )?;
        if debug {
            let (w, h) = (self.pipeline.extent().width, self.pipeline.extent().height);
            let (nx, ny) = super::grid(w, h, self.plan.tile_width, self.plan.tile_height);
            debug!(
                target: DEVICE_TARGET,
                blocks = nx * ny,
                threads = self.plan.tile_width * self.plan.tile_height,
                "emulated: dispatch curved"
            );
        }
        self.run(&mut storage.data);
        out.mark_device_written();
        Ok(())
    }
}

/// Output allocation owned by the emulated device.
#[derive(Debug)]
pub(crate) struct EmulatedStorage {
    data: Vec<u8>,
    debug: bool,
}

impl AsAny for EmulatedStorage {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl DeviceStorage for EmulatedStorage {
    fn api(&self) -> DeviceApi {
        DeviceApi::Emulated
    }

    fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_back(&self, host: &mut [u8]) -> ComputeResult<()> {
        if self.debug {
            debug!(target: DEVICE_TARGET, bytes = self.data.len(), "emulated: copy to host");
        }
        host.copy_from_slice(&self.data);
        Ok(())
    }
}
