//! Schedule validation and lowering.
//!
//! [`lower`] checks a [`Schedule`] as a whole, then turns it into a [`Plan`]:
//! one of the two loop-nest shapes the backends run.
//!
//! ```text
//! Schedule ──validate──> loop nest per stage ──lower──┬──> Plan::Strips (host)
//!                                                     └──> Plan::Tiles  (device)
//! ```
//!
//! A strip plan walks output rows outermost. Rows are grouped into strips
//! (the outer half of a split of `y`), strips optionally run in parallel, and
//! `sharpen`/`padded` are either inlined or materialized one row at a time.
//! A tile plan maps `x`/`y` tiles to gpu blocks and pixels to gpu threads,
//! optionally caching each block's padded neighbourhood in shared memory.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ScheduleError;
use crate::pipeline::StageId;
use crate::schedule::{
    ComputeLevel, LoopDirective, MemoryType, Schedule, StageSchedule, StoreLevel, Var,
};
use crate::target::Target;

/// Supported vector lane counts.
pub const VECTOR_WIDTHS: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Most threads one gpu block may hold.
pub const MAX_BLOCK_THREADS: u32 = 256;

type Result<T> = std::result::Result<T, ScheduleError>;

// =============================================================================
// Lowered plans
// =============================================================================

/// How the lookup table is produced for each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutPlan {
    /// Table computed once per run; otherwise evaluated at every use.
    pub materialized: bool,
    /// Entries per gpu block when the table is computed on the device.
    pub block: Option<u32>,
}

/// Channel loop of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Constant channel count promised by a bound.
    pub bound: Option<u32>,
    pub unrolled: bool,
}

/// Channel placement within a row sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// All channels of a pixel before the next pixel.
    Interleaved,
    /// One channel across the whole row at a time.
    Planar,
}

/// How `sharpen` is evaluated by a strip plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharpenPlan {
    Inline,
    /// One output row materialized at a time, `lanes` samples per step.
    Row { lanes: u32 },
}

/// How `padded` is evaluated by a strip plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddedPlan {
    /// Clamped reads straight from the input.
    Inline,
    /// The three rows around each output row, widened `lanes` at a time.
    /// With `reuse`, rows slide through a window kept for the whole strip.
    Scanline { lanes: u32, reuse: bool },
    /// The whole padded image, computed once per run.
    Root { lanes: u32 },
}

/// Host plan: parallel strips of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripPlan {
    pub lut: LutPlan,
    pub channels: ChannelPlan,
    pub order: ChannelOrder,
    /// Rows per strip; `None` is a single strip.
    pub strip_height: Option<u32>,
    pub parallel: bool,
    pub sharpen: SharpenPlan,
    pub padded: PaddedPlan,
}

/// Device plan: 2-D tiles of threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlan {
    pub lut: LutPlan,
    pub channels: ChannelPlan,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Each block stages its padded neighbourhood in shared memory.
    pub padded_shared: bool,
}

/// A lowered schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Strips(StripPlan),
    Tiles(TilePlan),
}

impl Plan {
    pub fn lut(&self) -> LutPlan {
        match self {
            Self::Strips(p) => p.lut,
            Self::Tiles(p) => p.lut,
        }
    }

    pub fn channels(&self) -> ChannelPlan {
        match self {
            Self::Strips(p) => p.channels,
            Self::Tiles(p) => p.channels,
        }
    }

    /// Returns `true` for plans that run on a device.
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Tiles(_))
    }
}

impl fmt::Display for LutPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.materialized, self.block) {
            (false, _) => f.write_str("inline"),
            (true, None) => f.write_str("root"),
            (true, Some(b)) => write!(f, "root, blocks of {b}"),
        }
    }
}

impl fmt::Display for ChannelPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Some(n) => write!(f, "[0, {n})")?,
            None => f.write_str("any")?,
        }
        if self.unrolled {
            f.write_str(" unrolled")?;
        }
        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strips(p) => {
                match p.strip_height {
                    Some(h) => write!(f, "strips of {h} rows")?,
                    None => f.write_str("single strip")?,
                }
                if p.parallel {
                    f.write_str(" (parallel)")?;
                }
                write!(f, "; lut: {}; channels: {}", p.lut, p.channels)?;
                match p.order {
                    ChannelOrder::Interleaved => f.write_str(" interleaved")?,
                    ChannelOrder::Planar => f.write_str(" planar")?,
                }
                match p.sharpen {
                    SharpenPlan::Inline => f.write_str("; sharpen: inline")?,
                    SharpenPlan::Row { lanes } => write!(f, "; sharpen: per row x{lanes}")?,
                }
                match p.padded {
                    PaddedPlan::Inline => f.write_str("; padded: inline"),
                    PaddedPlan::Scanline { lanes, reuse: false } => {
                        write!(f, "; padded: per row x{lanes}")
                    }
                    PaddedPlan::Scanline { lanes, reuse: true } => {
                        write!(f, "; padded: per row x{lanes}, reused across strip")
                    }
                    PaddedPlan::Root { lanes } => write!(f, "; padded: root x{lanes}"),
                }
            }
            Self::Tiles(p) => {
                write!(
                    f,
                    "tiles {}x{}; lut: {}; channels: {}; padded: {}",
                    p.tile_width,
                    p.tile_height,
                    p.lut,
                    p.channels,
                    if p.padded_shared { "shared per block" } else { "inline" }
                )
            }
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Split {
    var: Var,
    outer: Var,
    inner: Var,
    factor: u32,
}

/// A stage's loop nest after its directives are applied.
#[derive(Debug, Clone, Default)]
struct LoopNest {
    /// Innermost first.
    axes: Vec<Var>,
    splits: Vec<Split>,
    vectorized: Vec<(Var, u32)>,
    unrolled: Vec<Var>,
    parallel: Vec<Var>,
    gpu_blocks: Vec<Var>,
    gpu_threads: Vec<Var>,
}

impl LoopNest {
    fn build(stage: StageId, sched: &StageSchedule) -> Result<Self> {
        let mut nest = LoopNest {
            axes: stage.dims().to_vec(),
            ..Default::default()
        };

        for directive in &sched.directives {
            match directive {
                LoopDirective::Split { var, outer, inner, factor } => {
                    let pos = nest.require(stage, var)?;
                    if *factor == 0 {
                        return Err(ScheduleError::ZeroSplit { stage, var: var.clone() });
                    }
                    if outer == inner {
                        return Err(ScheduleError::DuplicateVar { stage, var: outer.clone() });
                    }
                    for v in [outer, inner] {
                        if v != var && nest.position(v).is_some() {
                            return Err(ScheduleError::DuplicateVar { stage, var: v.clone() });
                        }
                    }
                    nest.axes.splice(pos..=pos, [inner.clone(), outer.clone()]);
                    nest.splits.push(Split {
                        var: var.clone(),
                        outer: outer.clone(),
                        inner: inner.clone(),
                        factor: *factor,
                    });
                }
                LoopDirective::Reorder(vars) => {
                    let mut slots = Vec::with_capacity(vars.len());
                    for (i, v) in vars.iter().enumerate() {
                        if vars[..i].contains(v) {
                            return Err(ScheduleError::DuplicateVar { stage, var: v.clone() });
                        }
                        slots.push(nest.require(stage, v)?);
                    }
                    slots.sort_unstable();
                    for (slot, v) in slots.into_iter().zip(vars) {
                        nest.axes[slot] = v.clone();
                    }
                }
                LoopDirective::Bound { var, min, extent } => {
                    if !stage.dims().contains(var) || *extent == 0 {
                        return Err(ScheduleError::InvalidBound { stage, var: var.clone() });
                    }
                    if *min != 0 {
                        return Err(ScheduleError::Unsupported {
                            stage,
                            reason: format!("bound on '{var}' must start at 0"),
                        });
                    }
                }
                LoopDirective::Unroll(var) => {
                    nest.require(stage, var)?;
                    nest.unrolled.push(var.clone());
                }
                LoopDirective::Vectorize { var, width } => {
                    nest.require(stage, var)?;
                    if !VECTOR_WIDTHS.contains(width) {
                        return Err(ScheduleError::VectorWidth {
                            stage,
                            var: var.clone(),
                            width: *width,
                        });
                    }
                    nest.vectorized.push((var.clone(), *width));
                }
                LoopDirective::Parallel(var) => {
                    nest.require(stage, var)?;
                    nest.parallel.push(var.clone());
                }
                LoopDirective::GpuBlocks(vars) => {
                    for v in vars {
                        nest.require(stage, v)?;
                    }
                    nest.gpu_blocks.extend(vars.iter().cloned());
                }
                LoopDirective::GpuThreads(vars) => {
                    for v in vars {
                        nest.require(stage, v)?;
                    }
                    nest.gpu_threads.extend(vars.iter().cloned());
                }
            }
        }

        for (kind, vars) in [("block", &nest.gpu_blocks), ("thread", &nest.gpu_threads)] {
            if vars.len() > 3 {
                return Err(ScheduleError::TooManyGpuDims { stage, kind, count: vars.len() });
            }
        }

        // A later split can remove an axis named by an earlier directive.
        let marked = nest
            .unrolled
            .iter()
            .chain(&nest.parallel)
            .chain(nest.vectorized.iter().map(|(v, _)| v))
            .chain(&nest.gpu_blocks)
            .chain(&nest.gpu_threads);
        for v in marked {
            nest.require(stage, v)?;
        }

        for v in &nest.unrolled {
            let constant = sched.bound_of(v).is_some() || nest.splits.iter().any(|s| &s.inner == v);
            if !constant {
                return Err(ScheduleError::UnrollWithoutBound { stage, var: v.clone() });
            }
        }

        if !nest.parallel.is_empty() && nest.is_device() {
            return Err(ScheduleError::ParallelOnDevice { stage });
        }
        Ok(nest)
    }

    fn position(&self, var: &Var) -> Option<usize> {
        self.axes.iter().position(|v| v == var)
    }

    fn require(&self, stage: StageId, var: &Var) -> Result<usize> {
        self.position(var)
            .ok_or_else(|| ScheduleError::UnknownVar { stage, var: var.clone() })
    }

    fn is_device(&self) -> bool {
        !self.gpu_blocks.is_empty() || !self.gpu_threads.is_empty()
    }

    fn has_loop_directives(&self) -> bool {
        !self.splits.is_empty()
            || !self.vectorized.is_empty()
            || !self.unrolled.is_empty()
            || !self.parallel.is_empty()
            || self.is_device()
    }
}

/// Checks compute, store and memory placement of one stage.
fn check_levels(
    stage: StageId,
    sched: &StageSchedule,
    nests: &BTreeMap<StageId, LoopNest>,
) -> Result<()> {
    let consumer_axis = |consumer: StageId, var: &Var| -> Result<usize> {
        if !consumer.depends_on(stage) {
            return Err(ScheduleError::NotAConsumer { stage, consumer });
        }
        nests[&consumer]
            .position(var)
            .ok_or_else(|| ScheduleError::UnknownVar { stage: consumer, var: var.clone() })
    };

    if stage == StageId::OUTPUT {
        let nested_compute = matches!(
            sched.compute,
            ComputeLevel::At { .. } | ComputeLevel::GpuBlocks { .. }
        );
        let nested_store = matches!(sched.store, Some(StoreLevel::At { .. }));
        if nested_compute || nested_store {
            return Err(ScheduleError::OutputNotRoot { stage });
        }
    }

    match (&sched.compute, &sched.store) {
        (ComputeLevel::Inline, Some(_)) if stage != StageId::OUTPUT => {
            return Err(ScheduleError::StoreWithoutCompute { stage });
        }
        (ComputeLevel::Root, Some(StoreLevel::At { .. })) => {
            return Err(ScheduleError::StoreInsideCompute { stage });
        }
        (ComputeLevel::At { consumer, var }, store) => {
            let compute_pos = consumer_axis(*consumer, var)?;
            if let Some(StoreLevel::At { consumer: store_consumer, var: store_var }) = store {
                let store_pos = consumer_axis(*store_consumer, store_var)?;
                if store_consumer != consumer {
                    return Err(ScheduleError::Unsupported {
                        stage,
                        reason: "store and compute levels name different consumers".into(),
                    });
                }
                if store_pos < compute_pos {
                    return Err(ScheduleError::StoreInsideCompute { stage });
                }
            }
        }
        (ComputeLevel::GpuBlocks { consumer }, store) => {
            if !consumer.depends_on(stage) {
                return Err(ScheduleError::NotAConsumer { stage, consumer: *consumer });
            }
            if nests[consumer].gpu_blocks.is_empty() {
                return Err(ScheduleError::ConsumerNotOnDevice { stage, consumer: *consumer });
            }
            if matches!(store, Some(StoreLevel::At { .. })) {
                return Err(ScheduleError::Unsupported {
                    stage,
                    reason: "block-level stages are stored with their block or at root".into(),
                });
            }
        }
        _ => {}
    }

    let at_blocks = matches!(sched.compute, ComputeLevel::GpuBlocks { .. });
    if sched.memory == MemoryType::GpuShared && !at_blocks {
        return Err(ScheduleError::SharedOutsideBlocks { stage });
    }
    let nest = &nests[&stage];
    if !nest.gpu_threads.is_empty() && nest.gpu_blocks.is_empty() && !at_blocks {
        return Err(ScheduleError::ThreadsWithoutBlocks { stage });
    }
    Ok(())
}

fn validate(schedule: &Schedule, target: &Target) -> Result<BTreeMap<StageId, LoopNest>> {
    let mut nests = BTreeMap::new();
    for stage in StageId::ALL {
        nests.insert(stage, LoopNest::build(stage, &schedule.stage(stage))?);
    }
    for stage in StageId::ALL {
        check_levels(stage, &schedule.stage(stage), &nests)?;
    }
    if target.device_api().is_none() {
        for stage in StageId::ALL {
            let sched = schedule.stage(stage);
            let device_mapped = nests[&stage].is_device()
                || matches!(sched.compute, ComputeLevel::GpuBlocks { .. })
                || sched.memory == MemoryType::GpuShared;
            if device_mapped {
                return Err(ScheduleError::DeviceScheduleOnHost { stage });
            }
        }
    }
    Ok(nests)
}

// =============================================================================
// Lowering
// =============================================================================

/// Validates `schedule` against `target` and lowers it.
///
/// A schedule whose output carries gpu blocks lowers to [`Plan::Tiles`];
/// anything else lowers to [`Plan::Strips`], whatever the target.
pub fn lower(schedule: &Schedule, target: &Target) -> Result<Plan> {
    let nests = validate(schedule, target)?;
    let lowering = Lowering { schedule, nests };
    if lowering.nest(StageId::Curved).is_device() {
        lowering.tiles().map(Plan::Tiles)
    } else {
        lowering.strips().map(Plan::Strips)
    }
}

struct Lowering<'a> {
    schedule: &'a Schedule,
    nests: BTreeMap<StageId, LoopNest>,
}

fn unsupported(stage: StageId, reason: impl Into<String>) -> ScheduleError {
    ScheduleError::Unsupported { stage, reason: reason.into() }
}

impl Lowering<'_> {
    fn stage(&self, stage: StageId) -> Cow<'_, StageSchedule> {
        self.schedule.stage(stage)
    }

    fn nest(&self, stage: StageId) -> &LoopNest {
        &self.nests[&stage]
    }

    fn channels(&self) -> ChannelPlan {
        ChannelPlan {
            bound: self.stage(StageId::Curved).bound_of(&Var::C).map(|(_, extent)| extent),
            unrolled: self.nest(StageId::Curved).unrolled.contains(&Var::C),
        }
    }

    fn require_inline(&self, stage: StageId, reason: &str) -> Result<()> {
        let inline = matches!(self.stage(stage).compute, ComputeLevel::Inline);
        if !inline || self.nest(stage).has_loop_directives() {
            return Err(unsupported(stage, reason));
        }
        Ok(())
    }

    /// Lane count from a stage's only permitted directive, `vectorize(x)`.
    fn row_lanes(&self, stage: StageId) -> Result<u32> {
        let nest = self.nest(stage);
        if !nest.splits.is_empty() || !nest.unrolled.is_empty() || !nest.parallel.is_empty() {
            return Err(unsupported(stage, "row buffers only take vectorize(x)"));
        }
        match nest.vectorized.as_slice() {
            [] => Ok(1),
            [(v, width)] if *v == Var::X => Ok(*width),
            _ => Err(unsupported(stage, "row buffers only take vectorize(x)")),
        }
    }

    fn lut(&self, on_device: bool) -> Result<LutPlan> {
        let stage = StageId::Lut;
        let sched = self.stage(stage);
        let nest = self.nest(stage);
        match sched.compute {
            ComputeLevel::Inline => {
                if nest.has_loop_directives() {
                    return Err(unsupported(stage, "an inlined lut takes no loop directives"));
                }
                Ok(LutPlan { materialized: false, block: None })
            }
            ComputeLevel::Root if !nest.is_device() => {
                if nest.has_loop_directives() {
                    return Err(unsupported(stage, "a host lut takes no loop directives"));
                }
                Ok(LutPlan { materialized: true, block: None })
            }
            ComputeLevel::Root => {
                if !on_device {
                    return Err(unsupported(stage, "a device lut needs a device-mapped output"));
                }
                let simple = nest.vectorized.is_empty() && nest.unrolled.is_empty();
                match (nest.splits.as_slice(), nest.gpu_blocks.as_slice(), nest.gpu_threads.as_slice()) {
                    ([s], [b], [t]) if simple && *b == s.outer && *t == s.inner => {
                        if s.factor > MAX_BLOCK_THREADS {
                            return Err(unsupported(
                                stage,
                                format!("{} threads per block exceeds {MAX_BLOCK_THREADS}", s.factor),
                            ));
                        }
                        Ok(LutPlan { materialized: true, block: Some(s.factor) })
                    }
                    _ => Err(unsupported(
                        stage,
                        "a device lut splits i into one block axis and one thread axis",
                    )),
                }
            }
            _ => Err(unsupported(stage, "lut is computed at root or inlined")),
        }
    }

    fn strips(&self) -> Result<StripPlan> {
        let stage = StageId::Curved;
        let nest = self.nest(stage);

        let mut y_split = None;
        for s in &nest.splits {
            if s.var == Var::Y && y_split.is_none() {
                y_split = Some(s);
            } else {
                return Err(unsupported(
                    stage,
                    format!("host schedules split only y of the output, not '{}'", s.var),
                ));
            }
        }
        let row = y_split.map_or(Var::Y, |s| s.inner.clone());
        let strip_var = y_split.map(|s| s.outer.clone());

        let parallel = match nest.parallel.as_slice() {
            [] => false,
            [v] if Some(v) == strip_var.as_ref() || (strip_var.is_none() && *v == Var::Y) => true,
            [v, ..] => {
                return Err(unsupported(
                    stage,
                    format!("cannot parallelize '{v}'; parallelize y or its outer split"),
                ));
            }
        };
        let strip_height = match y_split {
            Some(s) => Some(s.factor),
            None if parallel => Some(1),
            None => None,
        };

        if let Some((v, _)) = nest.vectorized.first() {
            return Err(unsupported(
                stage,
                format!("cannot vectorize '{v}' of the output; vectorize sharpen or padded"),
            ));
        }
        if let Some(v) = nest.unrolled.iter().find(|v| **v != Var::C) {
            return Err(unsupported(stage, format!("only c of the output unrolls, not '{v}'")));
        }

        let order = match (nest.position(&Var::C), nest.position(&Var::X)) {
            (Some(c), Some(x)) if c < x => ChannelOrder::Interleaved,
            _ => ChannelOrder::Planar,
        };

        self.require_inline(StageId::Padded16, "padded16 is always inlined")?;

        Ok(StripPlan {
            lut: self.lut(false)?,
            channels: self.channels(),
            order,
            strip_height,
            parallel,
            sharpen: self.strip_sharpen(&row)?,
            padded: self.strip_padded(&row, strip_var.as_ref(), parallel)?,
        })
    }

    fn strip_sharpen(&self, row: &Var) -> Result<SharpenPlan> {
        let stage = StageId::Sharpen;
        match &self.stage(stage).compute {
            ComputeLevel::Inline => {
                self.require_inline(stage, "an inlined sharpen takes no loop directives")?;
                Ok(SharpenPlan::Inline)
            }
            ComputeLevel::At { consumer: StageId::Curved, var } if var == row => {
                Ok(SharpenPlan::Row { lanes: self.row_lanes(stage)? })
            }
            _ => Err(unsupported(
                stage,
                format!("sharpen is inlined or computed per output row (at curved.{row})"),
            )),
        }
    }

    fn strip_padded(&self, row: &Var, strip_var: Option<&Var>, parallel: bool) -> Result<PaddedPlan> {
        let stage = StageId::Padded;
        let sched = self.stage(stage);
        match &sched.compute {
            ComputeLevel::Inline => {
                self.require_inline(stage, "an inlined padded takes no loop directives")?;
                Ok(PaddedPlan::Inline)
            }
            ComputeLevel::Root => Ok(PaddedPlan::Root { lanes: self.row_lanes(stage)? }),
            ComputeLevel::At { consumer: StageId::Curved, var } if var == row => {
                let lanes = self.row_lanes(stage)?;
                let reuse = match &sched.store {
                    None => false,
                    Some(StoreLevel::At { var, .. }) if var == row => false,
                    Some(StoreLevel::At { var, .. }) if Some(var) == strip_var => true,
                    Some(StoreLevel::Root) if !parallel => true,
                    Some(_) => {
                        return Err(unsupported(
                            stage,
                            "padded rows are stored per row, per strip, or at root for serial strips",
                        ));
                    }
                };
                Ok(PaddedPlan::Scanline { lanes, reuse })
            }
            _ => Err(unsupported(
                stage,
                format!("padded is inlined, computed at root, or per output row (at curved.{row})"),
            )),
        }
    }

    fn tiles(&self) -> Result<TilePlan> {
        let stage = StageId::Curved;
        let nest = self.nest(stage);

        let split_of = |v: &Var| nest.splits.iter().find(|s| &s.var == v);
        let (Some(xs), Some(ys)) = (split_of(&Var::X), split_of(&Var::Y)) else {
            return Err(unsupported(stage, "device output must be tiled over x and y (gpu_tile)"));
        };
        if nest.splits.len() != 2 {
            return Err(unsupported(stage, "device output must be tiled over x and y (gpu_tile)"));
        }
        let same = |mapped: &[Var], expected: [&Var; 2]| {
            mapped.len() == 2 && expected.iter().all(|v| mapped.contains(v))
        };
        if !same(&nest.gpu_blocks, [&xs.outer, &ys.outer])
            || !same(&nest.gpu_threads, [&xs.inner, &ys.inner])
        {
            return Err(unsupported(
                stage,
                "gpu blocks must be the outer tile axes and gpu threads the inner ones",
            ));
        }
        if !nest.vectorized.is_empty() {
            return Err(unsupported(stage, "device stages are not vectorized"));
        }
        if let Some(v) = nest.unrolled.iter().find(|v| **v != Var::C) {
            return Err(unsupported(stage, format!("only c of the output unrolls, not '{v}'")));
        }
        let threads = xs.factor.saturating_mul(ys.factor);
        if threads > MAX_BLOCK_THREADS {
            return Err(unsupported(
                stage,
                format!("{}x{} tiles exceed {MAX_BLOCK_THREADS} threads per block", xs.factor, ys.factor),
            ));
        }

        self.require_inline(StageId::Padded16, "padded16 is always inlined")?;
        self.require_inline(StageId::Sharpen, "sharpen must be inlined into device tiles")?;

        Ok(TilePlan {
            lut: self.lut(true)?,
            channels: self.channels(),
            tile_width: xs.factor,
            tile_height: ys.factor,
            padded_shared: self.tile_padded()?,
        })
    }

    fn tile_padded(&self) -> Result<bool> {
        let stage = StageId::Padded;
        let sched = self.stage(stage);
        let nest = self.nest(stage);
        match sched.compute {
            ComputeLevel::Inline => {
                self.require_inline(stage, "an inlined padded takes no loop directives")?;
                Ok(false)
            }
            ComputeLevel::GpuBlocks { consumer: StageId::Curved } => {
                if sched.memory != MemoryType::GpuShared {
                    return Err(unsupported(stage, "block-level padded tiles live in shared memory"));
                }
                let threads_ok = nest
                    .gpu_threads
                    .iter()
                    .all(|v| *v == Var::X || *v == Var::Y);
                let other = !nest.splits.is_empty()
                    || !nest.vectorized.is_empty()
                    || !nest.unrolled.is_empty()
                    || !nest.gpu_blocks.is_empty();
                if !threads_ok || other {
                    return Err(unsupported(stage, "shared padded tiles take only gpu_threads(x, y)"));
                }
                Ok(true)
            }
            _ => Err(unsupported(stage, "padded is inlined or computed per block of curved")),
        }
    }
}
