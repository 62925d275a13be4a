//! Schedules: execution directives attached to pipeline stages.
//!
//! A [`Schedule`] is plain data. It records, per stage, where the stage is
//! computed and stored and which loop transformations apply to it. Nothing is
//! checked while building; `compile` validates the whole schedule at once and
//! reports a [`ScheduleError`](crate::ScheduleError) for contradictions.
//!
//! # Example
//!
//! ```rust
//! use pixsched_compute::schedule::{Schedule, Var};
//! use pixsched_compute::StageId;
//!
//! let (yo, yi) = (Var::new("yo"), Var::new("yi"));
//! let schedule = Schedule::builder("strips")
//!     .stage(StageId::Lut, |s| s.compute_root())
//!     .stage(StageId::Curved, |s| s.split(Var::Y, yo.clone(), yi, 16).parallel(yo))
//!     .build();
//! assert_eq!(schedule.name(), "strips");
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::pipeline::StageId;

/// A named loop axis.
///
/// Pure dimensions are [`Var::X`], [`Var::Y`], [`Var::C`] and [`Var::I`]; splits
/// introduce new axes with caller-chosen names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(Cow<'static, str>);

impl Var {
    pub const X: Var = Var::new("x");
    pub const Y: Var = Var::new("y");
    pub const C: Var = Var::new("c");
    pub const I: Var = Var::new("i");

    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Axis name derived from this one, e.g. `x` + `o` = `xo`.
    pub fn suffixed(&self, suffix: &str) -> Self {
        Self(Cow::Owned(format!("{}{}", self.0, suffix)))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a stage is computed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComputeLevel {
    /// Recomputed at every use.
    #[default]
    Inline,
    /// Computed once, before anything that reads it.
    Root,
    /// Computed per iteration of `var` in `consumer`'s loop nest.
    At { consumer: StageId, var: Var },
    /// Computed once per gpu block of `consumer`.
    GpuBlocks { consumer: StageId },
}

/// Where a stage's buffer is allocated and retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLevel {
    Root,
    At { consumer: StageId, var: Var },
}

/// Memory a stage's buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryType {
    #[default]
    Heap,
    /// Fast memory shared by the threads of one gpu block.
    GpuShared,
}

/// One loop transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopDirective {
    /// Replace `var` with `outer * factor + inner`.
    Split { var: Var, outer: Var, inner: Var, factor: u32 },
    /// Loop order, innermost first.
    Reorder(Vec<Var>),
    /// Promise that `var` covers exactly `[min, min + extent)`.
    Bound { var: Var, min: i32, extent: u32 },
    Unroll(Var),
    Vectorize { var: Var, width: u32 },
    Parallel(Var),
    GpuBlocks(Vec<Var>),
    GpuThreads(Vec<Var>),
}

/// Directives for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageSchedule {
    pub compute: ComputeLevel,
    /// `None` stores at the compute level.
    pub store: Option<StoreLevel>,
    pub memory: MemoryType,
    pub directives: Vec<LoopDirective>,
}

impl StageSchedule {
    /// Extent promised by a `bound` on `var`, if any.
    pub fn bound_of(&self, var: &Var) -> Option<(i32, u32)> {
        self.directives.iter().rev().find_map(|d| match d {
            LoopDirective::Bound { var: v, min, extent } if v == var => Some((*min, *extent)),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A complete schedule for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    name: String,
    stages: BTreeMap<StageId, StageSchedule>,
}

impl Schedule {
    pub fn builder(name: impl Into<String>) -> ScheduleBuilder {
        ScheduleBuilder {
            schedule: Schedule {
                name: name.into(),
                stages: BTreeMap::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directives for `stage` (defaults if the stage was never scheduled).
    pub fn stage(&self, stage: StageId) -> Cow<'_, StageSchedule> {
        match self.stages.get(&stage) {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(StageSchedule::default()),
        }
    }

    /// Scheduled stages, in pipeline order.
    pub fn stages(&self) -> impl Iterator<Item = (StageId, &StageSchedule)> {
        self.stages.iter().map(|(id, s)| (*id, s))
    }
}

/// Builds a [`Schedule`] stage by stage.
#[derive(Debug, Clone)]
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    /// Adds directives to `stage`; repeated calls append.
    pub fn stage(mut self, stage: StageId, f: impl FnOnce(StageBuilder) -> StageBuilder) -> Self {
        let current = self.schedule.stages.remove(&stage).unwrap_or_default();
        let built = f(StageBuilder { inner: current }).inner;
        self.schedule.stages.insert(stage, built);
        self
    }

    pub fn build(self) -> Schedule {
        self.schedule
    }
}

/// Directive recorder for one stage.
#[derive(Debug, Clone)]
pub struct StageBuilder {
    inner: StageSchedule,
}

impl StageBuilder {
    pub fn compute_root(mut self) -> Self {
        self.inner.compute = ComputeLevel::Root;
        self
    }

    pub fn compute_inline(mut self) -> Self {
        self.inner.compute = ComputeLevel::Inline;
        self
    }

    pub fn compute_at(mut self, consumer: StageId, var: Var) -> Self {
        self.inner.compute = ComputeLevel::At { consumer, var };
        self
    }

    pub fn compute_at_gpu_blocks(mut self, consumer: StageId) -> Self {
        self.inner.compute = ComputeLevel::GpuBlocks { consumer };
        self
    }

    pub fn store_root(mut self) -> Self {
        self.inner.store = Some(StoreLevel::Root);
        self
    }

    pub fn store_at(mut self, consumer: StageId, var: Var) -> Self {
        self.inner.store = Some(StoreLevel::At { consumer, var });
        self
    }

    pub fn store_in(mut self, memory: MemoryType) -> Self {
        self.inner.memory = memory;
        self
    }

    pub fn split(self, var: Var, outer: Var, inner: Var, factor: u32) -> Self {
        self.push(LoopDirective::Split { var, outer, inner, factor })
    }

    pub fn reorder(self, vars: impl IntoIterator<Item = Var>) -> Self {
        self.push(LoopDirective::Reorder(vars.into_iter().collect()))
    }

    pub fn bound(self, var: Var, min: i32, extent: u32) -> Self {
        self.push(LoopDirective::Bound { var, min, extent })
    }

    pub fn unroll(self, var: Var) -> Self {
        self.push(LoopDirective::Unroll(var))
    }

    pub fn vectorize(self, var: Var, width: u32) -> Self {
        self.push(LoopDirective::Vectorize { var, width })
    }

    pub fn parallel(self, var: Var) -> Self {
        self.push(LoopDirective::Parallel(var))
    }

    pub fn gpu_blocks(self, vars: impl IntoIterator<Item = Var>) -> Self {
        self.push(LoopDirective::GpuBlocks(vars.into_iter().collect()))
    }

    pub fn gpu_threads(self, vars: impl IntoIterator<Item = Var>) -> Self {
        self.push(LoopDirective::GpuThreads(vars.into_iter().collect()))
    }

    /// Tiles `x`/`y` into `tx` x `ty` blocks of threads.
    ///
    /// Shorthand for splitting both axes (`xo, xi`, `yo, yi`), ordering the
    /// inner axes inside the outer ones, mapping the outer axes to gpu blocks
    /// and the inner axes to gpu threads.
    pub fn gpu_tile(self, x: Var, y: Var, tx: u32, ty: u32) -> Self {
        let (xo, xi) = (x.suffixed("o"), x.suffixed("i"));
        let (yo, yi) = (y.suffixed("o"), y.suffixed("i"));
        self.split(x, xo.clone(), xi.clone(), tx)
            .split(y, yo.clone(), yi.clone(), ty)
            .reorder([xi.clone(), yi.clone(), xo.clone(), yo.clone()])
            .gpu_blocks([xo, yo])
            .gpu_threads([xi, yi])
    }

    fn push(mut self, directive: LoopDirective) -> Self {
        self.inner.directives.push(directive);
        self
    }
}
