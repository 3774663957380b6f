//! Benchmark stages.
//!
//! A stage owns a tunable rendering workload. The host drives it with a
//! `tune` / `animate` pair once per frame, strictly in that order, and reads
//! back `complexity` as the throughput metric.

mod flags;
mod instances;
mod partition;
mod shaders;
mod triangles;

pub use flags::{normalize, resolve, Fallback, ResolvedFlags, StageOptions, Strategy};
pub use instances::{Instance, InstanceSet};
pub use triangles::{TriangleStage, CLEAR_COLOR};

use crate::render::{RenderCtx, RenderTarget};
use crate::time::FrameTime;

/// Capability interface implemented by every benchmark stage.
pub trait Stage {
    /// Adjusts the live workload size by `delta` units, clamped at zero.
    fn tune(&mut self, delta: i64);

    /// Renders one frame of the workload into `target`.
    ///
    /// The surface has already been cleared by the caller.
    fn animate(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, time: FrameTime);

    /// Current live workload size, consumed by the measurement loop.
    fn complexity(&self) -> u64;
}
