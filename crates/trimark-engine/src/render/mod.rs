//! GPU rendering subsystem.
//!
//! Stages issue GPU commands via wgpu against the context pair defined here.
//! Each stage is responsible for its own GPU resources (pipelines, buffers).

mod ctx;

pub use ctx::{RenderCtx, RenderTarget};
