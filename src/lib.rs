//! ### English
//! `frame_concurrency_core`: the sender/receiver task runtime, scheduler
//! flavors, and frame-pipelining core described in this crate's design
//! documents. `ffi`/process-entry concerns are deliberately not part of this
//! library (spec.md §1 Non-goals: no concrete renderer/windowing backend,
//! no process entry point) — callers construct [`frame::FramePipeline`]
//! directly with their own collaborators.
//!
//! ### 中文
//! `frame_concurrency_core`：本 crate 设计文档所描述的 sender/receiver 任务
//! 运行时、各调度器形态，以及 frame-pipelining 核心。`ffi`/进程入口相关的
//! 关注点刻意不属于本库（spec.md §1 Non-goals：不含具体渲染器/窗口后端，
//! 不含进程入口点）——调用方应直接用自己的协作方构造 [`frame::
//! FramePipeline`]。

pub mod config;
pub mod ecs;
pub mod error;
pub mod frame;

pub mod logging;

pub(crate) mod park;
pub(crate) mod scheduler;
pub(crate) mod static_scope;
pub(crate) mod sync;
pub(crate) mod task;
