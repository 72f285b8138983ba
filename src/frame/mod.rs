//! ### English
//! The frame pipeline subsystem (§3/§4.8/§5/§6): the inflight resource ring,
//! the per-frame snapshot type, the FIFO `async_mutex`, the reference
//! blocking-pool-backed file system, and the orchestrator itself.
//!
//! ### 中文
//! frame pipeline 子系统（§3/§4.8/§5/§6）：inflight 资源 ring、逐帧快照类型、
//! FIFO `async_mutex`、基于 blocking pool 的参考文件系统实现，以及编排器本身。

pub(crate) mod blocking_file;
pub(crate) mod inflight;
pub(crate) mod mutex;
pub mod packet;
pub mod pipeline;

pub use blocking_file::BlockingFileSystem;
pub use pipeline::{
    AsyncFile, AsyncFileSystem, FramePipeline, NullRenderer, NullWindowing, PresentResult,
    RendererOps, RenderSubmission, SwapchainImage, WindowCreateInfo, WindowHandle, WindowingOps,
};

/// ### English
/// Re-exported so that the [`AsyncFile`]/[`AsyncFileSystem`]/[`RendererOps`]/
/// [`WindowingOps`] trait signatures above reference a path reachable from
/// outside the crate, even though [`crate::task`] itself is `pub(crate)`.
///
/// ### 中文
/// 重新导出，使上面 [`AsyncFile`]/[`AsyncFileSystem`]/[`RendererOps`]/
/// [`WindowingOps`] trait 签名中引用的类型拥有一条从 crate 外部可达的路径，
/// 即便 [`crate::task`] 本身是 `pub(crate)`。
pub use crate::task::sender::{box_sender, BoxSender, Outcome};
