//! ### English
//! Engine configuration consumed by the concurrency core.
//!
//! CLI parsing, config files, and environment variables are out of scope —
//! callers construct [`EngineConfig`] directly and pass it to the pieces that
//! need it (worker pool sizing, frame pipeline depth).
//!
//! ### 中文
//! 本核心库消费的引擎配置。
//!
//! CLI 解析、配置文件与环境变量不在范围内——调用方直接构造 [`EngineConfig`]，
//! 并传给需要它的部件（worker pool 规模、frame pipeline 深度）。

use std::path::PathBuf;

/// ### English
/// Compile-time cap on the inflight-frame ring size.
///
/// ### 中文
/// inflight 帧 ring 大小的编译期上限。
pub const MAX_INFLIGHT_FRAMES: usize = 4;

/// ### English
/// Engine-wide configuration options (§6 of the design). All fields have
/// sensible defaults; override only what you need.
///
/// ### 中文
/// 引擎级配置选项（设计文档 §6）。所有字段均有合理默认值；按需覆盖即可。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// ### English
    /// Depth of the frame pipeline / inflight ring, `1..=MAX_INFLIGHT_FRAMES`.
    ///
    /// ### 中文
    /// frame pipeline / inflight ring 的深度，取值范围 `1..=MAX_INFLIGHT_FRAMES`。
    pub inflight_frames: usize,
    /// ### English
    /// Worker pool size. `None` means `hardware_concurrency - 2` (clamped to
    /// at least 1).
    ///
    /// ### 中文
    /// worker pool 规模。`None` 表示 `hardware_concurrency - 2`（下限钳制为 1）。
    pub worker_threads: Option<usize>,
    /// ### English
    /// Blocking pool size. `None` means `hardware_concurrency`.
    ///
    /// ### 中文
    /// blocking pool 规模。`None` 表示 `hardware_concurrency`。
    pub blocking_threads: Option<usize>,
    /// ### English
    /// Application name, passed through to collaborators (window title,
    /// logging context, etc).
    ///
    /// ### 中文
    /// 应用名称，透传给协作方（窗口标题、日志上下文等）。
    pub app_name: String,
    /// ### English
    /// Base asset directory, passed through to the asset-loading collaborator.
    ///
    /// ### 中文
    /// 资源根目录，透传给资源加载协作方。
    pub base_asset_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inflight_frames: 2,
            worker_threads: None,
            blocking_threads: None,
            app_name: "frame-concurrency-core".to_string(),
            base_asset_path: None,
        }
    }
}

impl EngineConfig {
    /// ### English
    /// Creates a configuration with all defaults.
    ///
    /// ### 中文
    /// 创建一个全部取默认值的配置。
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Sets `inflight_frames`, clamped to `1..=MAX_INFLIGHT_FRAMES`.
    ///
    /// #### Parameters
    /// - `inflight_frames`: Requested ring depth.
    ///
    /// ### 中文
    /// 设置 `inflight_frames`，钳制在 `1..=MAX_INFLIGHT_FRAMES` 范围内。
    ///
    /// #### 参数
    /// - `inflight_frames`：期望的 ring 深度。
    pub fn with_inflight_frames(mut self, inflight_frames: usize) -> Self {
        self.inflight_frames = inflight_frames.clamp(1, MAX_INFLIGHT_FRAMES);
        self
    }

    /// ### English
    /// Sets an explicit worker-thread count.
    ///
    /// ### 中文
    /// 设置显式的 worker 线程数。
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count.max(1));
        self
    }

    /// ### English
    /// Sets an explicit blocking-thread count.
    ///
    /// ### 中文
    /// 设置显式的 blocking 线程数。
    pub fn with_blocking_threads(mut self, count: usize) -> Self {
        self.blocking_threads = Some(count.max(1));
        self
    }

    /// ### English
    /// Sets the application name.
    ///
    /// ### 中文
    /// 设置应用名称。
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// ### English
    /// Sets the base asset path.
    ///
    /// ### 中文
    /// 设置资源根目录。
    pub fn with_base_asset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_asset_path = Some(path.into());
        self
    }

    /// ### English
    /// Resolves the effective worker-thread count: `worker_threads` if set,
    /// otherwise `hardware_concurrency - 2` clamped to at least 1.
    ///
    /// ### 中文
    /// 解析最终生效的 worker 线程数：若设置了 `worker_threads` 则使用之，
    /// 否则使用 `hardware_concurrency - 2`（下限钳制为 1）。
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(2).max(1))
                .unwrap_or(1)
        })
    }

    /// ### English
    /// Resolves the effective blocking-thread count: `blocking_threads` if
    /// set, otherwise `hardware_concurrency`.
    ///
    /// ### 中文
    /// 解析最终生效的 blocking 线程数：若设置了 `blocking_threads` 则使用之，
    /// 否则使用 `hardware_concurrency`。
    pub fn resolved_blocking_threads(&self) -> usize {
        self.blocking_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.inflight_frames, 2);
        assert!(cfg.worker_threads.is_none());
        assert!(cfg.blocking_threads.is_none());
    }

    #[test]
    fn inflight_frames_clamped() {
        let cfg = EngineConfig::new().with_inflight_frames(99);
        assert_eq!(cfg.inflight_frames, MAX_INFLIGHT_FRAMES);
        let cfg = EngineConfig::new().with_inflight_frames(0);
        assert_eq!(cfg.inflight_frames, 1);
    }
}
