//! ### English
//! Structured-logging convenience (§7, added). This crate logs through
//! `tracing` throughout (worker/blocking spans, `fatal`'s `error!` call);
//! installing a subscriber is the embedder's choice, but `init()` wires up a
//! reasonable default for binaries and tests that don't want to, mirroring
//! the pack's `k23`/`async-exec` convention of an env-filtered
//! `fmt` subscriber.
//!
//! ### 中文
//! 结构化日志的便捷入口（§7，新增）。本 crate 自始至终通过 `tracing` 记录
//! 日志（worker/blocking span、`fatal` 的 `error!` 调用）；安装 subscriber
//! 是宿主自己的选择，但 `init()` 为不想自己安装的二进制程序和测试提供了一个
//! 合理的默认值，沿用本参考包中 `k23`/`async-exec` 那种带 env-filter 的
//! `fmt` subscriber 的做法。

use tracing_subscriber::EnvFilter;

/// ### English
/// Installs a `tracing-subscriber` `fmt` layer filtered by `RUST_LOG` (default
/// `info`). Safe to call more than once; later calls are no-ops since
/// `tracing`'s global dispatcher can only be set once.
///
/// ### 中文
/// 安装一个按 `RUST_LOG` 过滤（默认 `info`）的 `tracing-subscriber` `fmt`
/// layer。可安全地多次调用；由于 `tracing` 的全局 dispatcher 只能设置一次，
/// 后续调用为空操作。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
