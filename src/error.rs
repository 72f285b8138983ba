//! ### English
//! Error taxonomy for the frame concurrency core.
//!
//! Cancellation is represented by the sender/receiver `set_done` path, not by
//! this enum — see [`crate::task`]. `CoreError` covers the remaining three
//! kinds from the design: transient/recoverable conditions, resource lookups
//! that fail without being fatal, and device/OS failures that are fatal.
//! Programming invariant violations are not represented here at all; they
//! panic immediately via [`invariant_violation`].
//!
//! ### 中文
//! 本核心库的错误分类。
//!
//! 取消（cancellation）通过 sender/receiver 的 `set_done` 路径表达，不在本枚举中，
//! 详见 [`crate::task`]。`CoreError` 覆盖设计中剩余的三类：可恢复的瞬态错误、
//! 查找失败但非致命的资源错误，以及致命的设备/OS 错误。程序不变式违规不在此表达，
//! 会通过 [`invariant_violation`] 立即 panic。

use thiserror::Error;

/// ### English
/// Transient, recoverable failure kinds that are retried or skipped for the
/// current frame rather than propagated as fatal.
///
/// ### 中文
/// 可重试/可跳过的瞬态可恢复失败类型，不会作为致命错误向上传播。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// ### English
    /// A swapchain image acquire returned `OutOfDate`; the window's
    /// swapchain must be recreated on the OS-polling thread.
    ///
    /// ### 中文
    /// swapchain 图像 acquire 返回 `OutOfDate`；该窗口的 swapchain 需要在
    /// OS-polling 线程上重建。
    SwapchainOutOfDate,
    /// ### English
    /// A swapchain image acquire returned `Suboptimal`; presentation can
    /// continue this frame but recreation should happen soon.
    ///
    /// ### 中文
    /// swapchain 图像 acquire 返回 `Suboptimal`；本帧仍可继续呈现，但应尽快重建。
    SwapchainSuboptimal,
    /// ### English
    /// A blocking I/O call found the underlying resource busy; the caller
    /// may retry.
    ///
    /// ### 中文
    /// 阻塞 I/O 调用发现底层资源繁忙；调用方可重试。
    ResourceBusy,
}

/// ### English
/// Error taxonomy surfaced through `set_error` on a sender's receiver, or
/// returned from blocking calls that fail.
///
/// ### 中文
/// 通过 sender 的 `set_error` 向上传播、或由失败的阻塞调用返回的错误分类。
#[derive(Debug, Error)]
pub enum CoreError {
    /// ### English
    /// Transient/recoverable condition (see [`TransientKind`]).
    ///
    /// ### 中文
    /// 瞬态可恢复情况（见 [`TransientKind`]）。
    #[error("transient condition: {0:?}")]
    Transient(TransientKind),

    /// ### English
    /// Resource lookup failed (e.g. asset missing). Never fatal to the core.
    ///
    /// ### 中文
    /// 资源查找失败（例如资源缺失）。对核心库而言永不致命。
    #[error("resource not found: {0}")]
    NotFound(String),

    /// ### English
    /// Device/OS fatal condition: fence wait failure, device loss, or
    /// allocation failure with no recovery policy. Propagation policy: log
    /// at `error!` severity and terminate the process.
    ///
    /// ### 中文
    /// 设备/OS 致命情况：fence 等待失败、设备丢失，或无恢复策略的分配失败。
    /// 传播策略：以 `error!` 级别记录日志后终止进程。
    #[error("device fatal: {0}")]
    DeviceFatal(String),
}

/// ### English
/// Reports a programming invariant violation and terminates the process with
/// a panic message identifying the location, per the error design's
/// "immediate process termination" requirement for this error kind.
///
/// In debug builds this additionally triggers a debugger trap before
/// unwinding, matching the source engine's fatal-error behavior.
///
/// #### Parameters
/// - `what`: Short description of the violated invariant.
///
/// ### 中文
/// 报告程序不变式违规，并以带位置信息的 panic 终止进程，对应错误设计中该类错误
/// “立即终止进程”的要求。
///
/// 在 debug 构建下，会在展开之前额外触发一次调试器 trap，与源引擎的致命错误行为一致。
///
/// #### 参数
/// - `what`：被违反不变式的简要描述。
#[track_caller]
pub fn invariant_violation(what: &str) -> ! {
    debug_trap();
    panic!("invariant violation: {what}");
}

/// ### English
/// Logs a device/OS fatal error and aborts the process. Debug builds trap
/// into the debugger first so the failure can be inspected in place.
///
/// #### Parameters
/// - `err`: The fatal error to report before aborting.
///
/// ### 中文
/// 记录设备/OS 致命错误并终止进程。debug 构建会先触发调试器 trap，便于就地检查。
///
/// #### 参数
/// - `err`：终止前要上报的致命错误。
#[track_caller]
pub fn fatal(err: CoreError) -> ! {
    tracing::error!(error = %err, "fatal error, terminating");
    debug_trap();
    std::process::abort();
}

/// ### English
/// Debug-build debugger trap; a no-op in release builds.
///
/// ### 中文
/// debug 构建下的调试器 trap；release 构建为空操作。
#[inline]
fn debug_trap() {
    #[cfg(debug_assertions)]
    {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            std::arch::asm!("int3", options(nomem, nostack));
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            std::process::abort();
        }
    }
}
