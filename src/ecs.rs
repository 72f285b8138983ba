//! ### English
//! The ECS world adapter (§4.8, §6, added): `EcsWorld::progress` is the
//! single entry point the frame pipeline's `TickECS` step calls into.
//! Returning `false` signals engine shutdown. The source engine instead
//! exposes `progress(delta_seconds) -> bool` against a process-global
//! `CCurrentFramePacket` singleton; per the Design Note in spec.md §9
//! ("pass an `EngineContext` reference explicitly ... avoid true
//! process-global state"), that singleton becomes a plain `&mut FramePacket`
//! parameter here instead.
//!
//! ### 中文
//! ECS world 适配层（§4.8、§6，新增）：`EcsWorld::progress` 是 frame pipeline
//! 的 `TickECS` 步骤所调用的唯一入口。返回 `false` 表示引擎应当关闭。源引擎
//! 采用的是针对进程全局单例 `CCurrentFramePacket` 的 `progress(delta_seconds)
//! -> bool`；按照 spec.md §9 的设计说明（“显式传递 `EngineContext` 引用……
//! 避免真正的进程全局状态”），这里将该单例改为一个普通的 `&mut FramePacket`
//! 参数。

use crate::frame::packet::FramePacket;

/// ### English
/// Implemented by the embedder's ECS/game-logic layer. Invoked from the
/// OS-polling thread (§5: "ECS world: single-threaded; only accessed from
/// the OS-polling thread and from frame-scope tasks explicitly rescheduled
/// there").
///
/// ### 中文
/// 由宿主的 ECS/游戏逻辑层实现。从 OS-polling 线程调用（§5：“ECS world：
/// 单线程；仅从 OS-polling 线程，以及显式重新调度到该线程的 frame-scope
/// 任务中访问”）。
pub trait EcsWorld: Send {
    /// ### English
    /// Advances the world by `delta_seconds`, filling `packet` with this
    /// frame's renderer-bound snapshot. Returns `false` to request engine
    /// shutdown after the current frame finishes draining.
    ///
    /// ### 中文
    /// 将世界推进 `delta_seconds`，并将本帧面向渲染器的快照填入 `packet`。
    /// 返回 `false` 表示在当前帧排空完成后请求引擎关闭。
    fn progress(&mut self, delta_seconds: f32, packet: &mut FramePacket) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingWorld {
        ticks_remaining: u32,
    }

    impl EcsWorld for CountingWorld {
        fn progress(&mut self, _delta_seconds: f32, packet: &mut FramePacket) -> bool {
            packet.static_meshes.clear();
            if self.ticks_remaining == 0 {
                return false;
            }
            self.ticks_remaining -= 1;
            true
        }
    }

    #[test]
    fn progress_signals_shutdown_when_exhausted() {
        let mut world = CountingWorld { ticks_remaining: 2 };
        let mut packet = FramePacket::empty();
        assert!(world.progress(0.016, &mut packet));
        assert!(world.progress(0.016, &mut packet));
        assert!(!world.progress(0.016, &mut packet));
    }
}
