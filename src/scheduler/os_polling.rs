//! ### English
//! The OS-polling slot (§4.6): a single logical sender that always resumes on
//! the thread that owns the OS windows. Unlike [`super::worker_pool`], this
//! crate does not spawn the owning thread itself — windowing APIs require
//! calls from whichever thread created the window, which here is the
//! embedder's own thread running [`crate::frame::pipeline::FramePipeline::
//! run_event_loop`]. [`OsPollingSlot`] only supplies the parking primitive
//! and the binding/assertion that enforces the contract.
//!
//! ### 中文
//! OS-polling slot（§4.6）：一个始终在持有 OS 窗口的线程上恢复的单一逻辑
//! sender。与 [`super::worker_pool`] 不同，本库并不自行生成拥有该线程的线程——
//! 窗口 API 要求调用必须来自创建该窗口的那个线程，这里即是运行
//! [`crate::frame::pipeline::FramePipeline::run_event_loop`] 的嵌入方自身的
//! 线程。[`OsPollingSlot`] 仅提供挂起原语，以及强制该契约的绑定/断言。

use std::convert::Infallible;
use std::sync::Arc;
use std::thread::ThreadId;

use crate::park::parking_lot::{self, ParkingLot};
use crate::park::wait::ParkFuture;
use crate::sync::spinlock::Spinlock;
use crate::task::sender::{Outcome, Scheduler, Sender};

/// ### English
/// A pre-captured scheduler pinned to whichever thread calls
/// [`OsPollingSlot::bind_current_thread`]. **Contract (§4.6)**: all OS-window
/// creation, destruction, event polling, and any GLFW-equivalent call must be
/// preceded by awaiting `schedule()` on this slot; violating it is undefined
/// behavior, so debug builds assert the calling thread matches the bound one
/// inside [`OsPollingSlot::pump`].
///
/// ### 中文
/// 一个预先捕获、pin 在调用 [`OsPollingSlot::bind_current_thread`] 的线程上的
/// 调度器。**契约（§4.6）**：所有 OS 窗口创建、销毁、事件轮询，以及任何
/// GLFW 等价调用，都必须先 await 本 slot 的 `schedule()`；违反此契约是未定义
/// 行为，因此 debug 构建会在 [`OsPollingSlot::pump`] 内断言调用线程与绑定线程一致。
pub(crate) struct OsPollingSlot {
    lot: Arc<Spinlock<ParkingLot<()>>>,
    owner: Spinlock<Option<ThreadId>>,
}

impl OsPollingSlot {
    pub(crate) fn new() -> Self {
        Self {
            lot: Arc::new(Spinlock::new(ParkingLot::new())),
            owner: Spinlock::new(None),
        }
    }

    /// ### English
    /// Records the calling thread as the owner. Must be called once, from
    /// the engine's startup thread, before the first [`OsPollingSlot::pump`].
    ///
    /// ### 中文
    /// 将调用线程记录为所有者。必须在第一次 [`OsPollingSlot::pump`] 之前，
    /// 在引擎的启动线程上调用恰好一次。
    pub(crate) fn bind_current_thread(&self) {
        *self.owner.lock() = Some(std::thread::current().id());
    }

    /// ### English
    /// Wakes every continuation parked on this slot, in FIFO order. Must be
    /// called from the bound owner thread — this is the resumption mechanism
    /// for every `schedule()` sender issued against this slot, so calling it
    /// from elsewhere would silently move OS-window work onto the wrong
    /// thread.
    ///
    /// ### 中文
    /// 按 FIFO 顺序唤醒本 slot 上挂起的所有续延。必须在绑定的所有者线程上
    /// 调用——这是针对本 slot 发出的每一个 `schedule()` sender 的恢复机制，
    /// 在其他线程调用会悄悄把 OS 窗口相关工作移到错误的线程上。
    pub(crate) fn pump(&self) {
        debug_assert_eq!(
            self.owner.lock().as_ref(),
            Some(&std::thread::current().id()),
            "OsPollingSlot::pump called from a thread other than the bound owner"
        );
        parking_lot::wake_all(self.lot.lock(), ());
    }
}

impl Default for OsPollingSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for OsPollingSlot {
    type ScheduleSender = OsPollingSchedule;

    fn schedule(&self) -> OsPollingSchedule {
        OsPollingSchedule {
            lot: self.lot.clone(),
        }
    }
}

/// ### English
/// Sender produced by [`Scheduler::schedule`] on an [`OsPollingSlot`].
///
/// ### 中文
/// [`OsPollingSlot`] 的 [`Scheduler::schedule`] 所产生的 sender。
pub(crate) struct OsPollingSchedule {
    lot: Arc<Spinlock<ParkingLot<()>>>,
}

impl Sender for OsPollingSchedule {
    type Value = ();
    type Error = Infallible;

    async fn run(self) -> Outcome<(), Infallible> {
        ParkFuture::new(self.lot).await;
        Outcome::Value(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::spawn_detached;
    use std::sync::mpsc;

    #[test]
    fn scheduled_continuation_resumes_on_pump() {
        let slot = Arc::new(OsPollingSlot::new());
        slot.bind_current_thread();
        let (tx, rx) = mpsc::channel();

        let slot_for_task = slot.clone();
        spawn_detached(async move {
            let outcome = slot_for_task.schedule().run().await;
            tx.send(outcome).unwrap();
        });

        assert!(rx.try_recv().is_err());
        slot.pump();
        assert_eq!(rx.recv().unwrap(), Outcome::Value(()));
    }
}
