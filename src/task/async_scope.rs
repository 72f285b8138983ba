//! ### English
//! `async_scope`: a drop-safe container that spawns senders and exposes a
//! `cleanup()` sender completing once every spawned piece of work has
//! completed. Grounded on the same slot-accounting idea as
//! [`crate::static_scope::StaticScope`] (§4.7) but with **no capacity
//! bound** — `async_scope` never parks a spawner, it only tracks how many
//! spawned tasks remain outstanding.
//!
//! ### 中文
//! `async_scope`：一个 drop-safe 的容器，负责 spawn 各个 sender，并暴露一个
//! `cleanup()` sender，待所有已 spawn 的工作完成后才完成。其记账思路与
//! [`crate::static_scope::StaticScope`]（§4.7）的 slot 记账相同，但**没有容量
//! 上限**——`async_scope` 从不挂起 spawn 者，只负责追踪还有多少已 spawn
//! 的任务尚未完成。

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::park::op_state::{OpState, ParkedOp};
use crate::park::parking_lot::ParkingLot;
use crate::sync::spinlock::Spinlock;
use crate::task::driver::spawn_detached;
use crate::task::sender::{Outcome, Sender};

/// ### English
/// The unbounded spawning container. Held behind an `Arc` because spawned
/// work outlives the call to `spawn` itself.
///
/// ### 中文
/// 无容量上限的 spawn 容器。以 `Arc` 持有，因为已 spawn 的工作生命周期
/// 超出 `spawn` 调用本身。
pub(crate) struct AsyncScope {
    active: AtomicUsize,
    finished_lot: Spinlock<ParkingLot<()>>,
}

impl AsyncScope {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            finished_lot: Spinlock::new(ParkingLot::new()),
        })
    }

    /// ### English
    /// Spawns `sender`, driving it to completion independently of whatever
    /// called `spawn`. Its `Outcome` is discarded here — a spawned sender
    /// that needs to report failures should do so itself (e.g. via
    /// [`crate::error::fatal`]) before resolving, matching §4.8's "render
    /// tasks are not allowed to fail silently".
    ///
    /// ### 中文
    /// spawn `sender`，使其独立于 `spawn` 调用方被驱动至完成。其 `Outcome`
    /// 在此处被丢弃——需要上报失败的已 spawn sender 应当在完成前自行上报
    /// （例如通过 [`crate::error::fatal`]），对应 §4.8 “render task 不允许
    /// 静默失败”的要求。
    pub(crate) fn spawn<S>(self: &Arc<Self>, sender: S)
    where
        S: Sender + 'static,
    {
        self.active.fetch_add(1, Ordering::AcqRel);
        let scope = self.clone();
        spawn_detached(async move {
            let _ = sender.run().await;
            scope.on_spawned_finished();
        });
    }

    fn on_spawned_finished(&self) {
        // Locking before decrementing, and cleanup() checking `active`
        // while holding the same lock before parking, closes the
        // check-then-park race: whichever of the two sides observes the
        // lock first establishes which ordering happened.
        let guard = self.finished_lot.lock();
        let remaining = self.active.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            crate::park::parking_lot::wake_all(guard, ());
        }
    }

    /// ### English
    /// Returns a sender that resolves once `active == 0`.
    ///
    /// ### 中文
    /// 返回一个在 `active == 0` 时完成的 sender。
    pub(crate) fn cleanup(self: &Arc<Self>) -> Cleanup {
        Cleanup {
            scope: self.clone(),
            node: None,
            parked: false,
        }
    }
}

#[repr(C)]
struct WaitNode {
    state: OpState<()>,
    waker: Spinlock<Option<Waker>>,
}

impl ParkedOp<()> for WaitNode {
    fn wake(&mut self, _args: ()) {
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// ### English
/// Sender returned by [`AsyncScope::cleanup`].
///
/// ### 中文
/// 由 [`AsyncScope::cleanup`] 返回的 sender。
pub(crate) struct Cleanup {
    scope: Arc<AsyncScope>,
    node: Option<Box<WaitNode>>,
    parked: bool,
}

impl Sender for Cleanup {
    type Value = ();
    type Error = Infallible;

    fn run(self) -> impl Future<Output = Outcome<(), Infallible>> + Send {
        CleanupFuture { inner: self }
    }
}

struct CleanupFuture {
    inner: Cleanup,
}

impl Future for CleanupFuture {
    type Output = Outcome<(), Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome<(), Infallible>> {
        // SAFETY: `Cleanup`/`CleanupFuture` contain no address-sensitive
        // fields of their own; `node`'s `WaitNode` is heap-boxed once and
        // only its heap address (stable across the Box handle moving) is
        // ever parked.
        let this = unsafe { self.get_unchecked_mut() };

        let guard = this.inner.scope.finished_lot.lock();
        if this.inner.scope.active.load(Ordering::Acquire) == 0 {
            return Poll::Ready(Outcome::Value(()));
        }

        let node = this.inner.node.get_or_insert_with(|| {
            Box::new(WaitNode {
                state: OpState::new::<WaitNode>(),
                waker: Spinlock::new(None),
            })
        });
        *node.waker.lock() = Some(cx.waker().clone());

        if !this.inner.parked {
            this.inner.parked = true;
            let node_ptr = node.as_mut() as *mut WaitNode as *mut OpState<()>;
            let mut guard = guard;
            unsafe { guard.park(node_ptr) };
        } else {
            drop(guard);
        }

        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::block_on;
    use crate::task::sender::just;

    #[test]
    fn cleanup_resolves_immediately_when_nothing_spawned() {
        let scope = AsyncScope::new();
        let outcome = block_on(scope.cleanup().run());
        assert_eq!(outcome, Outcome::Value(()));
    }

    #[test]
    fn cleanup_waits_for_spawned_work() {
        let scope = AsyncScope::new();
        scope.spawn(just(()));
        let outcome = block_on(scope.cleanup().run());
        assert_eq!(outcome, Outcome::Value(()));
    }
}
