//! ### English
//! Bridges the raw [`ParkingLot`]/[`OpState`] world to a plain Rust
//! [`Future`]: [`ParkFuture`] parks itself into a lot on first poll and
//! resolves once woken, regardless of which thread calls `wake` (the
//! scheduler in §4.3, the event queue in §4.5, `async_mutex` in §5, and
//! `async_scope`'s `cleanup()` all build on this).
//!
//! ### 中文
//! 将原始的 [`ParkingLot`]/[`OpState`] 世界与普通 Rust [`Future`] 对接：
//! [`ParkFuture`] 在首次轮询时把自己挂入某个 lot，一旦被唤醒（无论调用
//! `wake` 的是哪个线程）即完成（§4.3 的调度器、§4.5 的 event queue、
//! §5 的 `async_mutex`，以及 `async_scope` 的 `cleanup()` 均构建于此）。

use std::future::Future;
use std::marker::PhantomPinned;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use super::op_state::{OpState, ParkedOp};
use super::parking_lot::ParkingLot;
use crate::sync::spinlock::Spinlock;

struct WaitNodeInner<Args> {
    waker: Option<Waker>,
    result: Option<Args>,
}

/// ### English
/// The intrusive node. `state` must stay the first field: the wake/cancel
/// trampolines cast the parked `*mut OpState<Args>` back to `*mut WaitNode<Args>`.
///
/// `linked` and `inner` are accessed from whichever thread parked the node
/// *and* from whichever thread later pops and wakes it; `inner` is behind a
/// spinlock specifically because those two threads are not otherwise
/// ordered with respect to each other once more than one branch of a
/// `when_all` can wake concurrently.
///
/// ### 中文
/// 侵入式节点。`state` 必须保持为第一个字段：wake/cancel 跳板会把挂起的
/// `*mut OpState<Args>` 转换回 `*mut WaitNode<Args>`。
///
/// `linked` 与 `inner` 既会被挂起该节点的线程访问，也会被之后弹出并唤醒它的
/// 线程访问；`inner` 之所以放在自旋锁之后，正是因为一旦 `when_all` 的多个分支
/// 可能并发唤醒，这两个线程彼此之间便不再有天然的顺序保证。
#[repr(C)]
struct WaitNode<Args> {
    state: OpState<Args>,
    linked: AtomicBool,
    inner: Spinlock<WaitNodeInner<Args>>,
}

impl<Args> ParkedOp<Args> for WaitNode<Args> {
    fn wake(&mut self, args: Args) {
        self.linked.store(false, Ordering::Release);
        let waker = {
            let mut inner = self.inner.lock();
            inner.result = Some(args);
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// ### English
/// A future that parks into `lot` on first poll and resolves to whatever
/// `Args` the waker delivers. `lot` is `Arc`-owned rather than borrowed so
/// the future can be `'static` and move freely between schedulers.
///
/// ### 中文
/// 一个在首次轮询时挂入 `lot`、并以 waker 所交付的 `Args` 完成的 future。
/// `lot` 以 `Arc` 持有而非借用，使该 future 能够是 `'static` 的，并可在
/// 各调度器之间自由移动。
pub(crate) struct ParkFuture<Args> {
    lot: Arc<Spinlock<ParkingLot<Args>>>,
    node: WaitNode<Args>,
    parked: bool,
    _pin: PhantomPinned,
}

impl<Args> ParkFuture<Args> {
    pub(crate) fn new(lot: Arc<Spinlock<ParkingLot<Args>>>) -> Self {
        Self {
            lot,
            node: WaitNode {
                state: OpState::new::<WaitNode<Args>>(),
                linked: AtomicBool::new(false),
                inner: Spinlock::new(WaitNodeInner {
                    waker: None,
                    result: None,
                }),
            },
            parked: false,
            _pin: PhantomPinned,
        }
    }
}

impl<Args> Future for ParkFuture<Args> {
    type Output = Args;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Args> {
        // SAFETY: we never move `node` out of `self`; `_pin: PhantomPinned`
        // prevents callers from doing so either.
        let this = unsafe { self.get_unchecked_mut() };

        {
            let mut inner = this.node.inner.lock();
            if let Some(result) = inner.result.take() {
                return Poll::Ready(result);
            }
            inner.waker = Some(cx.waker().clone());
        }

        if !this.parked {
            this.parked = true;
            this.node.linked.store(true, Ordering::Release);
            let node_ptr = &mut this.node as *mut WaitNode<Args> as *mut OpState<Args>;
            let mut guard = this.lot.lock();
            unsafe { guard.park(node_ptr) };
        }

        Poll::Pending
    }
}

impl<Args> Drop for ParkFuture<Args> {
    fn drop(&mut self) {
        debug_assert!(
            !self.node.linked.load(Ordering::Acquire),
            "ParkFuture dropped while still linked into a parking lot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::park::parking_lot::wake_one;
    use crate::task::driver::block_on;

    #[test]
    fn resolves_once_woken() {
        let lot = Arc::new(Spinlock::new(ParkingLot::<u32>::new()));
        let fut = ParkFuture::new(lot.clone());
        std::thread::scope(|scope| {
            scope.spawn(|| {
                while lot.lock().is_empty() {
                    std::thread::yield_now();
                }
                wake_one(lot.lock(), 99);
            });
            assert_eq!(block_on(fut), 99);
        });
    }
}
