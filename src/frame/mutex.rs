//! ### English
//! `async_mutex` (§5, added): a FIFO async lock built directly on
//! [`ParkingLot`] — park the waiting op when locked, `unlock` hands the lock
//! directly to the next parked op (`wake_one`) or clears it if nobody was
//! waiting. Used for the single global `frame_mutex` and for each
//! `inflight_mutex[i]` in the [`super::inflight`] ring.
//!
//! Unlike a Rust `std`/`tokio` mutex, there is no RAII guard: `frame_mutex`
//! is locked in one step of `render_frame` and unlocked in a *later* step
//! after intervening `.await` points reschedule the task onto another
//! thread (§4.8 step 6, "release `frame_mutex` here" — a statement about
//! program order, not about a value going out of scope). A guard type tied
//! to a borrow of `&AsyncMutex` would fight that; the source engine's own
//! `async_mutex` has the same explicit `async_lock()`/`unlock()` shape.
//!
//! ### 中文
//! `async_mutex`（§5，新增）：直接构建在 [`ParkingLot`] 之上的 FIFO 异步锁——
//! 加锁时若已被占用则挂起等待的 op；`unlock` 将锁直接交接给下一个挂起的 op
//! （`wake_one`），若无人等待则清除锁状态。用于唯一的全局 `frame_mutex`，以及
//! [`super::inflight`] ring 中每个槽位的 `inflight_mutex[i]`。
//!
//! 与 Rust `std`/`tokio` 的 mutex 不同，这里没有 RAII guard：`frame_mutex` 在
//! `render_frame` 的某一步加锁，在*之后*的另一步解锁，中间经过的 `.await` 点会
//! 把任务重新调度到另一个线程上（§4.8 第 6 步，“在此释放 frame_mutex”说的是
//! 程序顺序，而不是某个值离开作用域）。绑定在 `&AsyncMutex` 借用上的 guard
//! 类型会与此相冲突；源引擎自身的 `async_mutex` 同样是显式的
//! `async_lock()`/`unlock()` 形态。

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::park::op_state::{OpState, ParkedOp};
use crate::park::parking_lot::ParkingLot;
use crate::sync::spinlock::Spinlock;
use crate::task::sender::{Outcome, Sender};

struct Inner {
    locked: bool,
    queue: ParkingLot<()>,
}

/// ### English
/// A FIFO async mutex with no protected data and no RAII guard — see the
/// module docs for why.
///
/// ### 中文
/// 不保护具体数据、也没有 RAII guard 的 FIFO 异步 mutex——原因见模块文档。
pub(crate) struct AsyncMutex {
    inner: Spinlock<Inner>,
}

impl AsyncMutex {
    pub(crate) fn new() -> Self {
        Self {
            inner: Spinlock::new(Inner {
                locked: false,
                queue: ParkingLot::new(),
            }),
        }
    }

    /// ### English
    /// Returns a sender that resolves once this mutex has been acquired by
    /// the calling task. Must be paired with exactly one later [`AsyncMutex::
    /// unlock`] call.
    ///
    /// ### 中文
    /// 返回一个在调用方任务获得此锁后完成的 sender。必须与之后恰好一次的
    /// [`AsyncMutex::unlock`] 调用配对。
    pub(crate) fn async_lock(&self) -> AsyncLock<'_> {
        AsyncLock {
            mutex: self,
            node: None,
        }
    }

    /// ### English
    /// Releases the lock, handing it directly to the oldest parked waiter
    /// (if any) rather than clearing `locked` first — this is what makes the
    /// handoff FIFO instead of letting a fresh `async_lock` racing in on
    /// another thread jump the queue.
    ///
    /// ### 中文
    /// 释放锁：若有挂起的等待者，则直接将锁交接给最早的那个，而不是先清除
    /// `locked`——这正是使交接保持 FIFO 的关键，否则另一线程上新发起的
    /// `async_lock` 可能插队。
    pub(crate) fn unlock(&self) {
        let mut inner = self.inner.lock();
        let next = inner.queue.pop();
        if next.is_null() {
            inner.locked = false;
            return;
        }
        drop(inner);
        unsafe { OpState::wake(next, ()) };
    }
}

impl Default for AsyncMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C)]
struct LockNode {
    state: OpState<()>,
    done: std::sync::atomic::AtomicBool,
    waker: Spinlock<Option<Waker>>,
}

impl ParkedOp<()> for LockNode {
    fn wake(&mut self, _args: ()) {
        self.done.store(true, std::sync::atomic::Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// ### English
/// Sender returned by [`AsyncMutex::async_lock`].
///
/// ### 中文
/// [`AsyncMutex::async_lock`] 返回的 sender。
pub(crate) struct AsyncLock<'a> {
    mutex: &'a AsyncMutex,
    node: Option<Box<LockNode>>,
}

impl<'a> Sender for AsyncLock<'a> {
    type Value = ();
    type Error = Infallible;

    fn run(self) -> impl Future<Output = Outcome<(), Infallible>> + Send {
        AsyncLockFuture { inner: self }
    }
}

struct AsyncLockFuture<'a> {
    inner: AsyncLock<'a>,
}

impl<'a> Future for AsyncLockFuture<'a> {
    type Output = Outcome<(), Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome<(), Infallible>> {
        // SAFETY: `node`, once parked, is only moved by following its Box
        // handle; the heap allocation it points into never moves.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(node) = &this.inner.node {
            if node.done.load(std::sync::atomic::Ordering::Acquire) {
                return Poll::Ready(Outcome::Value(()));
            }
            *node.waker.lock() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let mut inner = this.inner.mutex.inner.lock();
        if !inner.locked {
            inner.locked = true;
            return Poll::Ready(Outcome::Value(()));
        }

        let mut node = Box::new(LockNode {
            state: OpState::new::<LockNode>(),
            done: std::sync::atomic::AtomicBool::new(false),
            waker: Spinlock::new(Some(cx.waker().clone())),
        });
        let node_ptr = node.as_mut() as *mut LockNode as *mut OpState<()>;
        unsafe { inner.queue.park(node_ptr) };
        drop(inner);
        this.inner.node = Some(node);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::{block_on, spawn_detached};
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn uncontended_lock_resolves_immediately() {
        let mutex = AsyncMutex::new();
        let outcome = block_on(mutex.async_lock().run());
        assert_eq!(outcome, Outcome::Value(()));
        mutex.unlock();
    }

    #[test]
    fn contended_lock_is_fifo() {
        let mutex = Arc::new(AsyncMutex::new());
        let order = Arc::new(Spinlock::new(Vec::<u32>::new()));

        block_on(mutex.async_lock().run());

        let (tx, rx) = mpsc::channel();
        for id in [1u32, 2, 3] {
            let mutex = mutex.clone();
            let order = order.clone();
            let tx = tx.clone();
            spawn_detached(async move {
                mutex.async_lock().run().await;
                order.lock().push(id);
                mutex.unlock();
                let _ = tx.send(());
            });
        }

        mutex.unlock();
        for _ in 0..3 {
            rx.recv().unwrap();
        }
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }
}
