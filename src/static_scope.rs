//! ### English
//! The bounded spawner (§4.7): at most `capacity` senders run concurrently.
//! `spawn_next` resolves as soon as its sender has been *started* into a free
//! slot — not once that sender completes — so it is a fire-and-forget launch
//! that blocks only when the scope is already full. `all_finished` resolves
//! once every spawned sender has completed. Grounded directly on
//! `original_source/engine/include/concurrency/StaticScope.hpp`'s slot
//! table, free list, and single mutex guarding both the bookkeeping and the
//! two parking lots (`awaiting_spawn_`/`awaiting_all_finished_`) — unlike
//! [`crate::task::async_scope::AsyncScope`], which tracks only a count and
//! never parks a spawner.
//!
//! Unlike the original's `std::array<Slot, N+1>` of `manual_lifetime`
//! connected operations, a slot here holds nothing: `spawn_detached` returns
//! a self-sustaining `Arc<Task>` (kept alive by the waker chain of whatever
//! it's currently parked on), so the slot table only needs to track
//! occupancy via the free list, not storage.
//!
//! ### 中文
//! 有界 spawn 器（§4.7）：至多 `capacity` 个 sender 并发运行。`spawn_next`
//! 一旦其 sender 被*启动*进入一个空闲 slot 就立即完成——而非等到该 sender
//! 运行完毕——因此这是一次即发即弃的启动，仅在 scope 已满时才会阻塞。
//! `all_finished` 在所有已 spawn 的 sender 都完成后才完成。其设计直接依据
//! `original_source/engine/include/concurrency/StaticScope.hpp` 的 slot 表、
//! 空闲链表，以及同时守护记账与两个 parking lot
//! （`awaiting_spawn_`/`awaiting_all_finished_`）的单一互斥锁——与
//! [`crate::task::async_scope::AsyncScope`] 不同，后者只记录一个计数，
//! 从不挂起 spawn 者。
//!
//! 与原版 `std::array<Slot, N+1>` 中存放 `manual_lifetime` 连接操作不同，这里
//! 的 slot 不存放任何东西：`spawn_detached` 返回一个自我维持的 `Arc<Task>`
//! （由其当前挂起对象的 waker 链保持存活），因此 slot 表只需通过空闲链表
//! 追踪占用情况，而不需要存储。

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::park::op_state::{self, OpState, ParkedOp};
use crate::park::parking_lot::ParkingLot;
use crate::sync::spinlock::Spinlock;
use crate::task::driver::spawn_detached;
use crate::task::sender::{Outcome, Sender};

struct Locked {
    /// `next_free[i]` is the slot a free list traversal visits after `i`.
    next_free: Vec<usize>,
    first_free: usize,
    size: usize,
    awaiting_spawn: ParkingLot<usize>,
    awaiting_all_finished: ParkingLot<()>,
}

impl Locked {
    fn take_slot(&mut self) -> usize {
        self.size += 1;
        let slot = self.first_free;
        self.first_free = self.next_free[slot];
        slot
    }

    fn free_slot(&mut self, slot: usize) {
        self.next_free[slot] = self.first_free;
        self.first_free = slot;
        self.size -= 1;
    }
}

struct Inner {
    capacity: usize,
    locked: Spinlock<Locked>,
}

/// ### English
/// The bounded spawner itself. Shared via `Arc` because spawned work and
/// parked spawners both outlive any single method call.
///
/// ### 中文
/// 有界 spawn 器本身。以 `Arc` 共享，因为已 spawn 的工作与被挂起的 spawn
/// 者都超出了任何单次方法调用的生命周期。
pub(crate) struct StaticScope {
    inner: Arc<Inner>,
}

impl StaticScope {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let next_free = (0..capacity).map(|i| i + 1).collect();
        Arc::new(Self {
            inner: Arc::new(Inner {
                capacity,
                locked: Spinlock::new(Locked {
                    next_free,
                    first_free: 0,
                    size: 0,
                    awaiting_spawn: ParkingLot::new(),
                    awaiting_all_finished: ParkingLot::new(),
                }),
            }),
        })
    }

    /// ### English
    /// Starts `sender` into a free slot, resolving immediately once it has
    /// been launched; parks until a slot frees up if the scope is already at
    /// capacity. A freed slot is handed straight to the oldest parked
    /// `spawn_next` call, if any, bypassing the free list entirely (§9).
    ///
    /// ### 中文
    /// 将 `sender` 启动进一个空闲 slot，一旦启动就立即完成；若 scope 已达
    /// 容量上限，则挂起直到有 slot 被释放。释放出的 slot 会直接交给挂起时间
    /// 最久的那个 `spawn_next` 调用（如果有的话），完全绕过空闲链表（§9）。
    pub(crate) fn spawn_next<S>(self: &Arc<Self>, sender: S) -> SpawnNext<S>
    where
        S: Sender + 'static,
    {
        SpawnNext {
            scope: self.inner.clone(),
            sender: Some(sender),
            node: None,
        }
    }

    /// ### English
    /// Resolves once every sender started by `spawn_next` has completed.
    ///
    /// ### 中文
    /// 在所有由 `spawn_next` 启动的 sender 都完成后完成。
    pub(crate) fn all_finished(self: &Arc<Self>) -> AllFinished {
        AllFinished {
            scope: self.inner.clone(),
            node: None,
        }
    }
}

fn start_in_slot<S: Sender + 'static>(scope: Arc<Inner>, slot: usize, sender: S) {
    spawn_detached(async move {
        let _ = sender.run().await;
        on_done(&scope, slot);
    });
}

/// ### English
/// `on_done`, `do_spawn`'s unlock-before-wake invariant, and "offer the freed
/// slot to the head of `awaiting_spawn` before touching the free list" are
/// all taken verbatim from `StaticScope::on_done`/`do_spawn` in the original
/// header.
///
/// ### 中文
/// `on_done`、`do_spawn` 的“唤醒前解锁”不变式，以及“释放的 slot 优先交给
/// `awaiting_spawn` 队首，而非先经过空闲链表”，均逐字取自原始头文件中的
/// `StaticScope::on_done`/`do_spawn`。
fn on_done(scope: &Arc<Inner>, slot: usize) {
    let mut locked = scope.locked.lock();

    let waiting = locked.awaiting_spawn.pop();
    if !waiting.is_null() {
        drop(locked);
        unsafe { OpState::wake(waiting, slot) };
        return;
    }

    locked.free_slot(slot);
    let finished_head = if locked.size == 0 {
        locked.awaiting_all_finished.take_all()
    } else {
        ptr::null_mut()
    };
    drop(locked);

    let mut current = finished_head;
    while !current.is_null() {
        let next = unsafe { op_state::next(current) };
        unsafe { OpState::wake(current, ()) };
        current = next;
    }
}

#[repr(C)]
struct SpawnNode<S: Sender + 'static> {
    state: OpState<usize>,
    scope: Arc<Inner>,
    sender: Spinlock<Option<S>>,
    done: AtomicBool,
    waker: Spinlock<Option<Waker>>,
}

impl<S: Sender + 'static> ParkedOp<usize> for SpawnNode<S> {
    fn wake(&mut self, slot: usize) {
        if let Some(sender) = self.sender.lock().take() {
            start_in_slot(self.scope.clone(), slot, sender);
        }
        self.done.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// ### English
/// Sender produced by [`StaticScope::spawn_next`].
///
/// ### 中文
/// 由 [`StaticScope::spawn_next`] 产生的 sender。
pub(crate) struct SpawnNext<S: Sender + 'static> {
    scope: Arc<Inner>,
    sender: Option<S>,
    node: Option<Box<SpawnNode<S>>>,
}

impl<S: Sender + 'static> Sender for SpawnNext<S> {
    type Value = ();
    type Error = Infallible;

    fn run(self) -> impl Future<Output = Outcome<(), Infallible>> + Send {
        SpawnNextFuture { inner: self }
    }
}

struct SpawnNextFuture<S: Sender + 'static> {
    inner: SpawnNext<S>,
}

impl<S: Sender + 'static> Future for SpawnNextFuture<S> {
    type Output = Outcome<(), Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome<(), Infallible>> {
        // SAFETY: neither `SpawnNext` nor `SpawnNextFuture` move anything
        // once parked; `node`'s `SpawnNode` is heap-boxed once and only its
        // stable heap address is ever linked into a lot.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(node) = &this.inner.node {
            if node.done.load(Ordering::Acquire) {
                return Poll::Ready(Outcome::Value(()));
            }
            *node.waker.lock() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let mut locked = this.inner.scope.locked.lock();
        if locked.size < this.inner.scope.capacity {
            let slot = locked.take_slot();
            drop(locked);
            let sender = this
                .inner
                .sender
                .take()
                .expect("SpawnNextFuture polled after completion");
            start_in_slot(this.inner.scope.clone(), slot, sender);
            return Poll::Ready(Outcome::Value(()));
        }

        let sender = this
            .inner
            .sender
            .take()
            .expect("SpawnNextFuture polled after completion");
        let mut node = Box::new(SpawnNode {
            state: OpState::new::<SpawnNode<S>>(),
            scope: this.inner.scope.clone(),
            sender: Spinlock::new(Some(sender)),
            done: AtomicBool::new(false),
            waker: Spinlock::new(Some(cx.waker().clone())),
        });
        let node_ptr = node.as_mut() as *mut SpawnNode<S> as *mut OpState<usize>;
        unsafe { locked.awaiting_spawn.park(node_ptr) };
        drop(locked);
        this.inner.node = Some(node);
        Poll::Pending
    }
}

#[repr(C)]
struct FinishedNode {
    state: OpState<()>,
    done: AtomicBool,
    waker: Spinlock<Option<Waker>>,
}

impl ParkedOp<()> for FinishedNode {
    fn wake(&mut self, _args: ()) {
        self.done.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// ### English
/// Sender produced by [`StaticScope::all_finished`].
///
/// ### 中文
/// 由 [`StaticScope::all_finished`] 产生的 sender。
pub(crate) struct AllFinished {
    scope: Arc<Inner>,
    node: Option<Box<FinishedNode>>,
}

impl Sender for AllFinished {
    type Value = ();
    type Error = Infallible;

    fn run(self) -> impl Future<Output = Outcome<(), Infallible>> + Send {
        AllFinishedFuture { inner: self }
    }
}

struct AllFinishedFuture {
    inner: AllFinished,
}

impl Future for AllFinishedFuture {
    type Output = Outcome<(), Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome<(), Infallible>> {
        // SAFETY: same reasoning as `SpawnNextFuture::poll`.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(node) = &this.inner.node {
            if node.done.load(Ordering::Acquire) {
                return Poll::Ready(Outcome::Value(()));
            }
            *node.waker.lock() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let mut locked = this.inner.scope.locked.lock();
        if locked.size == 0 {
            return Poll::Ready(Outcome::Value(()));
        }

        let mut node = Box::new(FinishedNode {
            state: OpState::new::<FinishedNode>(),
            done: AtomicBool::new(false),
            waker: Spinlock::new(Some(cx.waker().clone())),
        });
        let node_ptr = node.as_mut() as *mut FinishedNode as *mut OpState<()>;
        unsafe { locked.awaiting_all_finished.park(node_ptr) };
        drop(locked);
        this.inner.node = Some(node);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::park::parking_lot;
    use crate::park::wait::ParkFuture;
    use crate::task::driver::{block_on, spawn_detached};
    use crate::task::sender::just;
    use std::sync::mpsc;

    /// A sender that blocks until something wakes its (test-owned) gate.
    struct WaitGate {
        lot: Arc<Spinlock<ParkingLot<()>>>,
    }

    impl Sender for WaitGate {
        type Value = ();
        type Error = Infallible;

        async fn run(self) -> Outcome<(), Infallible> {
            ParkFuture::new(self.lot).await;
            Outcome::Value(())
        }
    }

    #[test]
    fn spawn_next_resolves_once_started_not_once_finished() {
        let scope = StaticScope::new(4);
        let gate = Arc::new(Spinlock::new(ParkingLot::<()>::new()));
        let outcome = block_on(scope.spawn_next(WaitGate { lot: gate.clone() }).run());
        assert_eq!(outcome, Outcome::Value(()));
        // The spawned sender is still parked on `gate` — release it so the
        // test doesn't leak a perpetually-pending task.
        parking_lot::wake_all(gate.lock(), ());
    }

    #[test]
    fn spawn_next_parks_until_capacity_frees_and_hands_freed_slot_directly() {
        let scope = StaticScope::new(1);
        let gate = Arc::new(Spinlock::new(ParkingLot::<()>::new()));

        let first = block_on(scope.spawn_next(WaitGate { lot: gate.clone() }).run());
        assert_eq!(first, Outcome::Value(()));

        let (tx, rx) = mpsc::channel();
        let scope_for_second = scope.clone();
        spawn_detached(async move {
            let outcome = scope_for_second.spawn_next(just(())).run().await;
            tx.send(outcome).unwrap();
        });
        assert!(
            rx.try_recv().is_err(),
            "second spawn_next resolved before a slot freed up"
        );

        parking_lot::wake_all(gate.lock(), ());
        assert_eq!(rx.try_recv().unwrap(), Outcome::Value(()));
    }

    #[test]
    fn all_finished_resolves_immediately_on_empty_scope() {
        let scope = StaticScope::new(2);
        let outcome = block_on(scope.all_finished().run());
        assert_eq!(outcome, Outcome::Value(()));
    }

    #[test]
    fn all_finished_waits_for_every_spawned_task() {
        let scope = StaticScope::new(2);
        let gate = Arc::new(Spinlock::new(ParkingLot::<()>::new()));

        let _ = block_on(scope.spawn_next(WaitGate { lot: gate.clone() }).run());
        let _ = block_on(scope.spawn_next(just(())).run());

        let (tx, rx) = mpsc::channel();
        let scope_for_wait = scope.clone();
        spawn_detached(async move {
            let outcome = scope_for_wait.all_finished().run().await;
            tx.send(outcome).unwrap();
        });
        assert!(
            rx.try_recv().is_err(),
            "all_finished resolved while a task was still running"
        );

        parking_lot::wake_all(gate.lock(), ());
        assert_eq!(rx.try_recv().unwrap(), Outcome::Value(()));
    }
}
