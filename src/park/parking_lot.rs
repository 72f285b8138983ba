//! ### English
//! Intrusive, FIFO parking lot of type-erased [`OpState`] nodes. Always
//! accessed behind a [`Spinlock`] (for a single lot) or a
//! [`MultiLockGuard`](crate::sync::multi_lock::MultiLockGuard) (for several
//! lots at once); every wake/cancel call releases the lock *before* invoking
//! a callback, because that callback may re-enter the same lock (e.g. to
//! park again immediately).
//!
//! ### 中文
//! 由类型擦除的 [`OpState`] 节点组成的侵入式 FIFO parking lot。始终在
//! [`Spinlock`]（单个 lot）或 [`MultiLockGuard`](crate::sync::multi_lock::MultiLockGuard)
//! （同时操作多个 lot）之下访问；每次 wake/cancel 调用都会在触发回调*之前*释放锁，
//! 因为该回调可能重入同一把锁（例如立即再次 park）。

use std::ptr;

use super::op_state::OpState;
use crate::sync::multi_lock::MultiLockGuard;
use crate::sync::spinlock::SpinlockGuard;

/// ### English
/// The queue itself: a `first`/`last` pair of raw pointers into externally
/// owned [`OpState`] nodes. Carries no lock of its own — callers wrap it in a
/// [`crate::sync::spinlock::Spinlock`].
///
/// ### 中文
/// 队列本身：指向外部拥有的 [`OpState`] 节点的 `first`/`last` 原始指针对。
/// 自身不带锁——调用方需将其包裹在 [`crate::sync::spinlock::Spinlock`] 中。
pub(crate) struct ParkingLot<Args> {
    first: *mut OpState<Args>,
    last: *mut OpState<Args>,
}

unsafe impl<Args> Send for ParkingLot<Args> {}

impl<Args> ParkingLot<Args> {
    pub(crate) const fn new() -> Self {
        Self {
            first: ptr::null_mut(),
            last: ptr::null_mut(),
        }
    }

    /// ### English
    /// Enqueues a node at the tail.
    ///
    /// # Safety
    /// `op` must point to a node embedded in a value that outlives its time
    /// parked here, and must not already be linked into this or any other
    /// lot.
    ///
    /// ### 中文
    /// 将节点加入队尾。
    ///
    /// # 安全性
    /// `op` 必须指向一个生命周期长于其在此挂起期间的值，且未被链接到本队列
    /// 或任何其他队列中。
    pub(crate) unsafe fn park(&mut self, op: *mut OpState<Args>) {
        unsafe { (*op).next = ptr::null_mut() };
        if self.first.is_null() {
            self.first = op;
            self.last = op;
        } else {
            unsafe { (*self.last).next = op };
            self.last = op;
        }
    }

    /// ### English
    /// Pops the oldest parked op without waking it. `pub(crate)` (beyond
    /// [`wake_one`]'s use of it) for callers such as
    /// [`crate::static_scope`] that guard a `ParkingLot` with a lock over a
    /// larger combined structure, and so cannot go through a
    /// `SpinlockGuard<ParkingLot<Args>>`-typed helper.
    ///
    /// ### 中文
    /// 弹出最早挂起的 op 而不唤醒它。除 [`wake_one`] 内部使用外，还
    /// `pub(crate)` 给诸如 [`crate::static_scope`] 这样——用覆盖更大组合结构的
    /// 锁来守护某个 `ParkingLot`，因而无法使用以
    /// `SpinlockGuard<ParkingLot<Args>>` 为类型的辅助函数——的调用方使用。
    pub(crate) fn pop(&mut self) -> *mut OpState<Args> {
        let result = self.first;
        if result.is_null() {
            return ptr::null_mut();
        }
        self.first = unsafe { (*result).next };
        if self.first.is_null() {
            self.last = ptr::null_mut();
        }
        result
    }

    /// ### English
    /// Splices out every currently parked op as a linked list, for the same
    /// combined-lock callers as [`ParkingLot::pop`].
    ///
    /// ### 中文
    /// 将当前所有挂起的 op 作为一条链表整体摘出，服务于与 [`ParkingLot::pop`]
    /// 相同的组合锁调用方。
    pub(crate) fn take_all(&mut self) -> *mut OpState<Args> {
        let head = self.first;
        self.first = ptr::null_mut();
        self.last = ptr::null_mut();
        head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.first.is_null()
    }
}

impl<Args> Default for ParkingLot<Args> {
    fn default() -> Self {
        Self::new()
    }
}

/// ### English
/// Wakes the single oldest parked op, if any, with `args`. The lock is
/// released before the wake callback runs. Returns whether an op was woken.
///
/// ### 中文
/// 唤醒最早挂起的一个 op（若存在），并传入 `args`。锁会在 wake 回调运行之前释放。
/// 返回是否唤醒了某个 op。
pub(crate) fn wake_one<Args>(mut guard: SpinlockGuard<'_, ParkingLot<Args>>, args: Args) -> bool {
    let op = guard.pop();
    if op.is_null() {
        return false;
    }
    SpinlockGuard::unlock_early(guard);
    unsafe { OpState::wake(op, args) };
    true
}

/// ### English
/// Wakes every currently parked op with a copy of `args`, oldest first. The
/// lock is released before any wake callback runs, matching the source
/// engine's `wake_all` (which is restricted to the zero-argument case there
/// because it has no per-op value to hand out; here `Args: Clone` plays that
/// role).
///
/// ### 中文
/// 按入队顺序唤醒当前所有挂起的 op，每个都收到 `args` 的一份拷贝。锁会在任何
/// wake 回调运行之前释放，对应源引擎的 `wake_all`（在那里仅限零参数场景，因为
/// 没有可分发的逐 op 数据；这里用 `Args: Clone` 承担同样的角色）。
pub(crate) fn wake_all<Args: Clone>(mut guard: SpinlockGuard<'_, ParkingLot<Args>>, args: Args) {
    let mut current = guard.take_all();
    SpinlockGuard::unlock_early(guard);

    while !current.is_null() {
        let next = unsafe { (*current).next };
        unsafe { OpState::wake(current, args.clone()) };
        current = next;
    }
}

/// ### English
/// Cancels every op parked across `N` lots acquired together, splicing all
/// of them out under one critical section before releasing the locks and
/// running cancel callbacks. This is the operation that justifies the
/// multi-lock: cancelling lot A and lot B one at a time would leave a window
/// where an op freshly parked on B (by a thread reacting to A's drain) is
/// missed.
///
/// ### 中文
/// 取消同时获取的 `N` 个 lot 中挂起的所有 op：在释放锁、运行 cancel 回调之前，
/// 于同一个临界区内将它们全部摘出。这正是多重锁存在的理由：若逐个取消 lot A
/// 与 lot B，会留下一个窗口——某个因线程对 A 的排空做出反应而刚刚挂到 B 上的
/// op 可能被遗漏。
pub(crate) fn multi_cancel_all<Args, const N: usize>(guard: MultiLockGuard<'_, ParkingLot<Args>, N>) {
    let mut heads = [ptr::null_mut(); N];
    for (i, head) in heads.iter_mut().enumerate() {
        *head = guard.get(i).take_all();
    }
    drop(guard);

    for mut current in heads {
        while !current.is_null() {
            let next = unsafe { (*current).next };
            unsafe { OpState::cancel(current) };
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::park::op_state::ParkedOp;
    use crate::sync::multi_lock;
    use crate::sync::spinlock::Spinlock;

    #[repr(C)]
    struct TestOp {
        state: OpState<u32>,
        woken_with: Option<u32>,
        cancelled: bool,
    }

    impl ParkedOp<u32> for TestOp {
        fn wake(&mut self, args: u32) {
            self.woken_with = Some(args);
        }

        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    impl TestOp {
        fn new() -> Self {
            Self {
                state: OpState::new::<TestOp>(),
                woken_with: None,
                cancelled: false,
            }
        }
    }

    #[test]
    fn fifo_wake_order() {
        let lot = Spinlock::new(ParkingLot::<u32>::new());
        let mut a = TestOp::new();
        let mut b = TestOp::new();
        unsafe {
            lot.lock().park(&mut a.state as *mut _);
            lot.lock().park(&mut b.state as *mut _);
        }
        assert!(wake_one(lot.lock(), 1));
        assert_eq!(a.woken_with, Some(1));
        assert_eq!(b.woken_with, None);
        assert!(wake_one(lot.lock(), 2));
        assert_eq!(b.woken_with, Some(2));
        assert!(!wake_one(lot.lock(), 3));
    }

    #[test]
    fn wake_all_visits_every_op() {
        let lot = Spinlock::new(ParkingLot::<u32>::new());
        let mut a = TestOp::new();
        let mut b = TestOp::new();
        unsafe {
            lot.lock().park(&mut a.state as *mut _);
            lot.lock().park(&mut b.state as *mut _);
        }
        wake_all(lot.lock(), 7);
        assert_eq!(a.woken_with, Some(7));
        assert_eq!(b.woken_with, Some(7));
        assert!(lot.lock().is_empty());
    }

    #[repr(C)]
    struct CancelOnlyOp {
        state: OpState<()>,
        cancelled: bool,
    }

    impl ParkedOp<()> for CancelOnlyOp {
        fn wake(&mut self, _args: ()) {}

        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    impl CancelOnlyOp {
        fn new() -> Self {
            Self {
                state: OpState::new::<CancelOnlyOp>(),
                cancelled: false,
            }
        }
    }

    #[test]
    fn multi_cancel_all_splices_both_lots() {
        let lot_a = Spinlock::new(ParkingLot::<()>::new());
        let lot_b = Spinlock::new(ParkingLot::<()>::new());
        let mut a = CancelOnlyOp::new();
        let mut b = CancelOnlyOp::new();
        unsafe {
            lot_a.lock().park(&mut a.state as *mut _);
            lot_b.lock().park(&mut b.state as *mut _);
        }
        let guard = multi_lock::lock_all([&lot_a, &lot_b]);
        multi_cancel_all(guard);
        assert!(a.cancelled);
        assert!(b.cancelled);
        assert!(lot_a.lock().is_empty());
        assert!(lot_b.lock().is_empty());
    }
}
