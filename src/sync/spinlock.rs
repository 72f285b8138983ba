//! ### English
//! Test-and-set spinlock with a spin-then-yield backoff, used wherever the
//! critical section is short enough that an OS mutex would cost more than it
//! saves (parking-lot internal lists, static-scope bookkeeping).
//!
//! ### 中文
//! 带“短自旋 + 让出调度”退避的 test-and-set 自旋锁，用于临界区足够短、
//! 使用 OS 互斥锁反而得不偿失的场景（parking lot 内部链表、static scope 记账）。

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// ### English
/// Spin budget before switching to `yield_now()`.
///
/// ### 中文
/// 切换到 `yield_now()` 之前允许的自旋次数预算。
const SPIN_LIMIT: u32 = 20;

/// ### English
/// Spin-then-yield backoff state, shared by the spinlock and by callers that
/// need to poll a condition without parking (e.g. waiting for an in-flight
/// producer count to drain).
///
/// ### 中文
/// “短自旋 + 让出调度”退避状态，供自旋锁本身，以及需要在不 park 的前提下
/// 轮询某个条件的调用方共用（例如等待在途生产者计数归零）。
pub(crate) struct Backoff {
    spins: u32,
}

impl Backoff {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { spins: 0 }
    }

    /// ### English
    /// Performs one backoff step: a CPU-pause spin while under budget, a
    /// `yield_now()` once the budget is exhausted.
    ///
    /// ### 中文
    /// 执行一次退避步骤：预算内执行 CPU-pause 自旋，预算耗尽后 `yield_now()`。
    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.spins < SPIN_LIMIT {
            std::hint::spin_loop();
        } else {
            thread::yield_now();
        }
        self.spins = self.spins.wrapping_add(1);
    }
}

/// ### English
/// A minimal test-and-set spinlock guarding a `T`.
///
/// Not fair and not reentrant: a thread that already holds the lock and
/// calls `lock()` again will deadlock with itself, matching the semantics of
/// the source engine's `Spinlock`.
///
/// ### 中文
/// 守护 `T` 的最小 test-and-set 自旋锁。
///
/// 非公平、不可重入：已持锁线程再次调用 `lock()` 会与自身死锁，
/// 与源引擎 `Spinlock` 的语义一致。
pub(crate) struct Spinlock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

/// ### English
/// RAII guard returned by [`Spinlock::lock`]; releases the lock on drop.
///
/// ### 中文
/// 由 [`Spinlock::lock`] 返回的 RAII 守卫；drop 时释放锁。
pub(crate) struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<T> Spinlock<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// ### English
    /// Acquires the lock, spinning (then yielding) until it is free.
    ///
    /// ### 中文
    /// 获取锁，自旋（随后让出调度）直到锁空闲。
    #[inline]
    pub(crate) fn lock(&self) -> SpinlockGuard<'_, T> {
        let mut backoff = Backoff::new();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
        SpinlockGuard { lock: self }
    }

    /// ### English
    /// Tries to acquire the lock without spinning.
    ///
    /// ### 中文
    /// 尝试获取锁，不进行自旋。
    #[inline]
    pub(crate) fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
            .then_some(SpinlockGuard { lock: self })
    }

    /// ### English
    /// Raw unlock used by [`SpinlockGuard::unlock_early`] and by
    /// [`crate::sync::multi_lock::MultiLock`] to release several locks
    /// together.
    ///
    /// # Safety
    /// The caller must hold the lock (i.e. own a live `SpinlockGuard` that
    /// has not already released) and must not access `value` through any
    /// other guard afterwards.
    ///
    /// ### 中文
    /// 供 [`SpinlockGuard::unlock_early`] 与 [`crate::sync::multi_lock::MultiLock`]
    /// 一起释放多个锁时使用的原始 unlock。
    ///
    /// # 安全性
    /// 调用方必须持有该锁（即拥有一个尚未释放的 `SpinlockGuard`），
    /// 且此后不得再通过其他 guard 访问 `value`。
    #[inline]
    pub(crate) unsafe fn raw_unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) unsafe fn raw_try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// ### English
    /// Raw blocking lock used by [`crate::sync::multi_lock::MultiLock`] once
    /// it has decided the acquisition order; does not produce a guard.
    ///
    /// # Safety
    /// The caller is responsible for eventually calling [`Self::raw_unlock`]
    /// exactly once.
    ///
    /// ### 中文
    /// 供 [`crate::sync::multi_lock::MultiLock`] 在确定好加锁顺序后使用的
    /// 原始阻塞加锁；不产生 guard。
    ///
    /// # 安全性
    /// 调用方需负责之后恰好调用一次 [`Self::raw_unlock`]。
    #[inline]
    pub(crate) unsafe fn raw_lock(&self) {
        let mut backoff = Backoff::new();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    /// ### English
    /// Raw pointer to the protected value, for use by
    /// [`crate::sync::multi_lock::MultiLockGuard`] once the corresponding
    /// raw lock has been acquired.
    ///
    /// # Safety
    /// The caller must hold the lock for as long as the returned pointer is
    /// dereferenced.
    ///
    /// ### 中文
    /// 指向被保护值的原始指针，供 [`crate::sync::multi_lock::MultiLockGuard`]
    /// 在对应的原始锁已被获取后使用。
    ///
    /// # 安全性
    /// 调用方必须在解引用返回的指针期间持有该锁。
    #[inline]
    pub(crate) unsafe fn data_ptr(&self) -> *mut T {
        self.value.get()
    }
}

impl<'a, T> SpinlockGuard<'a, T> {
    /// ### English
    /// Releases the lock before the guard's scope ends. This is the escape
    /// hatch every parking-lot `wake` call relies on: the lock must be
    /// dropped *before* invoking a wake callback, because that callback may
    /// re-enter the same lock.
    ///
    /// #### Parameters
    /// - `guard`: Guard to consume and unlock early.
    ///
    /// ### 中文
    /// 在 guard 作用域结束前提前释放锁。这是每一次 parking lot `wake` 调用
    /// 都依赖的逃生舱：锁必须在调用 wake 回调*之前*释放，因为该回调可能重入同一把锁。
    ///
    /// #### 参数
    /// - `guard`：要消费并提前解锁的 guard。
    #[inline]
    pub(crate) fn unlock_early(guard: Self) {
        drop(guard);
    }
}

impl<'a, T> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<'a, T> DerefMut for SpinlockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<'a, T> Drop for SpinlockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutual_exclusion_under_contention() {
        let lock = Arc::new(Spinlock::new(0usize));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.lock() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = Spinlock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }
}
