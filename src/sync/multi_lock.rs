//! ### English
//! Deadlock-avoiding ordered multi-lock: acquires several [`Spinlock`]s as one
//! unit by sorting them into a global order (pointer address) before
//! acquiring, and releasing in the reverse order.
//!
//! Used by the worker pool's idle-wait (own pinned + general lot, acquired
//! together so the condition variable can wait on either becoming non-empty)
//! and by `multi_cancel_all` (splice several lots under one critical section
//! without a window where an op could be woken by one path and cancelled by
//! another).
//!
//! ### 中文
//! 避免死锁的有序多重锁：在加锁前按全局顺序（指针地址）排序多个 [`Spinlock`]，
//! 将其作为一个整体获取，并按相反顺序释放。
//!
//! 用于 worker pool 的空闲等待（同时获取自身的 pinned 与 general 队列，以便条件变量
//! 能在二者任一变为非空时被唤醒），以及 `multi_cancel_all`（在单个临界区内拼接多个
//! 队列，避免某个 op 在一条路径被唤醒、在另一条路径被取消的竞争窗口）。

use super::spinlock::Spinlock;

/// ### English
/// Guard holding `N` spinlocks acquired in address order; indexing maps back
/// to the caller's original logical order, not the lock order.
///
/// ### 中文
/// 按地址顺序持有 `N` 把自旋锁的 guard；索引映射回调用方原本的逻辑顺序，而非加锁顺序。
pub(crate) struct MultiLockGuard<'a, T, const N: usize> {
    locks: [&'a Spinlock<T>; N],
    /// ### English
    /// `lock_order[k]` is the logical index locked `k`-th.
    ///
    /// ### 中文
    /// `lock_order[k]` 表示第 `k` 个被加锁的逻辑索引。
    lock_order: [usize; N],
}

/// ### English
/// Acquires `locks` as one unit, in ascending pointer-address order, to
/// guarantee a consistent global lock order across every call site that
/// might contend on an overlapping set of locks.
///
/// #### Parameters
/// - `locks`: The spinlocks to acquire together, in the caller's logical
///   order (e.g. `[own_general, own_pinned]`).
///
/// ### 中文
/// 按指针地址升序将 `locks` 作为一个整体获取，确保所有可能在重叠锁集合上
/// 竞争的调用点都遵循一致的全局加锁顺序。
///
/// #### 参数
/// - `locks`：要一起获取的自旋锁，按调用方的逻辑顺序给出（例如
///   `[own_general, own_pinned]`）。
pub(crate) fn lock_all<'a, T, const N: usize>(
    locks: [&'a Spinlock<T>; N],
) -> MultiLockGuard<'a, T, N> {
    let mut order: [usize; N] = std::array::from_fn(|i| i);
    order.sort_by_key(|&i| locks[i] as *const Spinlock<T> as usize);

    for &i in &order {
        unsafe { locks[i].raw_lock() };
    }

    MultiLockGuard {
        locks,
        lock_order: order,
    }
}

impl<'a, T, const N: usize> MultiLockGuard<'a, T, N> {
    /// ### English
    /// Accesses the `i`-th lock's protected value, `i` being the caller's
    /// original logical index (not the acquisition order).
    ///
    /// #### Parameters
    /// - `i`: Logical index matching the order passed to [`lock_all`].
    ///
    /// ### 中文
    /// 访问第 `i` 把锁保护的值，`i` 为调用方原本的逻辑索引（而非加锁顺序）。
    ///
    /// #### 参数
    /// - `i`：与传给 [`lock_all`] 时一致的逻辑索引。
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn get(&self, i: usize) -> &mut T {
        // SAFETY: all N locks are held for the lifetime of this guard, so
        // exclusive access to each protected value is guaranteed.
        unsafe { &mut *self.locks[i].data_ptr() }
    }
}

impl<'a, T, const N: usize> Drop for MultiLockGuard<'a, T, N> {
    fn drop(&mut self) {
        for &i in self.lock_order.iter().rev() {
            unsafe { self.locks[i].raw_unlock() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases_both_locks() {
        let a = Spinlock::new(1usize);
        let b = Spinlock::new(2usize);
        {
            let guard = lock_all([&a, &b]);
            assert_eq!(*guard.get(0), 1);
            assert_eq!(*guard.get(1), 2);
            *guard.get(0) += 10;
        }
        assert_eq!(*a.lock(), 11);
        assert_eq!(*b.lock(), 2);
    }

    #[test]
    fn order_independent_of_argument_order() {
        let a = Spinlock::new(0usize);
        let b = Spinlock::new(0usize);
        {
            let _g1 = lock_all([&a, &b]);
        }
        {
            // Reversed argument order must still succeed without deadlocking.
            let _g2 = lock_all([&b, &a]);
        }
    }
}
