//! ### English
//! Low-level synchronization primitives shared by the parking lot, the
//! schedulers, and the static scope: a cache-conscious spinlock and the
//! ordered multi-lock built on top of it.
//!
//! ### 中文
//! parking lot、各调度器与 static scope 共用的底层同步原语：一个对缓存友好的
//! 自旋锁，以及构建于其上的有序多重锁。

pub(crate) mod multi_lock;
pub(crate) mod spinlock;
