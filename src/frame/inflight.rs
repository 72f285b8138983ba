//! ### English
//! `InflightResource<T>` (§3): a fixed-size ring of per-slot resources,
//! indexed by `frame_index mod ring_len`. The source engine's
//! `InflightResource` iterates and explicitly destroys each element when the
//! ring itself is torn down; here that is simply `Drop` on the backing
//! `Box<[T]>` — Rust's drop glue supersedes the manual-destruction step the
//! original needed.
//!
//! ### 中文
//! `InflightResource<T>`（§3）：固定大小的按槽位资源 ring，以
//! `frame_index mod ring_len` 索引。源引擎的 `InflightResource` 在 ring 本身被
//! 拆除时会遍历并显式析构每个元素；这里只需依赖底层 `Box<[T]>` 的 `Drop`——
//! Rust 的析构链替代了原版所需的手动析构步骤。

use crossbeam_utils::CachePadded;

use crate::config::MAX_INFLIGHT_FRAMES;

/// ### English
/// A ring of `len` cache-line-padded `T` values, `len` clamped to
/// `1..=MAX_INFLIGHT_FRAMES`. Concurrent slots are accessed by different
/// frames at once (frame N using slot `N mod len` while frame N+len is not
/// yet started), so each slot is padded to avoid false sharing between
/// neighbors — mirroring `WorkerPool`'s `CachePadded<WorkerRecord>` use.
///
/// ### 中文
/// 一个由 `len` 个按缓存行填充的 `T` 值组成的 ring，`len` 钳制在
/// `1..=MAX_INFLIGHT_FRAMES`。不同帧会同时访问不同槽位（帧 N 使用槽位
/// `N mod len` 时，帧 `N+len` 尚未开始），因此每个槽位都做缓存行填充以避免
/// 相邻槽位间的伪共享——与 `WorkerPool` 使用 `CachePadded<WorkerRecord>` 的
/// 做法一致。
pub(crate) struct InflightResource<T> {
    slots: Box<[CachePadded<T>]>,
}

impl<T> InflightResource<T> {
    /// ### English
    /// Builds a ring of `len` elements (clamped as above), each produced by
    /// `make(slot_index)`.
    ///
    /// ### 中文
    /// 构建一个由 `len` 个元素组成的 ring（按上文钳制），每个元素由
    /// `make(slot_index)` 生成。
    pub(crate) fn new_with(len: usize, mut make: impl FnMut(usize) -> T) -> Self {
        let len = len.clamp(1, MAX_INFLIGHT_FRAMES);
        let slots = (0..len).map(|i| CachePadded::new(make(i))).collect();
        Self { slots }
    }

    /// ### English
    /// Number of slots in the ring.
    ///
    /// ### 中文
    /// ring 中的槽位数量。
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// ### English
    /// Slot index that `frame_index` maps onto.
    ///
    /// ### 中文
    /// `frame_index` 所映射到的槽位索引。
    pub(crate) fn slot_index(&self, frame_index: u64) -> usize {
        (frame_index % self.slots.len() as u64) as usize
    }

    /// ### English
    /// Borrows the slot `frame_index` maps onto.
    ///
    /// ### 中文
    /// 借用 `frame_index` 所映射到的槽位。
    pub(crate) fn get(&self, frame_index: u64) -> &T {
        &self.slots[self.slot_index(frame_index)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn index_wraps_modulo_len() {
        let ring = InflightResource::new_with(3, |i| i);
        assert_eq!(*ring.get(0), 0);
        assert_eq!(*ring.get(1), 1);
        assert_eq!(*ring.get(2), 2);
        assert_eq!(*ring.get(3), 0);
        assert_eq!(*ring.get(7), 1);
    }

    #[test]
    fn len_clamped_to_max_inflight_frames() {
        let ring = InflightResource::new_with(99, |_| AtomicUsize::new(0));
        assert_eq!(ring.len(), MAX_INFLIGHT_FRAMES);
        let ring = InflightResource::new_with(0, |_| AtomicUsize::new(0));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn slots_are_independently_addressable() {
        let ring = InflightResource::new_with(2, |_| AtomicUsize::new(0));
        ring.get(0).fetch_add(5, Ordering::SeqCst);
        ring.get(1).fetch_add(9, Ordering::SeqCst);
        assert_eq!(ring.get(0).load(Ordering::SeqCst), 5);
        assert_eq!(ring.get(1).load(Ordering::SeqCst), 9);
    }
}
