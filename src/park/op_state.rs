//! ### English
//! Type-erased parked-operation node: the intrusive list link plus a wake and
//! a cancel function pointer, fixed up once at construction so the parking
//! lot never needs to know the concrete awaiter type.
//!
//! ### 中文
//! 类型擦除的“已挂起操作”节点：侵入式链表指针，外加一个 wake 与一个 cancel
//! 函数指针，在构造时一次性确定，使 parking lot 永远不需要知道具体的等待者类型。

use std::ptr;

/// ### English
/// Implemented by the concrete awaiter embedded behind an [`OpState`]. `wake`
/// is always invoked; `cancel`'s default is a no-op for awaiters that have
/// nothing special to do when torn down unwoken (mirrors the source engine's
/// `HasCancel` concept, which only type-erases a `cancel()` call when the
/// derived type actually defines one).
///
/// ### 中文
/// 由嵌在 [`OpState`] 之后的具体等待者实现。`wake` 总会被调用；`cancel` 默认为
/// 空操作，供那些在未被唤醒就被拆除时无需特殊处理的等待者使用（对应源引擎的
/// `HasCancel` concept：只有派生类型确实定义了 `cancel()` 时才会类型擦除该调用）。
pub(crate) trait ParkedOp<Args> {
    fn wake(&mut self, args: Args);

    fn cancel(&mut self) {}
}

/// ### English
/// Intrusive queue node. Must be the first field of the concrete awaiter
/// struct (`#[repr(C)]`) so that a `*mut OpState<Args>` can be reinterpreted
/// as a `*mut D` inside the wake/cancel trampolines.
///
/// ### 中文
/// 侵入式队列节点。必须是具体等待者结构体（`#[repr(C)]`）的第一个字段，
/// 以便在 wake/cancel 跳板函数中把 `*mut OpState<Args>` 重新解释为 `*mut D`。
#[repr(C)]
pub(crate) struct OpState<Args> {
    pub(super) next: *mut OpState<Args>,
    wake_fn: unsafe fn(*mut OpState<Args>, Args),
    cancel_fn: unsafe fn(*mut OpState<Args>),
}

// SAFETY: `next` is only ever dereferenced while holding the owning lot's
// spinlock (or, for `multi_cancel_all`, the combined multi-lock), so moving
// an `OpState` (and the node embedding it) across threads is sound as long
// as `Args` itself is.
unsafe impl<Args: Send> Send for OpState<Args> {}

unsafe fn wake_trampoline<D: ParkedOp<Args>, Args>(op: *mut OpState<Args>, args: Args) {
    let derived = op as *mut D;
    unsafe { (*derived).wake(args) };
}

unsafe fn cancel_trampoline<D: ParkedOp<Args>, Args>(op: *mut OpState<Args>) {
    let derived = op as *mut D;
    unsafe { (*derived).cancel() };
}

impl<Args> OpState<Args> {
    /// ### English
    /// Builds a node whose wake/cancel trampolines dispatch to `D`'s
    /// [`ParkedOp`] implementation.
    ///
    /// # Safety
    /// The returned `OpState<Args>` must end up as the first field of a `D`
    /// value before its address is ever parked, or the trampolines will cast
    /// to the wrong layout.
    ///
    /// ### 中文
    /// 构造一个节点，其 wake/cancel 跳板会分发到 `D` 的 [`ParkedOp`] 实现。
    ///
    /// # 安全性
    /// 在其地址被 park 之前，返回的 `OpState<Args>` 必须已经是某个 `D` 值的
    /// 第一个字段，否则跳板会按错误的内存布局转换指针。
    pub(crate) fn new<D: ParkedOp<Args>>() -> Self {
        Self {
            next: ptr::null_mut(),
            wake_fn: wake_trampoline::<D, Args>,
            cancel_fn: cancel_trampoline::<D, Args>,
        }
    }

    /// ### English
    /// Invokes the wake trampoline on a parked node.
    ///
    /// # Safety
    /// `op` must point to a live node built by [`OpState::new`], embedded in
    /// its `D`, and not already woken or cancelled.
    ///
    /// ### 中文
    /// 对一个已挂起节点调用 wake 跳板。
    ///
    /// # 安全性
    /// `op` 必须指向一个由 [`OpState::new`] 构造、嵌入其 `D` 中的存活节点，
    /// 且尚未被唤醒或取消。
    pub(crate) unsafe fn wake(op: *mut Self, args: Args) {
        let wake_fn = unsafe { (*op).wake_fn };
        unsafe { wake_fn(op, args) };
    }

    /// ### English
    /// Invokes the cancel trampoline on a parked node.
    ///
    /// # Safety
    /// Same contract as [`OpState::wake`].
    ///
    /// ### 中文
    /// 对一个已挂起节点调用 cancel 跳板。
    ///
    /// # 安全性
    /// 与 [`OpState::wake`] 相同的前置条件。
    pub(crate) unsafe fn cancel(op: *mut Self) {
        let cancel_fn = unsafe { (*op).cancel_fn };
        unsafe { cancel_fn(op) };
    }

    /// ### English
    /// Reads the intrusive-list successor of a node already spliced out of
    /// its lot (e.g. via [`super::parking_lot::ParkingLot::take_all`]).
    /// Exists because `next` itself is `pub(super)` to `park`, and callers
    /// walking a spliced-out list from outside that module (again,
    /// [`crate::static_scope`]'s combined-lock design) need a way to do so.
    ///
    /// # Safety
    /// `op` must point to a live node.
    ///
    /// ### 中文
    /// 读取一个已从其 lot 摘出（例如通过
    /// [`super::parking_lot::ParkingLot::take_all`]）的节点的侵入式链表后继。
    /// 之所以存在，是因为 `next` 字段本身对 `park` 是 `pub(super)`，而从该模块
    /// 之外遍历摘出链表的调用方（同样是 [`crate::static_scope`] 的组合锁设计）
    /// 需要一种途径来做到这一点。
    ///
    /// # 安全性
    /// `op` 必须指向一个存活的节点。
    pub(crate) unsafe fn next(op: *mut Self) -> *mut Self {
        unsafe { (*op).next }
    }
}
