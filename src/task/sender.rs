//! ### English
//! The `Sender`/`Receiver` vocabulary (§4.1): a lazy, composable description
//! of async work. Realized as ordinary Rust futures rather than hand-rolled
//! coroutines — `Sender::run` is the `connect` + `start` of the original
//! contract collapsed into one RPITIT method, and "a task awaiting a sender"
//! is simply `sender.run().await`.
//!
//! ### 中文
//! `Sender`/`Receiver` 词汇表（§4.1）：一种惰性、可组合的异步工作描述。
//! 以普通 Rust future 实现，而非手写协程——`Sender::run` 把原始契约中的
//! `connect` + `start` 折叠成一个 RPITIT 方法，“task 等待某个 sender”
//! 就是简单的 `sender.run().await`。

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

/// ### English
/// The three terminal outcomes a sender may deliver to its receiver: a
/// value, an error, or cancellation (`Done`). Exactly one is produced by a
/// well-behaved sender.
///
/// ### 中文
/// sender 可能交付给 receiver 的三种终结结果：值、错误，或取消（`Done`）。
/// 一个行为正确的 sender 恰好产生其中之一。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V, E> {
    Value(V),
    Error(E),
    Done,
}

impl<V, E> Outcome<V, E> {
    pub(crate) fn map_value<V2>(self, f: impl FnOnce(V) -> V2) -> Outcome<V2, E> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Done => Outcome::Done,
        }
    }
}

/// ### English
/// A lazy value that, once run, delivers exactly one [`Outcome`]. `connect`
/// and `start` are infallible per the design (§4.1) — there is deliberately
/// no fallible path into starting a sender; every failure the sender can
/// report flows through `Outcome::Error`/`Outcome::Done` instead.
///
/// ### 中文
/// 一个惰性值，一旦运行就恰好交付一个 [`Outcome`]。按设计（§4.1），`connect`
/// 与 `start` 均为不可失败——刻意不存在启动 sender 失败的路径；sender
/// 能报告的一切失败都改为通过 `Outcome::Error`/`Outcome::Done` 传递。
pub(crate) trait Sender: Send {
    type Value: Send;
    type Error: Send;

    fn run(self) -> impl Future<Output = Outcome<Self::Value, Self::Error>> + Send;
}

/// ### English
/// A scheduler exposes exactly one operation the task runtime needs:
/// `schedule()`, a sender that resolves (with no value) once the receiver
/// has been transferred onto the scheduler's notion of "a thread it owns".
/// `WorkerPool`, `BlockingPool`, and the OS-polling slot all implement this.
///
/// ### 中文
/// 调度器只需要向任务运行时暴露一个操作：`schedule()`，一个 sender，
/// 一旦 receiver 被转移到该调度器所拥有的“线程”上就完成（不带值）。
/// `WorkerPool`、`BlockingPool` 以及 OS-polling slot 均实现此 trait。
pub(crate) trait Scheduler: Send + Sync {
    type ScheduleSender: Sender<Value = (), Error = Infallible> + 'static;

    fn schedule(&self) -> Self::ScheduleSender;
}

/// ### English
/// `just(v)` — a sender that resolves immediately with `v` and never errors.
/// The simplest possible leaf sender; used in tests and as the seed value
/// feeding into `then`/`let_error` chains.
///
/// ### 中文
/// `just(v)` ——一个立即以 `v` 完成且永不出错的 sender。最简单的叶子 sender，
/// 用于测试，以及作为 `then`/`let_error` 链的起始值。
pub(crate) struct Just<V>(pub(crate) V);

impl<V: Send> Sender for Just<V> {
    type Value = V;
    type Error = Infallible;

    async fn run(self) -> Outcome<V, Infallible> {
        Outcome::Value(self.0)
    }
}

pub(crate) fn just<V: Send>(value: V) -> Just<V> {
    Just(value)
}

/// ### English
/// A boxed, already-erased sender. Object-safe external-collaborator traits
/// (`AsyncFile`, `WindowingOps`, `RendererOps` in [`crate::frame`]) cannot
/// return `impl Sender` directly — an RPITIT return makes a trait
/// non-object-safe, and those traits are implemented by embedder code held
/// behind `&dyn Trait` — so their methods return `BoxSender<V, E>` instead,
/// built from any ordinary async block via [`box_sender`].
///
/// ### 中文
/// 一个已装箱、已类型擦除的 sender。对象安全的外部协作方 trait（[`crate::frame`]
/// 中的 `AsyncFile`、`WindowingOps`、`RendererOps`）不能直接返回 `impl Sender`——
/// RPITIT 返回值会让 trait 失去对象安全性，而这些 trait 正是由宿主代码实现并以
/// `&dyn Trait` 持有——因此它们的方法改为返回 `BoxSender<V, E>`，可通过
/// [`box_sender`] 由任意普通 async block 构造。
pub struct BoxSender<V, E> {
    fut: Pin<Box<dyn Future<Output = Outcome<V, E>> + Send>>,
}

impl<V: Send, E: Send> Sender for BoxSender<V, E> {
    type Value = V;
    type Error = E;

    fn run(self) -> impl Future<Output = Outcome<V, E>> + Send {
        self.fut
    }
}

/// ### English
/// Builds a [`BoxSender`] from any `Send` future that yields an [`Outcome`].
///
/// ### 中文
/// 由任意产生 [`Outcome`] 的 `Send` future 构造 [`BoxSender`]。
pub fn box_sender<V, E>(
    fut: impl Future<Output = Outcome<V, E>> + Send + 'static,
) -> BoxSender<V, E> {
    BoxSender { fut: Box::pin(fut) }
}
