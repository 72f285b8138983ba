//! ### English
//! The algebraic sender combinators required by §4.1: `then`, `on`,
//! `let_error`, and `when_all`. Each is an adapter sender consumed by
//! `run`, never copied, matching the spirit of the source engine's `unifex`
//! combinators generalized to Rust's move-only ownership.
//!
//! ### 中文
//! §4.1 所需的代数 sender 组合子：`then`、`on`、`let_error`、`when_all`。
//! 每一个都是在 `run` 时被消费、从不拷贝的适配器 sender，对应源引擎 `unifex`
//! 组合子的精神，并推广到 Rust 的移动语义所有权模型。

use std::future::poll_fn;
use std::task::Poll;

use super::sender::{Outcome, Scheduler, Sender};

/// ### English
/// `then(s, f)` — maps a successful value through `f`; propagates
/// error/done untouched.
///
/// ### 中文
/// `then(s, f)` ——通过 `f` 映射成功值；原样传播 error/done。
pub(crate) struct Then<S, F> {
    sender: S,
    f: F,
}

pub(crate) fn then<S, F, V2>(sender: S, f: F) -> Then<S, F>
where
    S: Sender,
    F: FnOnce(S::Value) -> V2 + Send,
    V2: Send,
{
    Then { sender, f }
}

impl<S, F, V2> Sender for Then<S, F>
where
    S: Sender,
    F: FnOnce(S::Value) -> V2 + Send,
    V2: Send,
{
    type Value = V2;
    type Error = S::Error;

    async fn run(self) -> Outcome<V2, S::Error> {
        self.sender.run().await.map_value(self.f)
    }
}

/// ### English
/// `on(scheduler, s)` — transfers to `scheduler` first, then starts `s`.
/// If the transfer itself is cancelled, `s` never runs.
///
/// ### 中文
/// `on(scheduler, s)` ——先转移到 `scheduler`，再启动 `s`。
/// 若转移本身被取消，则 `s` 永远不会运行。
pub(crate) struct On<Sch, S> {
    scheduler: Sch,
    sender: S,
}

pub(crate) fn on<Sch: Scheduler, S: Sender>(scheduler: Sch, sender: S) -> On<Sch, S> {
    On { scheduler, sender }
}

impl<Sch: Scheduler, S: Sender> Sender for On<Sch, S> {
    type Value = S::Value;
    type Error = S::Error;

    async fn run(self) -> Outcome<S::Value, S::Error> {
        match self.scheduler.schedule().run().await {
            Outcome::Value(()) => {}
            Outcome::Done => return Outcome::Done,
            Outcome::Error(never) => match never {},
        }
        self.sender.run().await
    }
}

/// ### English
/// `let_error(s, h)` — if `s` fails, replaces the outcome with the sender
/// produced by `h(err)`. A successful value or cancellation passes through.
///
/// ### 中文
/// `let_error(s, h)` ——若 `s` 失败，用 `h(err)` 产生的 sender 替换其结果。
/// 成功值或取消会直接透传。
pub(crate) struct LetError<S, H> {
    sender: S,
    handler: H,
}

pub(crate) fn let_error<S, H, S2>(sender: S, handler: H) -> LetError<S, H>
where
    S: Sender,
    H: FnOnce(S::Error) -> S2 + Send,
    S2: Sender<Value = S::Value>,
{
    LetError { sender, handler }
}

impl<S, H, S2> Sender for LetError<S, H>
where
    S: Sender,
    H: FnOnce(S::Error) -> S2 + Send,
    S2: Sender<Value = S::Value>,
{
    type Value = S::Value;
    type Error = S2::Error;

    async fn run(self) -> Outcome<S::Value, S2::Error> {
        match self.sender.run().await {
            Outcome::Value(v) => Outcome::Value(v),
            Outcome::Done => Outcome::Done,
            Outcome::Error(e) => (self.handler)(e).run().await,
        }
    }
}

/// ### English
/// Error produced by [`when_all2`] identifying which of the two branches
/// failed.
///
/// ### 中文
/// [`when_all2`] 产生的错误，标明两个分支中哪一个失败了。
#[derive(Debug)]
pub(crate) enum WhenAllError2<EA, EB> {
    First(EA),
    Second(EB),
}

/// ### English
/// `when_all(a, b)` — runs both senders concurrently (by polling both
/// futures from one task), waits for both to succeed, and short-circuits to
/// `Done`/`Error` the moment either branch reports one, dropping the other
/// branch's future in place (which, for a future composed of our own
/// senders, is how cancellation propagates).
///
/// ### 中文
/// `when_all(a, b)` ——并发运行两个 sender（在同一个任务内轮询两个 future），
/// 等待两者都成功；一旦任一分支报告 `Done`/`Error`，立即短路返回，并就地丢弃
/// 另一分支的 future（对于由我们自己的 sender 组成的 future 而言，这就是
/// 取消得以传播的方式）。
pub(crate) struct WhenAll2<A, B> {
    a: A,
    b: B,
}

pub(crate) fn when_all2<A: Sender, B: Sender>(a: A, b: B) -> WhenAll2<A, B> {
    WhenAll2 { a, b }
}

impl<A: Sender, B: Sender> Sender for WhenAll2<A, B> {
    type Value = (A::Value, B::Value);
    type Error = WhenAllError2<A::Error, B::Error>;

    async fn run(self) -> Outcome<(A::Value, B::Value), WhenAllError2<A::Error, B::Error>> {
        let mut fa = Box::pin(self.a.run());
        let mut fb = Box::pin(self.b.run());
        let mut a_result = None;
        let mut b_result = None;

        poll_fn(|cx| {
            if a_result.is_none() {
                if let Poll::Ready(o) = fa.as_mut().poll(cx) {
                    a_result = Some(o);
                }
            }
            if matches!(a_result, Some(Outcome::Error(_)) | Some(Outcome::Done)) {
                return Poll::Ready(());
            }
            if b_result.is_none() {
                if let Poll::Ready(o) = fb.as_mut().poll(cx) {
                    b_result = Some(o);
                }
            }
            if matches!(b_result, Some(Outcome::Error(_)) | Some(Outcome::Done)) {
                return Poll::Ready(());
            }
            if a_result.is_some() && b_result.is_some() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;

        match (a_result, b_result) {
            (Some(Outcome::Done), _) | (_, Some(Outcome::Done)) => Outcome::Done,
            (Some(Outcome::Error(ea)), _) => Outcome::Error(WhenAllError2::First(ea)),
            (_, Some(Outcome::Error(eb))) => Outcome::Error(WhenAllError2::Second(eb)),
            (Some(Outcome::Value(va)), Some(Outcome::Value(vb))) => Outcome::Value((va, vb)),
            _ => unreachable!("when_all2 resolved without both branches settled"),
        }
    }
}

/// ### English
/// Homogeneous generalization of `when_all` over a runtime-sized collection
/// of same-typed senders (e.g. "acquire the next swapchain image for every
/// window"). Same short-circuit semantics as [`WhenAll2`].
///
/// ### 中文
/// 对一组运行时大小、类型相同的 sender 的同质化 `when_all` 推广（例如“为每个
/// 窗口获取下一张 swapchain 图像”）。短路语义与 [`WhenAll2`] 相同。
pub(crate) struct WhenAll<S> {
    senders: Vec<S>,
}

pub(crate) fn when_all<S: Sender>(senders: Vec<S>) -> WhenAll<S> {
    WhenAll { senders }
}

impl<S: Sender> Sender for WhenAll<S> {
    type Value = Vec<S::Value>;
    type Error = S::Error;

    async fn run(self) -> Outcome<Vec<S::Value>, S::Error> {
        let mut futures: Vec<_> = self.senders.into_iter().map(|s| Box::pin(s.run())).collect();
        let mut results: Vec<Option<Outcome<S::Value, S::Error>>> =
            (0..futures.len()).map(|_| None).collect();

        poll_fn(|cx| {
            let mut short_circuit = false;
            for (fut, result) in futures.iter_mut().zip(results.iter_mut()) {
                if result.is_none() {
                    if let Poll::Ready(o) = fut.as_mut().poll(cx) {
                        short_circuit |= matches!(o, Outcome::Error(_) | Outcome::Done);
                        *result = Some(o);
                    }
                }
            }
            if short_circuit || results.iter().all(Option::is_some) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;

        let mut values = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Some(Outcome::Value(v)) => values.push(v),
                Some(Outcome::Done) => return Outcome::Done,
                Some(Outcome::Error(e)) => return Outcome::Error(e),
                None => return Outcome::Done,
            }
        }
        Outcome::Value(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::block_on;
    use crate::task::sender::just;

    #[test]
    fn then_maps_value() {
        let outcome = block_on(then(just(3), |v| v * 2).run());
        assert_eq!(outcome, Outcome::Value(6));
    }

    #[test]
    fn let_error_passes_through_values() {
        let outcome = block_on(let_error(just(3), |()| just(0)).run());
        assert_eq!(outcome, Outcome::Value(3));
    }

    #[test]
    fn when_all2_collects_both_values() {
        let outcome = block_on(when_all2(just(1), just("a")).run());
        match outcome {
            Outcome::Value((1, "a")) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn when_all_collects_all_values() {
        let outcome = block_on(when_all(vec![just(1), just(2), just(3)]).run());
        assert_eq!(outcome, Outcome::Value(vec![1, 2, 3]));
    }
}
