//! ### English
//! The sender/receiver structured-concurrency runtime (§4.1): the `Sender`
//! vocabulary and its algebraic combinators, the minimal poll-on-wake task
//! executor that drives a sender's future, and `async_scope`.
//!
//! ### 中文
//! sender/receiver 结构化并发运行时（§4.1）：`Sender` 词汇表及其代数组合子、
//! 驱动 sender future 的最小“唤醒即轮询”任务执行器，以及 `async_scope`。

pub(crate) mod async_scope;
pub(crate) mod combinators;
pub(crate) mod driver;
pub(crate) mod sender;
