//! ### English
//! Intrusive parking primitives shared by every scheduler and by the static
//! scope: a type-erased op node ([`op_state`]) and the FIFO lot that queues
//! them ([`parking_lot`]).
//!
//! ### 中文
//! 各调度器与 static scope 共用的侵入式挂起原语：类型擦除的 op 节点
//! （[`op_state`]），以及排队这些节点的 FIFO lot（[`parking_lot`]）。

pub(crate) mod op_state;
pub(crate) mod parking_lot;
pub(crate) mod wait;
