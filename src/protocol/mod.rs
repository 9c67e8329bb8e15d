//! Serial binary protocol.
//!
//! ```text
//!  Transport ──▶ FrameReceiver ──▶ dispatch ──▶ handler ──▶ Reply
//!      ▲                                                      │
//!      └──────────────── Frame (response / status) ◀──────────┘
//! ```
//!
//! - [`codes`]: verbs, frame tags, data kinds and status codes
//! - [`codec`]: payload reader, frame builder and bit packing
//! - [`receiver`]: silence-delimited framing on the receive side
//! - [`dispatch`]: the `(Verb, DataKind)` handler table
//! - [`transport`]: the byte-stream abstraction

pub mod codec;
pub mod codes;
pub mod dispatch;
pub mod receiver;
pub mod transport;
