//! Source registry and packet fan-out
//!
//! The registry is the process-wide map of RTSP sources and their runtime
//! state: run flag, codec list, viewer queues, last worker error. Workers
//! publish into it, sessions subscribe out of it, and the HTTP adapter
//! drives it.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<StreamRegistry>
//!                ┌────────────────────────────┐
//!                │ streams: HashMap<id,       │
//!                │   StreamEntry {            │
//!                │     source,                │
//!                │     runtime { codecs,      │
//!                │       bus: PacketBus,      │
//!                │       codec_gate: watch }  │
//!                │   }                        │
//!                └─────────────┬──────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!   [StreamWorker]        [viewer pump]         [viewer pump]
//!   cast()/set_codecs()   handle.recv()         handle.recv()
//! ```
//!
//! Fan-out clones `Packet`, and the packet payload is `bytes::Bytes`, so all
//! viewers share one allocation per packet.

pub mod source;
pub mod store;
pub mod viewer;

pub use source::Source;
pub use store::{StreamRegistry, CODEC_WAIT_TIMEOUT};
pub use viewer::{ViewerHandle, VIEWER_QUEUE_CAPACITY};
