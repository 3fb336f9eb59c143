pub mod backend;
pub mod bridge;
pub mod buffer;
pub mod client;
pub mod config;
pub mod entry;
mod error;
pub mod handle;
pub mod hw;
pub mod port;
pub mod router;
pub mod runtime;
pub mod shutdown;

pub use backend::{ActiveConnection, Backend, Connection, ServerInfo};
pub use bridge::Bridge;
pub use buffer::{BufferViewCache, SAMPLE_SIZE};
pub use client::Client;
pub use entry::EntryBinding;
pub use error::Error;
pub use handle::HandleTable;
pub use hw::jack::JackBackend;
pub use port::{MAX_PORTS, Mode, PortCounts};
pub use router::{PortGraph, Target};
pub use runtime::{Attachment, Delivery, Runtime};
pub use shutdown::ShutdownNotifier;
