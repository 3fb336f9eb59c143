use crate::bridge::Bridge;
use crate::error::Error;
use crate::port::Mode;
use crate::router::PortGraph;
use crate::runtime::Runtime;
use crate::shutdown::ShutdownNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    pub sample_rate: usize,
    pub buffer_size: usize,
}

/// An audio engine clients can be opened against.
pub trait Backend {
    type Connection: Connection;

    /// Opens a client connection named `name`.
    fn open(&self, name: &str) -> Result<Self::Connection, Error>;

    /// Queries the server through a short-lived auxiliary client.
    fn server_info(&self) -> Result<ServerInfo, Error>;
}

/// A connection that is open but not yet processing.
pub trait Connection: Sized {
    type Active<R: Runtime>: ActiveConnection;

    fn register_port(&mut self, mode: Mode, index: usize) -> Result<(), Error>;

    /// Installs the process and shutdown callbacks and starts processing.
    /// On failure the connection is closed.
    fn activate<R: Runtime>(
        self,
        bridge: Bridge<R>,
        notifier: ShutdownNotifier<R>,
    ) -> Result<Self::Active<R>, Error>;
}

/// A processing connection. Dropping it must deactivate and close it.
pub trait ActiveConnection: PortGraph {
    /// Stops callbacks, waiting for a running block to finish, and closes the
    /// connection.
    fn deactivate(self) -> Result<(), Error>;
}
