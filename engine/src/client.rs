use crate::backend::{ActiveConnection, Backend, Connection};
use crate::bridge::Bridge;
use crate::error::Error;
use crate::port::{Mode, PortCounts};
use crate::router;
use crate::runtime::Runtime;
use crate::shutdown::ShutdownNotifier;
use std::sync::Arc;
use tracing::{info, warn};

type Active<B, R> = <<B as Backend>::Connection as Connection>::Active<R>;

/// A fully opened, activated audio client.
///
/// Construction either completes or drops everything it built, so a `Client`
/// value always refers to a live, processing connection until `close`.
pub struct Client<B: Backend, R: Runtime> {
    name: String,
    ports: PortCounts,
    connection: Option<Active<B, R>>,
    runtime: Option<Arc<R>>,
}

impl<B: Backend, R: Runtime> Client<B, R> {
    pub fn open(backend: &B, name: &str, ports: PortCounts, runtime: R) -> Result<Self, Error> {
        info!("opening jack client \"{name}\"");
        if name.contains('\0') {
            return Err(Error::EngineUnavailable {
                name: name.escape_default().to_string(),
                reason: "client name contains a NUL character".to_string(),
            });
        }
        let mut connection = backend.open(name)?;
        for mode in Mode::ALL {
            for index in 0..ports.get(mode) {
                connection.register_port(mode, index)?;
            }
        }

        let runtime = Arc::new(runtime);
        let bridge = Bridge::new(runtime.clone(), ports);
        let notifier = ShutdownNotifier::new(runtime.clone());
        let connection = connection.activate(bridge, notifier)?;

        info!(
            "using {} input ports, {} output ports",
            ports.inputs(),
            ports.outputs()
        );
        Ok(Self {
            name: name.to_string(),
            ports,
            connection: Some(connection),
            runtime: Some(runtime),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> PortCounts {
        self.ports
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn runtime(&self) -> Option<&R> {
        self.runtime.as_deref()
    }

    /// Autoconnects `range` ports starting at `start`; see [`router::connect`].
    pub fn connect(&self, mode: Mode, start: usize, range: usize, target: Option<&str>) -> usize {
        match &self.connection {
            Some(connection) => router::connect(connection, mode, start, range, target),
            None => 0,
        }
    }

    /// Disconnects `range` ports starting at `start`; see [`router::disconnect`].
    pub fn disconnect(&self, mode: Mode, start: usize, range: usize) -> usize {
        match &self.connection {
            Some(connection) => router::disconnect(connection, mode, start, range),
            None => 0,
        }
    }

    /// Stops processing, then releases the managed-side state. Calling it again
    /// does nothing.
    pub fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        info!("closing jack client \"{}\"", self.name);
        if let Err(e) = connection.deactivate() {
            warn!("{e}");
        }
        self.runtime = None;
    }
}

impl<B: Backend, R: Runtime> Drop for Client<B, R> {
    fn drop(&mut self) {
        self.close();
    }
}
