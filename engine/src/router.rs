use crate::error::Error;
use crate::port::Mode;
use tracing::{debug, warn};

/// Where autoconnection should look for peer ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Hardware ports of the complementary direction.
    Physical,
    /// Ports of the named client, or, when the text contains `:`, ports whose
    /// full name matches it as a regular expression.
    Client(&'a str),
}

impl<'a> Target<'a> {
    /// `None` means "do not autoconnect"; an empty name selects physical ports.
    pub fn parse(target: Option<&'a str>) -> Option<Self> {
        match target {
            None => None,
            Some("") => Some(Target::Physical),
            Some(name) => Some(Target::Client(name)),
        }
    }
}

/// The routing view of an active connection.
pub trait PortGraph {
    /// Full names of the ports `mode` ports may connect to, in engine order.
    fn candidates(&self, mode: Mode, target: Target<'_>) -> Vec<String>;

    /// Connects own port `(mode, index)` with `peer`, honouring direction.
    fn connect(&self, mode: Mode, index: usize, peer: &str) -> Result<(), Error>;

    /// Removes every connection of own port `(mode, index)`.
    fn disconnect(&self, mode: Mode, index: usize) -> Result<(), Error>;
}

/// Connects up to `range` ports starting at `start`. Returns how many were
/// connected; running out of candidates or a failed connect ends early.
pub fn connect<G>(graph: &G, mode: Mode, start: usize, range: usize, target: Option<&str>) -> usize
where
    G: PortGraph + ?Sized,
{
    let Some(target) = Target::parse(target) else {
        return 0;
    };
    if let Target::Client(pattern) = target {
        if pattern.contains('\0') {
            warn!("connection target {pattern:?} contains a NUL character");
            return 0;
        }
    }
    debug!("connecting {mode} ports to {target:?}");
    let candidates = graph.candidates(mode, target);

    let mut connected = 0;
    for offset in 0..range {
        let Some(peer) = candidates.get(offset) else {
            warn!("not enough ports to autoconnect to");
            break;
        };
        let Some(index) = start.checked_add(offset) else {
            break;
        };
        debug!("connecting {mode} {} to {peer}", index + 1);
        if let Err(e) = graph.connect(mode, index, peer) {
            warn!("cannot autoconnect {mode} port: {e}");
            break;
        }
        connected += 1;
    }
    connected
}

/// Disconnects ports `start..start + range`, stopping at the first failure.
/// Returns how many were disconnected.
pub fn disconnect<G>(graph: &G, mode: Mode, start: usize, range: usize) -> usize
where
    G: PortGraph + ?Sized,
{
    debug!("disconnecting {mode} ports {start}..+{range}");
    let mut disconnected = 0;
    for index in (start..).take(range) {
        debug!("disconnecting {mode} port {}", index + 1);
        if let Err(e) = graph.disconnect(mode, index) {
            warn!("unable to disconnect {mode} port {}: {e}", index + 1);
            break;
        }
        disconnected += 1;
    }
    disconnected
}
