#![allow(dead_code)]

use jacknative_engine::port::port_name;
use jacknative_engine::{
    ActiveConnection, Attachment, Backend, Bridge, Connection, Delivery, Error, Mode, PortCounts,
    PortGraph, Runtime, ServerInfo, ShutdownNotifier, Target,
};
use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub address: usize,
    pub bytes: usize,
    pub serial: usize,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub inputs: Vec<Option<View>>,
    pub outputs: Vec<Option<View>>,
    pub reallocated: bool,
}

#[derive(Default)]
pub struct RuntimeState {
    pub attach_fails: AtomicBool,
    pub publish_fails: AtomicBool,
    pub owner_released: AtomicBool,
    pub attaches: AtomicUsize,
    pub views_built: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub dropped: AtomicBool,
    pub collections: Mutex<[Vec<Option<View>>; 2]>,
    pub blocks: Mutex<Vec<Block>>,
}

impl RuntimeState {
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }

    pub fn last_block(&self) -> Option<Block> {
        self.blocks.lock().unwrap().last().cloned()
    }
}

pub struct MockRuntime {
    state: Arc<RuntimeState>,
}

impl MockRuntime {
    pub fn new(ports: PortCounts) -> (Self, Arc<RuntimeState>) {
        let state = Arc::new(RuntimeState::default());
        *state.collections.lock().unwrap() = [vec![None; ports.inputs()], vec![None; ports.outputs()]];
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Drop for MockRuntime {
    fn drop(&mut self) {
        self.state.dropped.store(true, Ordering::SeqCst);
    }
}

impl Runtime for MockRuntime {
    type View = View;
    type Attachment<'a> = MockAttachment<'a>;

    fn attach(&self) -> Result<MockAttachment<'_>, Error> {
        if self.state.attach_fails.load(Ordering::SeqCst) {
            return Err(Error::AttachmentFailed("thread limit reached".to_string()));
        }
        self.state.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(MockAttachment { state: &self.state })
    }

    fn notify_shutdown(&self) -> Result<Delivery, Error> {
        if self.state.owner_released.load(Ordering::SeqCst) {
            return Ok(Delivery::OwnerReleased);
        }
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(Delivery::Delivered)
    }
}

pub struct MockAttachment<'a> {
    state: &'a RuntimeState,
}

impl Attachment for MockAttachment<'_> {
    type View = View;

    unsafe fn create_view(&mut self, buffer: NonNull<f32>, bytes: usize) -> Result<View, Error> {
        let serial = self.state.views_built.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(View {
            address: buffer.as_ptr() as usize,
            bytes,
            serial,
        })
    }

    fn publish(&mut self, mode: Mode, index: usize, view: &View) -> Result<(), Error> {
        if self.state.publish_fails.load(Ordering::SeqCst) {
            return Err(Error::Runtime("array store failed".to_string()));
        }
        let mut collections = self.state.collections.lock().unwrap();
        let slot = collections[mode.slot()]
            .get_mut(index)
            .ok_or_else(|| Error::Runtime(format!("index {index} out of bounds")))?;
        *slot = Some(view.clone());
        Ok(())
    }

    fn process(&mut self, reallocated: bool) -> Result<(), Error> {
        let [inputs, outputs] = self.state.collections.lock().unwrap().clone();
        self.state.blocks.lock().unwrap().push(Block {
            inputs,
            outputs,
            reallocated,
        });
        Ok(())
    }
}

pub struct Peer {
    pub name: String,
    pub mode: Mode,
    pub physical: bool,
}

type BlockFn = Box<dyn FnMut(usize, &[NonNull<f32>], &[NonNull<f32>]) -> Result<bool, Error> + Send>;
type ShutdownFn = Box<dyn FnMut() -> Option<Delivery> + Send>;

pub struct ServerState {
    pub running: bool,
    pub clients: HashSet<String>,
    pub ports: Vec<String>,
    pub peers: Vec<Peer>,
    pub fail_register: Option<(Mode, usize)>,
    pub fail_activate: bool,
    pub fail_connect_at: Option<usize>,
    pub fail_disconnect: HashSet<(Mode, usize)>,
    pub queries: usize,
    pub links: Vec<(String, String)>,
    process: Option<BlockFn>,
    shutdown: Option<ShutdownFn>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            running: true,
            clients: HashSet::new(),
            ports: Vec::new(),
            peers: Vec::new(),
            fail_register: None,
            fail_activate: false,
            fail_connect_at: None,
            fail_disconnect: HashSet::new(),
            queries: 0,
            links: Vec::new(),
            process: None,
            shutdown: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub server: Arc<Mutex<ServerState>>,
}

impl MockBackend {
    pub fn stopped() -> Self {
        let backend = Self::default();
        backend.server.lock().unwrap().running = false;
        backend
    }

    pub fn with_peers(peers: &[(&str, Mode, bool)]) -> Self {
        let backend = Self::default();
        backend.server.lock().unwrap().peers = peers
            .iter()
            .map(|(name, mode, physical)| Peer {
                name: name.to_string(),
                mode: *mode,
                physical: *physical,
            })
            .collect();
        backend
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.server.lock().unwrap()
    }

    pub fn is_processing(&self) -> bool {
        self.state().process.is_some()
    }

    /// Plays one engine block; `None` when no client is active.
    pub fn run_block(
        &self,
        frames: usize,
        inputs: &[NonNull<f32>],
        outputs: &[NonNull<f32>],
    ) -> Option<Result<bool, Error>> {
        let mut state = self.state();
        let process = state.process.as_mut()?;
        Some(process(frames, inputs, outputs))
    }

    /// Plays the engine's shutdown notification; `None` when no client is active.
    pub fn shut_down(&self) -> Option<Option<Delivery>> {
        let mut state = self.state();
        let shutdown = state.shutdown.as_mut()?;
        Some(shutdown())
    }
}

impl Backend for MockBackend {
    type Connection = MockConnection;

    fn open(&self, name: &str) -> Result<MockConnection, Error> {
        let mut state = self.state();
        if !state.running {
            return Err(Error::EngineUnavailable {
                name: name.to_string(),
                reason: "server not running".to_string(),
            });
        }
        if !state.clients.insert(name.to_string()) {
            return Err(Error::EngineUnavailable {
                name: name.to_string(),
                reason: "name in use".to_string(),
            });
        }
        Ok(MockConnection {
            server: self.server.clone(),
            name: name.to_string(),
            ports: Vec::new(),
        })
    }

    fn server_info(&self) -> Result<ServerInfo, Error> {
        if !self.state().running {
            return Err(Error::EngineUnavailable {
                name: "jack auxiliary client".to_string(),
                reason: "server not running".to_string(),
            });
        }
        Ok(ServerInfo {
            sample_rate: 48_000,
            buffer_size: 256,
        })
    }
}

pub struct MockConnection {
    server: Arc<Mutex<ServerState>>,
    name: String,
    ports: Vec<(Mode, String)>,
}

impl MockConnection {
    fn own_port(&self, mode: Mode, index: usize) -> Result<String, Error> {
        self.ports
            .iter()
            .filter(|(m, _)| *m == mode)
            .nth(index)
            .map(|(_, name)| name.clone())
            .ok_or_else(|| Error::Runtime(format!("no {mode} port {}", index + 1)))
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut state = self.server.lock().unwrap();
        state.clients.remove(&self.name);
        let prefix = format!("{}:", self.name);
        state.ports.retain(|p| !p.starts_with(&prefix));
        state.links.retain(|(a, b)| !a.starts_with(&prefix) && !b.starts_with(&prefix));
    }
}

impl Connection for MockConnection {
    type Active<R: Runtime> = MockActive;

    fn register_port(&mut self, mode: Mode, index: usize) -> Result<(), Error> {
        let mut state = self.server.lock().unwrap();
        if state.fail_register == Some((mode, index)) {
            return Err(Error::PortRegistrationFailed {
                mode,
                index,
                reason: "port limit".to_string(),
            });
        }
        let full = format!("{}:{}", self.name, port_name(mode, index));
        state.ports.push(full.clone());
        self.ports.push((mode, full));
        Ok(())
    }

    fn activate<R: Runtime>(
        self,
        bridge: Bridge<R>,
        notifier: ShutdownNotifier<R>,
    ) -> Result<MockActive, Error> {
        let mut state = self.server.lock().unwrap();
        if state.fail_activate {
            return Err(Error::ActivationFailed("server refused".to_string()));
        }
        let mut bridge = bridge;
        let process: BlockFn = Box::new(
            move |frames: usize, inputs: &[NonNull<f32>], outputs: &[NonNull<f32>]| unsafe {
                bridge.run_block(frames, inputs.iter().copied(), outputs.iter().copied())
            },
        );
        let shutdown: ShutdownFn = Box::new(move || notifier.notify());
        state.process = Some(process);
        state.shutdown = Some(shutdown);
        drop(state);
        Ok(MockActive { connection: self })
    }
}

pub struct MockActive {
    connection: MockConnection,
}

impl MockActive {
    fn stop(&self) {
        let mut state = self.connection.server.lock().unwrap();
        state.process = None;
        state.shutdown = None;
    }
}

impl Drop for MockActive {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PortGraph for MockActive {
    fn candidates(&self, mode: Mode, target: Target<'_>) -> Vec<String> {
        let mut state = self.connection.server.lock().unwrap();
        state.queries += 1;
        state
            .peers
            .iter()
            .filter(|peer| peer.mode == mode.complement())
            .filter(|peer| match target {
                Target::Physical => peer.physical,
                Target::Client(pattern) if pattern.contains(':') => peer.name.contains(pattern),
                Target::Client(name) => peer.name.starts_with(&format!("{name}:")),
            })
            .map(|peer| peer.name.clone())
            .collect()
    }

    fn connect(&self, mode: Mode, index: usize, peer: &str) -> Result<(), Error> {
        let own = self.connection.own_port(mode, index)?;
        let mut state = self.connection.server.lock().unwrap();
        if state.fail_connect_at == Some(index) {
            return Err(Error::Runtime(format!("cannot connect {own}")));
        }
        let link = match mode {
            Mode::Input => (peer.to_string(), own),
            Mode::Output => (own, peer.to_string()),
        };
        state.links.push(link);
        Ok(())
    }

    fn disconnect(&self, mode: Mode, index: usize) -> Result<(), Error> {
        let own = self.connection.own_port(mode, index)?;
        let mut state = self.connection.server.lock().unwrap();
        if state.fail_disconnect.contains(&(mode, index)) {
            return Err(Error::Runtime(format!("cannot disconnect {own}")));
        }
        state.links.retain(|(a, b)| *a != own && *b != own);
        Ok(())
    }
}

impl ActiveConnection for MockActive {
    fn deactivate(self) -> Result<(), Error> {
        self.stop();
        Ok(())
    }
}

pub fn buffers(storage: &mut [Vec<f32>]) -> Vec<NonNull<f32>> {
    storage
        .iter_mut()
        .map(|b| NonNull::new(b.as_mut_ptr()).expect("vec pointer"))
        .collect()
}

pub fn counts(inputs: usize, outputs: usize) -> PortCounts {
    PortCounts::new(inputs, outputs).expect("valid port counts")
}
