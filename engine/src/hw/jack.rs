use crate::backend::{ActiveConnection, Backend, Connection, ServerInfo};
use crate::bridge::Bridge;
use crate::config;
use crate::error::Error;
use crate::port::{MAX_PORTS, Mode, port_name};
use crate::router::{PortGraph, Target};
use crate::runtime::Runtime;
use crate::shutdown::ShutdownNotifier;
use jack::{
    AudioIn, AudioOut, Client, ClientOptions, ClientStatus, Control, Frames, NotificationHandler,
    Port, PortFlags, ProcessHandler, ProcessScope, Unowned,
};
use std::ptr::NonNull;
use tracing::{error, warn};

pub const AUX_CLIENT_NAME: &str = "jack auxiliary client";
const AUDIO_TYPE_PATTERN: &str = "audio";

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Let `open` start a JACK server when none is running.
    pub start_server: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { start_server: true }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            start_server: !config::env_flag(config::NO_START_SERVER_ENV),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JackBackend {
    config: Config,
}

impl JackBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }
}

impl Backend for JackBackend {
    type Connection = JackConnection;

    fn open(&self, name: &str) -> Result<JackConnection, Error> {
        let options = if self.config.start_server {
            ClientOptions::empty()
        } else {
            ClientOptions::NO_START_SERVER
        };
        let (client, _status) = Client::new(name, options).map_err(|e| Error::EngineUnavailable {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(JackConnection {
            client,
            audio_in_ports: Vec::with_capacity(MAX_PORTS),
            audio_out_ports: Vec::with_capacity(MAX_PORTS),
        })
    }

    fn server_info(&self) -> Result<ServerInfo, Error> {
        let (client, _status) = Client::new(AUX_CLIENT_NAME, ClientOptions::NO_START_SERVER)
            .map_err(|e| Error::EngineUnavailable {
                name: AUX_CLIENT_NAME.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ServerInfo {
            sample_rate: client.sample_rate() as usize,
            buffer_size: client.buffer_size() as usize,
        })
    }
}

pub struct JackConnection {
    client: Client,
    audio_in_ports: Vec<Port<AudioIn>>,
    audio_out_ports: Vec<Port<AudioOut>>,
}

impl Connection for JackConnection {
    type Active<R: Runtime> = ActiveJack<R>;

    fn register_port(&mut self, mode: Mode, index: usize) -> Result<(), Error> {
        let name = port_name(mode, index);
        let failed = |e: jack::Error| Error::PortRegistrationFailed {
            mode,
            index,
            reason: e.to_string(),
        };
        match mode {
            Mode::Input => {
                let p = self
                    .client
                    .register_port(&name, AudioIn::default())
                    .map_err(failed)?;
                self.audio_in_ports.push(p);
            }
            Mode::Output => {
                let p = self
                    .client
                    .register_port(&name, AudioOut::default())
                    .map_err(failed)?;
                self.audio_out_ports.push(p);
            }
        }
        Ok(())
    }

    fn activate<R: Runtime>(
        self,
        bridge: Bridge<R>,
        notifier: ShutdownNotifier<R>,
    ) -> Result<ActiveJack<R>, Error> {
        let ports = [
            self.audio_in_ports.iter().map(Port::clone_unowned).collect(),
            self.audio_out_ports.iter().map(Port::clone_unowned).collect(),
        ];
        let process = Process {
            audio_in_ports: self.audio_in_ports,
            audio_out_ports: self.audio_out_ports,
            bridge,
        };
        let client = self
            .client
            .activate_async(Notifications { notifier }, process)
            .map_err(|e| Error::ActivationFailed(e.to_string()))?;
        Ok(ActiveJack {
            client: Some(client),
            ports,
        })
    }
}

struct Notifications<R: Runtime> {
    notifier: ShutdownNotifier<R>,
}

impl<R: Runtime> NotificationHandler for Notifications<R> {
    unsafe fn shutdown(&mut self, status: ClientStatus, reason: &str) {
        warn!("jack shut the client down ({status:?}): {reason}");
        self.notifier.notify();
    }
}

struct Process<R: Runtime> {
    audio_in_ports: Vec<Port<AudioIn>>,
    audio_out_ports: Vec<Port<AudioOut>>,
    bridge: Bridge<R>,
}

impl<R: Runtime> ProcessHandler for Process<R> {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let inputs = self
            .audio_in_ports
            .iter()
            .map(|port| NonNull::from(port.as_slice(ps)).cast::<f32>());
        let outputs = self
            .audio_out_ports
            .iter_mut()
            .map(|port| NonNull::from(port.as_mut_slice(ps)).cast::<f32>());
        // Port buffers stay valid until jack hands out new ones.
        match unsafe { self.bridge.run_block(ps.n_frames() as usize, inputs, outputs) } {
            Ok(_) => Control::Continue,
            Err(e) => {
                error!("FATAL: {e}");
                Control::Quit
            }
        }
    }

    fn buffer_size(&mut self, _client: &Client, _size: Frames) -> Control {
        self.bridge.invalidate();
        Control::Continue
    }
}

pub struct ActiveJack<R: Runtime> {
    client: Option<jack::AsyncClient<Notifications<R>, Process<R>>>,
    ports: [Vec<Port<Unowned>>; 2],
}

impl<R: Runtime> ActiveJack<R> {
    fn client(&self) -> Result<&Client, Error> {
        self.client
            .as_ref()
            .map(|c| c.as_client())
            .ok_or_else(|| Error::Runtime("client is not active".to_string()))
    }

    fn port(&self, mode: Mode, index: usize) -> Result<&Port<Unowned>, Error> {
        self.ports[mode.slot()]
            .get(index)
            .ok_or_else(|| Error::Runtime(format!("no {mode} port {}", index + 1)))
    }
}

impl<R: Runtime> PortGraph for ActiveJack<R> {
    fn candidates(&self, mode: Mode, target: Target<'_>) -> Vec<String> {
        let Ok(client) = self.client() else {
            return Vec::new();
        };
        let direction = match mode.complement() {
            Mode::Input => PortFlags::IS_INPUT,
            Mode::Output => PortFlags::IS_OUTPUT,
        };
        match target {
            Target::Physical => {
                client.ports(None, Some(AUDIO_TYPE_PATTERN), direction | PortFlags::IS_PHYSICAL)
            }
            Target::Client(name) => client.ports(
                Some(&client_port_pattern(name)),
                Some(AUDIO_TYPE_PATTERN),
                direction,
            ),
        }
    }

    fn connect(&self, mode: Mode, index: usize, peer: &str) -> Result<(), Error> {
        let client = self.client()?;
        let own = self
            .port(mode, index)?
            .name()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        let result = match mode {
            Mode::Input => client.connect_ports_by_name(peer, &own),
            Mode::Output => client.connect_ports_by_name(&own, peer),
        };
        result.map_err(|e| Error::Runtime(format!("{own} <-> {peer}: {e}")))
    }

    fn disconnect(&self, mode: Mode, index: usize) -> Result<(), Error> {
        let client = self.client()?;
        client
            .disconnect(self.port(mode, index)?)
            .map_err(|e| Error::Runtime(e.to_string()))
    }
}

impl<R: Runtime> ActiveConnection for ActiveJack<R> {
    fn deactivate(mut self) -> Result<(), Error> {
        match self.client.take() {
            Some(client) => client
                .deactivate()
                .map(|_| ())
                .map_err(|e| Error::Runtime(format!("cannot deactivate client: {e}"))),
            None => Ok(()),
        }
    }
}

impl<R: Runtime> Drop for ActiveJack<R> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.deactivate();
        }
    }
}

/// Port-name regex for a named connection target.
///
/// A bare client name selects exactly that client's ports. A target that
/// already names ports (`client:port`) is handed to jack as a regex unchanged.
pub fn client_port_pattern(name: &str) -> String {
    if name.contains(':') {
        return name.to_string();
    }
    let mut pattern = String::with_capacity(name.len() + 2);
    pattern.push('^');
    for c in name.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push(':');
    pattern
}
