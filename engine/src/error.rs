use crate::port::Mode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("can't open client \"{name}\", jack server not running? ({reason})")]
    EngineUnavailable { name: String, reason: String },

    #[error("cannot register {mode} port {}: {reason}", index + 1)]
    PortRegistrationFailed {
        mode: Mode,
        index: usize,
        reason: String,
    },

    #[error("cannot activate client: {0}")]
    ActivationFailed(String),

    #[error("callback binding failed: {0}")]
    CallbackBindingError(String),

    #[error("cannot attach thread to the managed runtime: {0}")]
    AttachmentFailed(String),

    #[error("managed runtime call failed: {0}")]
    Runtime(String),
}
