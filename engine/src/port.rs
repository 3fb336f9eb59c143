use crate::error::Error;
use std::fmt;

/// Hard per-direction cap on registered ports.
pub const MAX_PORTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Input,
    Output,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Input, Mode::Output];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Input => "input",
            Mode::Output => "output",
        }
    }

    /// Direction of the ports this one can be connected to.
    pub fn complement(self) -> Mode {
        match self {
            Mode::Input => Mode::Output,
            Mode::Output => Mode::Input,
        }
    }

    pub fn slot(self) -> usize {
        match self {
            Mode::Input => 0,
            Mode::Output => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Short name registered with the engine, e.g. `input_1`.
pub fn port_name(mode: Mode, index: usize) -> String {
    format!("{}_{}", mode.label(), index + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortCounts {
    inputs: usize,
    outputs: usize,
}

impl PortCounts {
    pub fn new(inputs: usize, outputs: usize) -> Result<Self, Error> {
        for (mode, requested) in [(Mode::Input, inputs), (Mode::Output, outputs)] {
            if requested > MAX_PORTS {
                return Err(Error::PortRegistrationFailed {
                    mode,
                    index: MAX_PORTS,
                    reason: format!("{requested} ports requested, at most {MAX_PORTS} supported"),
                });
            }
        }
        Ok(Self { inputs, outputs })
    }

    /// Accepts the signed counts handed over by the managed side.
    pub fn from_signed(inputs: i32, outputs: i32) -> Result<Self, Error> {
        let checked = |mode: Mode, value: i32| {
            usize::try_from(value).map_err(|_| Error::PortRegistrationFailed {
                mode,
                index: 0,
                reason: format!("negative port count {value}"),
            })
        };
        Self::new(checked(Mode::Input, inputs)?, checked(Mode::Output, outputs)?)
    }

    pub fn get(&self, mode: Mode) -> usize {
        match mode {
            Mode::Input => self.inputs,
            Mode::Output => self.outputs,
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }
}
