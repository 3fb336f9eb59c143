use crate::error::Error;
use crate::port::Mode;
use std::ptr::NonNull;

/// Outcome of a shutdown notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The managed owner was already collected; nothing was called.
    OwnerReleased,
}

/// The managed side of one client: its owner object, its two view
/// collections and the entry points invoked on it.
///
/// Shared between the engine thread (through [`Runtime::attach`]), the
/// shutdown thread and the control thread, so everything it holds must be
/// immutable after construction.
pub trait Runtime: Send + Sync + 'static {
    type View: Send + 'static;
    type Attachment<'a>: Attachment<View = Self::View>
    where
        Self: 'a;

    /// Attaches the calling thread, reusing an existing attachment if the
    /// thread already has one. The attachment outlives the returned handle.
    fn attach(&self) -> Result<Self::Attachment<'_>, Error>;

    /// Invokes the shutdown entry point from a transient attachment that is
    /// released again before returning.
    fn notify_shutdown(&self) -> Result<Delivery, Error>;
}

/// A thread's handle onto the managed runtime for the duration of one block.
pub trait Attachment {
    type View;

    /// Wraps `bytes` bytes at `buffer` in a zero-copy view.
    ///
    /// # Safety
    ///
    /// `buffer` must point to at least `bytes` writable bytes that stay valid
    /// until the next view is built for the same port.
    unsafe fn create_view(&mut self, buffer: NonNull<f32>, bytes: usize)
    -> Result<Self::View, Error>;

    /// Stores `view` at `index` of the `mode` view collection.
    fn publish(&mut self, mode: Mode, index: usize, view: &Self::View) -> Result<(), Error>;

    /// Calls the processing entry point with both view collections.
    fn process(&mut self, reallocated: bool) -> Result<(), Error>;
}
