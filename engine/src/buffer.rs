use crate::port::MAX_PORTS;
use std::ptr::NonNull;

/// Bytes per sample in an engine buffer.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Debug)]
struct Slot<V> {
    address: usize,
    view: Option<V>,
}

/// Per-port cache of the last native buffer address and the view built over it.
///
/// Slots are allocated once and never grow. Only the engine thread touches the
/// cache, so there is no locking.
#[derive(Debug)]
pub struct BufferViewCache<V> {
    slots: Box<[Slot<V>]>,
}

impl<V> BufferViewCache<V> {
    pub fn new(ports: usize) -> Self {
        let ports = ports.min(MAX_PORTS);
        let slots = (0..ports)
            .map(|_| Slot {
                address: 0,
                view: None,
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn view(&self, index: usize) -> Option<&V> {
        self.slots.get(index).and_then(|slot| slot.view.as_ref())
    }

    /// Returns the view for `index` and whether it had to be rebuilt.
    ///
    /// `make` receives the buffer and its size in bytes and runs only when the
    /// address differs from the one seen on the previous call.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the port count the cache was built for.
    pub fn refresh<E, F>(
        &mut self,
        index: usize,
        buffer: NonNull<f32>,
        frames: usize,
        make: F,
    ) -> Result<(&V, bool), E>
    where
        F: FnOnce(NonNull<f32>, usize) -> Result<V, E>,
    {
        let slot = &mut self.slots[index];
        let address = buffer.as_ptr() as usize;
        let (view, changed) = match slot.view.take() {
            Some(view) if slot.address == address => (view, false),
            previous => match make(buffer, frames * SAMPLE_SIZE) {
                Ok(view) => (view, true),
                Err(e) => {
                    slot.view = previous;
                    return Err(e);
                }
            },
        };
        slot.address = address;
        Ok((slot.view.insert(view), changed))
    }

    /// Forgets the cached address of `index` so its next refresh rebuilds the
    /// view.
    pub fn forget(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.address = 0;
        }
    }

    /// Forgets every cached address so the next refresh rebuilds all views.
    pub fn invalidate(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.address = 0;
        }
    }
}
