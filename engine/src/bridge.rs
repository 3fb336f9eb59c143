use crate::buffer::BufferViewCache;
use crate::error::Error;
use crate::port::{Mode, PortCounts};
use crate::runtime::{Attachment, Runtime};
use std::ptr::NonNull;
use std::sync::Arc;

/// Per-block entry point: refreshes buffer views and hands the block to the
/// managed processing callback.
pub struct Bridge<R: Runtime> {
    runtime: Arc<R>,
    inputs: BufferViewCache<R::View>,
    outputs: BufferViewCache<R::View>,
}

impl<R: Runtime> Bridge<R> {
    pub fn new(runtime: Arc<R>, ports: PortCounts) -> Self {
        Self {
            runtime,
            inputs: BufferViewCache::new(ports.inputs()),
            outputs: BufferViewCache::new(ports.outputs()),
        }
    }

    /// Runs one block of `frames` frames. Returns whether any buffer moved.
    ///
    /// Buffers beyond the registered port count are ignored.
    ///
    /// # Safety
    ///
    /// Every buffer must hold `frames` samples and stay valid until the engine
    /// hands out a different buffer for the same port.
    pub unsafe fn run_block<I, O>(&mut self, frames: usize, inputs: I, outputs: O) -> Result<bool, Error>
    where
        I: IntoIterator<Item = NonNull<f32>>,
        O: IntoIterator<Item = NonNull<f32>>,
    {
        let mut attachment = self.runtime.attach()?;
        let mut reallocated = unsafe {
            refresh_views(&mut attachment, &mut self.inputs, Mode::Input, frames, inputs)?
        };
        reallocated |= unsafe {
            refresh_views(&mut attachment, &mut self.outputs, Mode::Output, frames, outputs)?
        };
        attachment.process(reallocated)?;
        Ok(reallocated)
    }

    /// Drops every cached address; the next block rebuilds all views.
    pub fn invalidate(&mut self) {
        self.inputs.invalidate();
        self.outputs.invalidate();
    }
}

unsafe fn refresh_views<A, V, B>(
    attachment: &mut A,
    cache: &mut BufferViewCache<V>,
    mode: Mode,
    frames: usize,
    buffers: B,
) -> Result<bool, Error>
where
    A: Attachment<View = V>,
    B: IntoIterator<Item = NonNull<f32>>,
{
    let mut changed_any = false;
    for (index, buffer) in buffers.into_iter().take(cache.len()).enumerate() {
        let (view, changed) = cache.refresh(index, buffer, frames, |buffer, bytes| unsafe {
            attachment.create_view(buffer, bytes)
        })?;
        if changed {
            if let Err(e) = attachment.publish(mode, index, view) {
                // The managed array still holds the old view; republish next block.
                cache.forget(index);
                return Err(e);
            }
            changed_any = true;
        }
    }
    Ok(changed_any)
}
