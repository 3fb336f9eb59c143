use crate::error::Error;
use once_cell::sync::OnceCell;
use tracing::error;

/// Process-wide, one-shot binding of managed entry points.
///
/// The first caller runs the resolver; concurrent callers block until it
/// finishes and then share its outcome. A failed resolution is kept too, so
/// the lookup is never repeated.
#[derive(Debug)]
pub struct EntryBinding<T> {
    cell: OnceCell<Result<T, Error>>,
}

impl<T> EntryBinding<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_bind<F>(&self, resolve: F) -> Result<&T, Error>
    where
        F: FnOnce() -> Result<T, String>,
    {
        let bound = self.cell.get_or_init(|| {
            resolve().map_err(|reason| {
                error!("cannot bind managed callbacks: {reason}");
                Error::CallbackBindingError(reason)
            })
        });
        bound.as_ref().map_err(Clone::clone)
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get().and_then(|bound| bound.as_ref().ok())
    }
}

impl<T> Default for EntryBinding<T> {
    fn default() -> Self {
        Self::new()
    }
}
