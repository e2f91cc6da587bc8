//! Owning resource wrapper with an explicit release step.
//!
//! Every configuration object and backup object in this crate wraps its
//! state in a [`Handle`]: created by an explicit constructor, torn down by
//! an explicit `close()`/`destroy()` on the owner. There is no implicit
//! finalization beyond normal drop of the inner value; what the guard buys
//! is that use-after-release and double-release surface as
//! [`CofferError::Released`] instead of undefined behavior.

use crate::error::{CofferError, Result};

/// Exclusive ownership of one resource, guarded by a released flag.
pub struct Handle<T> {
    /// `None` once the handle has been released.
    inner: Option<T>,
    /// Resource name used in error messages ("options", "backup engine", ...).
    resource: &'static str,
}

impl<T> Handle<T> {
    /// Wrap a freshly acquired resource.
    pub fn new(resource: &'static str, value: T) -> Self {
        Self {
            inner: Some(value),
            resource,
        }
    }

    /// Borrow the resource, failing if it was already released.
    pub fn get(&self) -> Result<&T> {
        self.inner
            .as_ref()
            .ok_or(CofferError::Released(self.resource))
    }

    /// Mutably borrow the resource, failing if it was already released.
    pub fn get_mut(&mut self) -> Result<&mut T> {
        self.inner
            .as_mut()
            .ok_or(CofferError::Released(self.resource))
    }

    /// Take the resource out, marking the handle released.
    /// A second release is a caller error and fails.
    pub fn release(&mut self) -> Result<T> {
        self.inner.take().ok_or(CofferError::Released(self.resource))
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}
