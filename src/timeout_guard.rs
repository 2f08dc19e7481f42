//! A "scope guard" that will reset a port's timeout when it goes out of scope.

use crate::{backend::Backend, port::Port};
use std::{io, time::Duration};

/// A "scope guard" that will update the port's timeout and then reset it when
/// it goes out of scope.
///
/// To create a guard, use the port's [`timeout_guard`](Port::timeout_guard) method.
///
/// While the guard is in scope, the port can only be accessed through the guard.
/// However, because the guard implements [`Deref`](std::ops::Deref) and
/// [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the port.
pub struct TimeoutGuard<'i, 'p, B: Backend> {
    /// The underlying port.
    port: &'i mut Port<'p, B>,
    /// The original timeout that will be restored when the guard is dropped.
    original_timeout: Option<Duration>,
}

impl<'i, 'p, B: Backend> TimeoutGuard<'i, 'p, B> {
    /// Update the port's timeout and return a [`TimeoutGuard`] wrapping the port.
    pub(crate) fn new(port: &'i mut Port<'p, B>, timeout: Option<Duration>) -> Result<Self, io::Error> {
        let backend = port.backend_mut();
        let original_timeout = backend.read_timeout()?;
        backend.set_read_timeout(timeout)?;
        Ok(TimeoutGuard {
            port,
            original_timeout,
        })
    }
}

impl<B: Backend> std::fmt::Debug for TimeoutGuard<'_, '_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutGuard")
            .field("port", &self.port)
            .field("original_timeout", &self.original_timeout)
            .finish()
    }
}

impl<'p, B: Backend> std::ops::Deref for TimeoutGuard<'_, 'p, B> {
    type Target = Port<'p, B>;
    /// Get a shared reference to the underlying port.
    fn deref(&self) -> &Self::Target {
        self.port
    }
}

impl<B: Backend> std::ops::DerefMut for TimeoutGuard<'_, '_, B> {
    /// Get an exclusive reference to the underlying port.
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.port
    }
}

impl<B: Backend> std::ops::Drop for TimeoutGuard<'_, '_, B> {
    fn drop(&mut self) {
        if let Err(err) = self
            .port
            .backend_mut()
            .set_read_timeout(self.original_timeout)
        {
            self.port.poison(io::Error::new(
                io::ErrorKind::Other,
                if let Some(timeout) = self.original_timeout {
                    format!(
                        "failed to reset timeout to {} seconds: {}",
                        timeout.as_secs(),
                        err
                    )
                } else {
                    format!("failed to reset to an infinite timeout: {err}")
                },
            ));
        }
    }
}
