//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! The APIs that talk to a controller return the higher level [`ProbeError`]
//! enum. The individual error types are convertible into it, allowing them to
//! be used with `?`:
//!
//! ```
//! use bedlevel::error::{ProbeError, TransportClosedError};
//!
//! fn foo() -> Result<(), TransportClosedError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), ProbeError> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! Only transport failures are errors. A probe that fails to converge, an
//! over-long line, or a read that times out are all absorbed by the
//! [`Prober`](crate::probe::Prober) and reported through logging or the
//! returned [`Measurement`](crate::probe::Measurement).

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Define an error enum that contains concrete error types (not other error enums).
///
/// The enum implements `From` for each underlying error, so they can be
/// propagated with `?`. Its Display implementation defers to the underlying
/// errors' Display implementations.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
    ) => {
        $(
            #[$attr]
        )*
        #[allow(missing_docs)]
        pub enum $name {
            $(
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    $(
                        $name::$variant(e) => Some(e)
                    ),+
                }
            }
        }

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => e.fmt(f)
                    ),+
                }
            }
        }

        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }
        )+
    };
}

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl_error_display! {
    SerialDeviceInUseOrDisconnectedError,
    self =>
    "the specified device is either disconnected or already in use by another process: {}", self.0
}

/// The transport returned a zero-length read or write.
///
/// The controller is assumed to be disconnected. Because the physical state of
/// the machine is then unknown, this is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportClosedError {
    /// The operation that failed.
    operation: &'static str,
}

impl TransportClosedError {
    /// Create an instance of the error for the named operation.
    pub(crate) fn new(operation: &'static str) -> Self {
        TransportClosedError { operation }
    }

    /// The operation that failed, either `"read"` or `"write"`.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl_error_display! {
    TransportClosedError,
    self =>
    "transport closed during {}: the controller appears to be disconnected", self.operation
}

error_enum! {
    /// Any error returned while talking to a motion controller.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum ProbeError {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        TransportClosed(TransportClosedError),
    }
}

impl ProbeError {
    /// A convenience function for determining if the error is due to the
    /// port timing out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }
}

impl From<serialport::Error> for ProbeError {
    fn from(other: serialport::Error) -> Self {
        use std::io;

        match other.kind() {
            serialport::ErrorKind::NoDevice => ProbeError::SerialDeviceInUseOrDisconnected(
                SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
            ),
            serialport::ErrorKind::InvalidInput => ProbeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                other.description,
            )),
            serialport::ErrorKind::Unknown => {
                ProbeError::Io(io::Error::new(io::ErrorKind::Other, other.description))
            }
            serialport::ErrorKind::Io(kind) => ProbeError::Io(io::Error::new(kind, other.description)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    #[test]
    fn transport_closed_names_operation() {
        let err = ProbeError::from(TransportClosedError::new("read"));
        assert!(err.to_string().contains("during read"), "{err}");
        assert!(matches!(err, ProbeError::TransportClosed(ref e) if e.operation() == "read"));
    }

    #[test]
    fn is_timeout() {
        let err = ProbeError::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_timeout());
        let err = ProbeError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(!err.is_timeout());
        assert!(!ProbeError::from(TransportClosedError::new("write")).is_timeout());
    }
}
