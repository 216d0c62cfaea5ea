//! Unified error type for the water-pump firmware.
//!
//! A single `Error` enum that every subsystem converts into, kept to the
//! true I/O/init seams: parameter-store persistence, console transport,
//! peripheral init. The control loop itself (time base, tachometer,
//! motion controller, pump stage machine) never returns `Result` for
//! expected conditions — those are reified as state, not errors.

use core::fmt;

/// Every fallible operation outside the control loop funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Parameter-store read/write failed.
    Store(StoreError),
    /// Console transport failed.
    Console(ConsoleError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Console(e) => write!(f, "console: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter-store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// No stored blob found (first boot / erased flash).
    NotFound,
    /// Stored blob failed to decode.
    Corrupted,
    /// Address out of range for raw byte read/write.
    AddressOutOfRange,
    /// Underlying storage returned an I/O error.
    IoError,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Corrupted => write!(f, "corrupted"),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Console transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    /// The UART peripheral failed to configure at init.
    ConfigFailed,
    /// A byte write to the transport failed.
    WriteFailed,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigFailed => write!(f, "UART config failed"),
            Self::WriteFailed => write!(f, "write failed"),
        }
    }
}

impl From<ConsoleError> for Error {
    fn from(e: ConsoleError) -> Self {
        Self::Console(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
