//! Static driver registration table and loader shim.
//!
//! The host never loads code at runtime: the set of drivers is closed and
//! linked in, so "loading" a module means looking its name up in a fixed
//! table and handing back a small integer handle. Lookups fail closed for
//! any name that is not registered, and arbitrary symbol lookup is refused
//! outright.

use std::fmt;

use cryptoport::{DriverError, Reply};

/// A driver's control entry point.
pub type ControlFn = for<'a> fn(u32, &[u8], &'a mut [u8]) -> Result<Reply<'a>, DriverError>;

#[derive(Debug)]
pub struct DriverEntry {
    pub name: &'static str,
    pub control: ControlFn,
}

pub static CRYPTO_DRIVER: DriverEntry = DriverEntry {
    name: "crypto",
    control: cryptoport::control,
};

/// The registration table. Order is load order; every statically linked
/// driver appears here and nowhere else.
pub static DRIVER_TAB: &[&DriverEntry] = &[&CRYPTO_DRIVER];

pub fn lookup(name: &str) -> Option<&'static DriverEntry> {
    DRIVER_TAB.iter().copied().find(|entry| entry.name == name)
}

/// An opaque module handle, a 1-based index into [`DRIVER_TAB`].
///
/// Handles cross the host boundary as plain integers, hence the raw
/// conversions; zero is never a valid handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handle(u32);

impl Handle {
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Handle {
        Handle(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The name is not in the registration table; there is no dynamic
    /// loading to fall back to.
    NotRegistered(String),
    /// Arbitrary symbol lookup is not available in a statically linked host.
    NoSymbolLookup,
    /// The handle does not refer to a registered driver.
    StaleHandle(u32),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotRegistered(name) => {
                write!(f, "cannot load {name:?}: module is not statically registered")
            }
            LoadError::NoSymbolLookup => f.write_str("symbol lookup is not supported"),
            LoadError::StaleHandle(raw) => write!(f, "stale module handle {raw}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Fake a dynamic-load request: map a registered name to its handle.
pub fn open(name: &str) -> Result<Handle, LoadError> {
    eprintln!("cryptoport-registry: load attempt: {name}");
    let index = DRIVER_TAB
        .iter()
        .position(|entry| entry.name == name)
        .ok_or_else(|| LoadError::NotRegistered(name.to_string()))?;
    Ok(Handle(index as u32 + 1))
}

/// Always refused; the table only resolves whole drivers.
pub fn find_symbol(_handle: Handle, _symbol: &str) -> Result<ControlFn, LoadError> {
    Err(LoadError::NoSymbolLookup)
}

/// Resolve a handle back to its driver entry.
pub fn driver_init(handle: Handle) -> Result<&'static DriverEntry, LoadError> {
    let entry = handle
        .0
        .checked_sub(1)
        .and_then(|index| DRIVER_TAB.get(index as usize))
        .copied()
        .ok_or(LoadError::StaleHandle(handle.0))?;
    eprintln!("cryptoport-registry: loaded driver: {}", entry.name);
    Ok(entry)
}
