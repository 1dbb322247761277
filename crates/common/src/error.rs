//! Common error types for the netvip crates.

use std::fmt;

/// A specialized Result type for netvip operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for netvip operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("netlink error: {0}")]
    Netlink(String),

    /// The kernel answered a netlink request with a nonzero error code.
    /// Carries the errno as a positive number.
    #[error("request rejected by kernel (errno {0})")]
    Rejected(i32),

    #[error("frame error: {0}")]
    Frame(String),

    #[error("interface error: {0}")]
    Interface(String),

    #[error("invalid address prefix: {0}")]
    Prefix(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new netlink error.
    pub fn netlink(msg: impl fmt::Display) -> Self {
        Error::Netlink(msg.to_string())
    }

    /// Create a new frame error.
    pub fn frame(msg: impl fmt::Display) -> Self {
        Error::Frame(msg.to_string())
    }

    /// Create a new interface error.
    pub fn interface(msg: impl fmt::Display) -> Self {
        Error::Interface(msg.to_string())
    }

    /// Create a new prefix error.
    pub fn prefix(msg: impl fmt::Display) -> Self {
        Error::Prefix(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// The kernel reported that the address is already present (EEXIST).
    pub fn is_exist(&self) -> bool {
        matches!(self, Error::Rejected(code) if *code == libc::EEXIST)
    }

    /// The kernel reported that the address is not present (EADDRNOTAVAIL).
    pub fn is_addr_not_avail(&self) -> bool {
        matches!(self, Error::Rejected(code) if *code == libc::EADDRNOTAVAIL)
    }
}
