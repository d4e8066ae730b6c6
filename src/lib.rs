#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

mod address;
pub mod constants;
pub mod obex;
pub mod pbap;
pub mod processor;
pub mod sdp;

#[cfg(test)]
mod testing;

pub use address::BluetoothAddress;
pub use obex::{ObexEvent, ObexTransport, PduBuffer, ResponseCode, TransportChannel};
pub use pbap::{Credential, PbapClient, PceHandler, SessionConfig, SessionId, SessionState};

/// Phonebook client errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PbapError {
    /// No application handler registered
    NotRegistered,
    /// An application handler is already registered
    AlreadyRegistered,
    /// Malformed name, path, password or parameter
    InvalidArgument,
    /// Session handle is stale or unknown
    InvalidSession,
    /// No OBEX session established
    NotConnected,
    /// A session already exists for the peer and instance
    AlreadyConnected,
    /// Another operation is outstanding on the session
    InProgress,
    /// Every session slot or queue entry is in use
    NoResources,
    /// Header buffer capacity exceeded
    BufferFull,
    /// Header or parameter could not be decoded
    MalformedHeader,
    /// OBEX authentication could not be completed
    AuthenticationFailed,
    /// OBEX engine or transport refused the request
    Transport,
}

impl core::fmt::Display for PbapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "PBAP client not registered"),
            Self::AlreadyRegistered => write!(f, "PBAP client already registered"),
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::InvalidSession => write!(f, "Invalid session handle"),
            Self::NotConnected => write!(f, "Session not connected"),
            Self::AlreadyConnected => write!(f, "Session already exists"),
            Self::InProgress => write!(f, "Operation in progress"),
            Self::NoResources => write!(f, "No free resources"),
            Self::BufferFull => write!(f, "Header buffer full"),
            Self::MalformedHeader => write!(f, "Malformed OBEX header"),
            Self::AuthenticationFailed => write!(f, "OBEX authentication failed"),
            Self::Transport => write!(f, "OBEX transport error"),
        }
    }
}

impl core::error::Error for PbapError {}
