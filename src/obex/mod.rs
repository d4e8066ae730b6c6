//! OBEX / GOEP Collaborator Contract
//!
//! The phonebook client does not frame OBEX packets or run RFCOMM/L2CAP
//! itself. It drives an engine through [`ObexTransport`] and is fed the
//! engine's completions as [`ObexEvent`]s. This module defines that
//! contract together with the wire values the client must preserve.
//!
//! ## Flow
//!
//! 1. The client asks the engine to open a transport and later to send
//!    CONNECT, GET, SETPATH, ABORT or DISCONNECT with a header buffer
//! 2. The engine delivers each completion as an [`ObexEvent`]
//! 3. The client matches the event against the single outstanding
//!    operation of the session it belongs to

pub mod header;

pub use header::{Header, HeaderValue, PduBuffer, Tlv, TlvIter};

use crate::{BluetoothAddress, PbapError, pbap::SessionId};

/// OBEX response code with the final bit included
///
/// Wire values must be preserved bit-exact for interoperability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseCode {
    /// More data follows, send another request to retrieve it (0x90)
    Continue,
    /// OK / Success (0xA0)
    Success,
    /// Server could not understand the request (0xC0)
    BadRequest,
    /// Authentication required (0xC1)
    Unauthorized,
    /// Request understood but refused (0xC3)
    Forbidden,
    /// Object not found (0xC4)
    NotFound,
    /// Not acceptable (0xC6)
    NotAcceptable,
    /// Precondition failed (0xCC)
    PreconditionFailed,
    /// Not implemented (0xD1)
    NotImplemented,
    /// Service unavailable (0xD3)
    Unavailable,
    /// Any other response code, carried verbatim
    Other(u8),
}

impl ResponseCode {
    /// Alias of [`ResponseCode::Success`]
    pub const OK: Self = Self::Success;

    /// Check if the code is success-class
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Check if the code asks for a continuation request
    #[must_use]
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }
}

impl From<u8> for ResponseCode {
    fn from(code: u8) -> Self {
        match code {
            0x90 => Self::Continue,
            0xA0 => Self::Success,
            0xC0 => Self::BadRequest,
            0xC1 => Self::Unauthorized,
            0xC3 => Self::Forbidden,
            0xC4 => Self::NotFound,
            0xC6 => Self::NotAcceptable,
            0xCC => Self::PreconditionFailed,
            0xD1 => Self::NotImplemented,
            0xD3 => Self::Unavailable,
            other => Self::Other(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::Continue => 0x90,
            ResponseCode::Success => 0xA0,
            ResponseCode::BadRequest => 0xC0,
            ResponseCode::Unauthorized => 0xC1,
            ResponseCode::Forbidden => 0xC3,
            ResponseCode::NotFound => 0xC4,
            ResponseCode::NotAcceptable => 0xC6,
            ResponseCode::PreconditionFailed => 0xCC,
            ResponseCode::NotImplemented => 0xD1,
            ResponseCode::Unavailable => 0xD3,
            ResponseCode::Other(other) => other,
        }
    }
}

/// OBEX SETPATH flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetPathFlags(pub u8);

impl SetPathFlags {
    /// Back up one level before applying the name
    pub const BACKUP: u8 = 0x01;
    /// Do not create the folder if it does not exist
    pub const DONT_CREATE: u8 = 0x02;

    /// Go to the root folder (used with an empty Name header)
    pub const ROOT: Self = Self(Self::DONT_CREATE);
    /// Go up one level (no Name header)
    pub const PARENT: Self = Self(Self::BACKUP | Self::DONT_CREATE);
    /// Go down into the named child folder
    pub const CHILD: Self = Self(Self::DONT_CREATE);

    /// Raw flags byte
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Transport flavour of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportKind {
    /// OBEX over RFCOMM (GOEP 1.1), one GET per response packet
    Rfcomm,
    /// OBEX over L2CAP (GOEP 2.0) with Single Response Mode
    L2cap,
}

/// Where to reach the remote phonebook server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportChannel {
    /// RFCOMM server channel obtained through SDP
    Rfcomm(u8),
    /// L2CAP PSM obtained through SDP
    L2cap(u16),
}

impl TransportChannel {
    /// Get the transport flavour
    #[must_use]
    pub const fn kind(self) -> TransportKind {
        match self {
            Self::Rfcomm(_) => TransportKind::Rfcomm,
            Self::L2cap(_) => TransportKind::L2cap,
        }
    }
}

/// Request side of the OBEX engine
///
/// Every method only queues work and returns; completions come back as
/// [`ObexEvent`]s carrying the same [`SessionId`]. Header buffers are
/// moved in, the engine owns and releases them.
pub trait ObexTransport {
    /// Open the RFCOMM channel or L2CAP PSM toward `peer`
    ///
    /// # Errors
    /// Returns an error if the connection cannot be initiated
    fn connect_transport(
        &mut self,
        session: SessionId,
        peer: BluetoothAddress,
        channel: TransportChannel,
    ) -> Result<(), PbapError>;

    /// Close the transport without any OBEX exchange
    ///
    /// # Errors
    /// Returns an error if the transport cannot be closed
    fn disconnect_transport(&mut self, session: SessionId) -> Result<(), PbapError>;

    /// Send an OBEX CONNECT
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent
    fn connect(
        &mut self,
        session: SessionId,
        max_packet_len: u16,
        headers: PduBuffer,
    ) -> Result<(), PbapError>;

    /// Send an OBEX DISCONNECT
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent
    fn disconnect(&mut self, session: SessionId, headers: PduBuffer) -> Result<(), PbapError>;

    /// Send an OBEX GET
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent
    fn get(
        &mut self,
        session: SessionId,
        final_bit: bool,
        headers: PduBuffer,
    ) -> Result<(), PbapError>;

    /// Send an OBEX SETPATH
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent
    fn set_path(
        &mut self,
        session: SessionId,
        flags: SetPathFlags,
        headers: PduBuffer,
    ) -> Result<(), PbapError>;

    /// Send an OBEX ABORT
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent
    fn abort(&mut self, session: SessionId, headers: PduBuffer) -> Result<(), PbapError>;
}

/// Completion delivered by the OBEX engine
#[derive(Debug, Clone)]
pub enum ObexEvent {
    /// Transport channel is open
    TransportConnected {
        /// Session the transport belongs to
        session: SessionId,
    },
    /// Transport channel is closed, whichever side closed it
    TransportDisconnected {
        /// Session the transport belonged to
        session: SessionId,
    },
    /// CONNECT response
    Connect {
        /// Session the response belongs to
        session: SessionId,
        /// Response code
        code: ResponseCode,
        /// OBEX version of the server
        version: u8,
        /// Maximum packet length accepted by the server
        max_packet_len: u16,
        /// Response headers
        headers: PduBuffer,
    },
    /// DISCONNECT response
    Disconnect {
        /// Session the response belongs to
        session: SessionId,
        /// Response code
        code: ResponseCode,
        /// Response headers
        headers: PduBuffer,
    },
    /// GET response
    Get {
        /// Session the response belongs to
        session: SessionId,
        /// Response code
        code: ResponseCode,
        /// Response headers
        headers: PduBuffer,
    },
    /// SETPATH response
    SetPath {
        /// Session the response belongs to
        session: SessionId,
        /// Response code
        code: ResponseCode,
        /// Response headers
        headers: PduBuffer,
    },
    /// ABORT response
    Abort {
        /// Session the response belongs to
        session: SessionId,
        /// Response code
        code: ResponseCode,
        /// Response headers
        headers: PduBuffer,
    },
}

impl ObexEvent {
    /// Session the event belongs to
    #[must_use]
    pub const fn session(&self) -> SessionId {
        match self {
            Self::TransportConnected { session }
            | Self::TransportDisconnected { session }
            | Self::Connect { session, .. }
            | Self::Disconnect { session, .. }
            | Self::Get { session, .. }
            | Self::SetPath { session, .. }
            | Self::Abort { session, .. } => *session,
        }
    }
}
