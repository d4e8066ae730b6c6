//! PBAP Session State
//!
//! One [`Session`] exists per (peer, server instance) pair. It records the
//! single operation outstanding on the OBEX session as a [`SessionState`],
//! the server-assigned connection id, and the authentication material of
//! the connect handshake.
//!
//! ## States
//!
//! ```text
//! Disconnected -> Connecting -> Idle <-> Pull { kind, phase }
//!                                    <-> SetPath
//!                               Idle  -> Abort -> (teardown)
//!                               Idle  -> Disconnecting -> Disconnected
//! ```

use crate::{
    BluetoothAddress, PbapError,
    constants::{
        DEFAULT_MAX_PACKET_LENGTH, PASSWORD_MAX_LENGTH, PHONEBOOK_TYPE, USER_ID_MAX_LENGTH,
        VCARD_ENTRY_TYPE, VCARD_LISTING_TYPE,
    },
    obex::{ResponseCode, SetPathFlags, TransportKind},
    pbap::auth::AuthChallenge,
};
use core::fmt;
use heapless::Vec;

/// Object family of a pull sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PullKind {
    /// Whole phonebook object
    Phonebook,
    /// vCard listing of a folder
    VcardListing,
    /// Single vCard
    VcardEntry,
}

impl PullKind {
    /// OBEX Type header value of the first request
    #[must_use]
    pub const fn object_type(self) -> &'static str {
        match self {
            Self::Phonebook => PHONEBOOK_TYPE,
            Self::VcardListing => VCARD_LISTING_TYPE,
            Self::VcardEntry => VCARD_ENTRY_TYPE,
        }
    }
}

/// Progress of a pull sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PullPhase {
    /// A GET is outstanding
    Requested,
    /// The server is waiting for the application to request the next part
    Held,
}

/// Operation outstanding on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No OBEX session
    #[default]
    Disconnected,
    /// Transport or OBEX CONNECT in progress
    Connecting,
    /// Connected with nothing outstanding
    Idle,
    /// Pull sequence in progress
    Pull {
        /// Object family
        kind: PullKind,
        /// Sequence progress
        phase: PullPhase,
    },
    /// SETPATH outstanding
    SetPath,
    /// ABORT outstanding
    Abort,
    /// DISCONNECT outstanding or transport teardown requested
    Disconnecting,
}

impl SessionState {
    /// Check if an OBEX session is established
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Connecting)
    }

    /// Check if the session accepts a new operation
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Error returned to an operation that needs [`SessionState::Idle`]
    ///
    /// # Errors
    /// Returns `PbapError::NotConnected` before the OBEX session exists,
    /// `PbapError::InProgress` while another operation is outstanding
    pub const fn ensure_idle(self) -> Result<(), PbapError> {
        match self {
            Self::Idle => Ok(()),
            Self::Disconnected | Self::Connecting => Err(PbapError::NotConnected),
            _ => Err(PbapError::InProgress),
        }
    }
}

/// Folder change requested through SETPATH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPathTarget<'a> {
    /// `/`: back to the root folder
    Root,
    /// `..`: up one level
    Parent,
    /// `./name`: down into a child folder
    Child(&'a str),
}

impl<'a> SetPathTarget<'a> {
    /// Parse a path of the form `/`, `..` or `./name`
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` for any other form, including
    /// an empty child name or a child name containing `/`
    pub fn parse(path: &'a str) -> Result<Self, PbapError> {
        match path {
            "/" => Ok(Self::Root),
            ".." => Ok(Self::Parent),
            _ => match path.strip_prefix("./") {
                Some(child) if !child.is_empty() && !child.contains('/') => Ok(Self::Child(child)),
                _ => Err(PbapError::InvalidArgument),
            },
        }
    }

    /// SETPATH flags byte
    #[must_use]
    pub const fn flags(self) -> SetPathFlags {
        match self {
            Self::Root => SetPathFlags::ROOT,
            Self::Parent => SetPathFlags::PARENT,
            Self::Child(_) => SetPathFlags::CHILD,
        }
    }

    /// Name header value, `None` when no Name header is sent
    #[must_use]
    pub const fn name(self) -> Option<&'a str> {
        match self {
            Self::Root => Some(""),
            Self::Parent => None,
            Self::Child(name) => Some(name),
        }
    }
}

/// Password and optional user id used for OBEX authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    password: Vec<u8, PASSWORD_MAX_LENGTH>,
    user_id: Option<Vec<u8, USER_ID_MAX_LENGTH>>,
}

impl Credential {
    /// Create a credential from a password of 1 to 50 bytes
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if the password is empty or too
    /// long
    pub fn new(password: &str) -> Result<Self, PbapError> {
        if password.is_empty() {
            return Err(PbapError::InvalidArgument);
        }
        let password =
            Vec::from_slice(password.as_bytes()).map_err(|()| PbapError::InvalidArgument)?;
        Ok(Self {
            password,
            user_id: None,
        })
    }

    /// Attach a user id of at most 20 bytes
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if the user id is too long
    pub fn with_user_id(mut self, user_id: &str) -> Result<Self, PbapError> {
        self.user_id =
            Some(Vec::from_slice(user_id.as_bytes()).map_err(|()| PbapError::InvalidArgument)?);
        Ok(self)
    }

    /// Password bytes
    #[must_use]
    pub fn password(&self) -> &[u8] {
        &self.password
    }

    /// User id bytes
    #[must_use]
    pub fn user_id(&self) -> Option<&[u8]> {
        self.user_id.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Per-connection settings supplied to `connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Server instance targeted on the peer
    pub instance_id: u8,
    /// Credential used to challenge the peer and to answer its challenge
    pub credential: Option<Credential>,
    /// Maximum OBEX packet length offered at connect time
    pub max_packet_len: u16,
    /// Local PBAP supported features
    pub local_features: u32,
    /// Supported features the peer advertised through SDP
    pub peer_features: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instance_id: 0,
            credential: None,
            max_packet_len: DEFAULT_MAX_PACKET_LENGTH,
            local_features: 0,
            peer_features: None,
        }
    }
}

impl SessionConfig {
    /// Default settings for server instance `instance_id`
    #[must_use]
    pub fn new(instance_id: u8) -> Self {
        Self {
            instance_id,
            ..Self::default()
        }
    }

    /// Use `credential` for authentication
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// Connection state of one (peer, instance) pair
#[derive(Debug, Clone)]
pub struct Session {
    peer: BluetoothAddress,
    transport: TransportKind,
    pub(crate) config: SessionConfig,
    pub(crate) state: SessionState,
    pub(crate) connection_id: Option<u32>,
    pub(crate) local_challenge: Option<AuthChallenge>,
    pub(crate) local_auth: bool,
    pub(crate) peer_auth: bool,
    pub(crate) srm_wait: bool,
    pub(crate) peer_max_packet_len: u16,
    pub(crate) close_reason: Option<ResponseCode>,
}

impl Session {
    /// Create a session in [`SessionState::Disconnected`]
    #[must_use]
    pub fn new(peer: BluetoothAddress, transport: TransportKind, config: SessionConfig) -> Self {
        Self {
            peer,
            transport,
            config,
            state: SessionState::Disconnected,
            connection_id: None,
            local_challenge: None,
            local_auth: false,
            peer_auth: false,
            srm_wait: false,
            peer_max_packet_len: 0,
            close_reason: None,
        }
    }

    /// Peer address
    #[must_use]
    pub const fn peer(&self) -> BluetoothAddress {
        self.peer
    }

    /// Server instance targeted on the peer
    #[must_use]
    pub const fn instance_id(&self) -> u8 {
        self.config.instance_id
    }

    /// Transport flavour
    #[must_use]
    pub const fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Connection id assigned by the server
    #[must_use]
    pub const fn connection_id(&self) -> Option<u32> {
        self.connection_id
    }

    /// Maximum packet length accepted by the server
    #[must_use]
    pub const fn peer_max_packet_len(&self) -> u16 {
        self.peer_max_packet_len
    }

    /// Check if the session belongs to `peer` and `instance_id`
    #[must_use]
    pub fn matches(&self, peer: BluetoothAddress, instance_id: u8) -> bool {
        self.peer == peer && self.config.instance_id == instance_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_path_parsing() {
        let root = SetPathTarget::parse("/").unwrap();
        assert_eq!(root, SetPathTarget::Root);
        assert_eq!(root.flags().bits(), 0x02);
        assert_eq!(root.name(), Some(""));

        let parent = SetPathTarget::parse("..").unwrap();
        assert_eq!(parent.flags().bits(), 0x03);
        assert_eq!(parent.name(), None);

        let child = SetPathTarget::parse("./Inbox").unwrap();
        assert_eq!(child, SetPathTarget::Child("Inbox"));
        assert_eq!(child.flags().bits(), 0x02);
        assert_eq!(child.name(), Some("Inbox"));
    }

    #[test]
    fn test_set_path_rejects_other_forms() {
        for path in ["Inbox", "", ".", "./", "../telecom", "./a/b", "//", "/telecom"] {
            assert_eq!(
                SetPathTarget::parse(path),
                Err(PbapError::InvalidArgument),
                "{path}"
            );
        }
    }

    #[test]
    fn test_credential_limits() {
        assert_eq!(Credential::new(""), Err(PbapError::InvalidArgument));
        assert!(Credential::new("x").is_ok());

        let raw = [b'p'; PASSWORD_MAX_LENGTH + 1];
        let longest = core::str::from_utf8(&raw[..PASSWORD_MAX_LENGTH]).unwrap();
        assert!(Credential::new(longest).is_ok());
        let too_long = core::str::from_utf8(&raw).unwrap();
        assert_eq!(Credential::new(too_long), Err(PbapError::InvalidArgument));

        let credential = Credential::new("0000").unwrap().with_user_id("pce").unwrap();
        assert_eq!(credential.password(), b"0000");
        assert_eq!(credential.user_id(), Some(&b"pce"[..]));
        assert!(
            Credential::new("0000")
                .unwrap()
                .with_user_id("a-very-long-user-id-value")
                .is_err()
        );
    }

    #[test]
    fn test_state_guards() {
        assert_eq!(
            SessionState::Disconnected.ensure_idle(),
            Err(PbapError::NotConnected)
        );
        assert_eq!(
            SessionState::Connecting.ensure_idle(),
            Err(PbapError::NotConnected)
        );
        assert_eq!(SessionState::Idle.ensure_idle(), Ok(()));
        assert_eq!(SessionState::SetPath.ensure_idle(), Err(PbapError::InProgress));
        assert_eq!(SessionState::Abort.ensure_idle(), Err(PbapError::InProgress));
        assert_eq!(
            SessionState::Pull {
                kind: PullKind::Phonebook,
                phase: PullPhase::Held,
            }
            .ensure_idle(),
            Err(PbapError::InProgress)
        );
        assert!(SessionState::Disconnecting.is_connected());
        assert!(!SessionState::Connecting.is_connected());
    }

    #[test]
    fn test_pull_kind_types() {
        assert_eq!(PullKind::Phonebook.object_type(), "x-bt/phonebook");
        assert_eq!(PullKind::VcardListing.object_type(), "x-bt/vcard-listing");
        assert_eq!(PullKind::VcardEntry.object_type(), "x-bt/vcard");
    }

    #[test]
    fn test_new_session_defaults() {
        let peer = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);
        let session = Session::new(peer, TransportKind::Rfcomm, SessionConfig::new(2));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.connection_id(), None);
        assert_eq!(session.instance_id(), 2);
        assert!(session.matches(peer, 2));
        assert!(!session.matches(peer, 0));
        assert_eq!(session.config.max_packet_len, 0xFFFF);
    }
}
