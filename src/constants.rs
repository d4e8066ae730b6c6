//! `Pbapbird` Constants
//!
//! This module contains the limits, default values and PBAP/OBEX well-known
//! values used throughout the `Pbapbird` library.

/// Maximum number of simultaneous PBAP sessions (one per ACL link and instance)
pub const MAX_SESSIONS: usize = 4;

/// Maximum password length in bytes, without terminator
pub const PASSWORD_MAX_LENGTH: usize = 50;

/// Maximum OBEX user id length in bytes
pub const USER_ID_MAX_LENGTH: usize = 20;

/// Length of an OBEX authentication nonce and of a request digest
pub const AUTH_DIGEST_LENGTH: usize = 16;

/// Capacity of a single request/response header buffer
pub const PDU_CAPACITY: usize = 512;

/// Maximum object or folder name length in characters
pub const MAX_NAME_LENGTH: usize = 128;

/// UTF-8 bytes needed for a decoded name of `MAX_NAME_LENGTH` characters
pub const MAX_NAME_BYTES: usize = 4 * MAX_NAME_LENGTH;

/// Default maximum OBEX packet length offered at connect time
pub const DEFAULT_MAX_PACKET_LENGTH: u16 = 0xFFFF;

/// Depth of the OBEX event queue used by the processor
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// PBAP OBEX Target UUID `796135F0-F0C5-11D8-0966-0800200C9A66`
pub const PBAP_TARGET_UUID: [u8; 16] = [
    0x79, 0x61, 0x35, 0xF0, 0xF0, 0xC5, 0x11, 0xD8, 0x09, 0x66, 0x08, 0x00, 0x20, 0x0C, 0x9A, 0x66,
];

/// Object type of a phonebook pull
pub const PHONEBOOK_TYPE: &str = "x-bt/phonebook";

/// Object type of a vCard listing pull
pub const VCARD_LISTING_TYPE: &str = "x-bt/vcard-listing";

/// Object type of a single vCard pull
pub const VCARD_ENTRY_TYPE: &str = "x-bt/vcard";
