//! OBEX Header Encoding and Decoding
//!
//! Requests and responses exchanged with the OBEX engine are header
//! sequences. Each header starts with a Header Identifier (HI) whose two top
//! bits select its encoding:
//!
//! - `0x00`: null-terminated UTF-16BE text, 2-byte length prefix
//! - `0x40`: byte sequence, 2-byte length prefix
//! - `0x80`: single byte
//! - `0xC0`: 4-byte big-endian integer
//!
//! Length prefixes count the HI and the prefix itself. Application
//! parameters and authentication headers carry tag/length/value triplets
//! ([`Tlv`]) inside a byte-sequence header.

use crate::{
    PbapError,
    constants::{MAX_NAME_BYTES, MAX_NAME_LENGTH, PDU_CAPACITY},
};
use heapless::{String, Vec};

/// Header identifiers used by the phonebook client
pub mod id {
    /// Name of the object or folder
    pub const NAME: u8 = 0x01;
    /// Object type (null-terminated ASCII)
    pub const TYPE: u8 = 0x42;
    /// Target service UUID
    pub const TARGET: u8 = 0x46;
    /// Chunk of the object body
    pub const BODY: u8 = 0x48;
    /// Final chunk of the object body
    pub const END_OF_BODY: u8 = 0x49;
    /// Service UUID echoed by the server
    pub const WHO: u8 = 0x4A;
    /// Application parameters
    pub const APP_PARAMS: u8 = 0x4C;
    /// Authentication challenge
    pub const AUTH_CHALLENGE: u8 = 0x4D;
    /// Authentication response
    pub const AUTH_RESPONSE: u8 = 0x4E;
    /// Connection identifier assigned by the server
    pub const CONNECTION_ID: u8 = 0xCB;
    /// Single Response Mode
    pub const SRM: u8 = 0x97;
    /// Single Response Mode parameters
    pub const SRM_PARAM: u8 = 0x98;
}

/// Header encodings selected by the top two bits of the identifier
pub mod encoding {
    /// Mask selecting the encoding bits
    pub const MASK: u8 = 0xC0;
    /// Null-terminated UTF-16BE text
    pub const UNICODE: u8 = 0x00;
    /// Byte sequence
    pub const BYTES: u8 = 0x40;
    /// Single byte
    pub const BYTE: u8 = 0x80;
    /// Four-byte integer
    pub const QUAD: u8 = 0xC0;
}

/// Tags inside an authentication challenge header
pub mod challenge_tag {
    /// 16-byte nonce
    pub const NONCE: u8 = 0x00;
    /// Options byte
    pub const OPTIONS: u8 = 0x01;
    /// Realm string
    pub const REALM: u8 = 0x02;
}

/// Tags inside an authentication response header
pub mod response_tag {
    /// 16-byte request digest
    pub const REQUEST_DIGEST: u8 = 0x00;
    /// User id
    pub const USER_ID: u8 = 0x01;
    /// Nonce the digest answers
    pub const NONCE: u8 = 0x02;
}

/// SRM header value enabling Single Response Mode
pub const SRM_ENABLE: u8 = 0x01;

/// SRMP header value asking the server to wait for the next request
pub const SRMP_WAIT: u8 = 0x01;

const PREFIXED_HEADER_OVERHEAD: usize = 3;

/// Tag/length/value triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Tag
    pub tag: u8,
    /// Value, at most 255 bytes
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Create a new triplet
    #[must_use]
    pub const fn new(tag: u8, value: &'a [u8]) -> Self {
        Self { tag, value }
    }

    fn encoded_len(&self) -> usize {
        2 + self.value.len()
    }
}

/// Iterator over the triplets of a TLV-carrying header
///
/// Iteration stops at the first truncated triplet.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    data: &'a [u8],
}

impl<'a> TlvIter<'a> {
    /// Iterate over raw triplet bytes
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Find the first triplet with `tag`
    #[must_use]
    pub fn find_tag(self, tag: u8) -> Option<&'a [u8]> {
        self.into_iter()
            .find(|tlv| tlv.tag == tag)
            .map(|tlv| tlv.value)
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Tlv<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        let (&tag, rest) = data.split_first()?;
        let (&len, rest) = rest.split_first()?;
        let Some(value) = rest.get(..usize::from(len)) else {
            self.data = &[];
            return None;
        };
        self.data = rest.get(usize::from(len)..).unwrap_or(&[]);
        Some(Tlv { tag, value })
    }
}

/// Decoded header value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderValue<'a> {
    /// UTF-16BE text, including its terminator
    Unicode(&'a [u8]),
    /// Byte sequence
    Bytes(&'a [u8]),
    /// Single byte
    Byte(u8),
    /// Four-byte integer
    Quad(u32),
}

/// Single decoded header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    /// Header identifier
    pub id: u8,
    /// Header value
    pub value: HeaderValue<'a>,
}

/// Iterator over the headers of a buffer
///
/// Yields `Err(PbapError::MalformedHeader)` once on truncated input and
/// then stops.
#[derive(Debug, Clone)]
pub struct HeaderIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for HeaderIter<'a> {
    type Item = Result<Header<'a>, PbapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        let (&hi, rest) = data.split_first()?;

        let parsed = match hi & encoding::MASK {
            encoding::BYTE => rest.first().map(|&value| (HeaderValue::Byte(value), 2)),
            encoding::QUAD => rest
                .get(..4)
                .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                .map(|bytes| (HeaderValue::Quad(u32::from_be_bytes(bytes)), 5)),
            prefixed => rest
                .get(..2)
                .map(|len| usize::from(u16::from_be_bytes([len[0], len[1]])))
                .filter(|&len| len >= PREFIXED_HEADER_OVERHEAD)
                .and_then(|len| {
                    let value = data.get(PREFIXED_HEADER_OVERHEAD..len)?;
                    if prefixed == encoding::UNICODE {
                        Some((HeaderValue::Unicode(value), len))
                    } else {
                        Some((HeaderValue::Bytes(value), len))
                    }
                }),
        };

        match parsed {
            Some((value, consumed)) => {
                self.data = data.get(consumed..).unwrap_or(&[]);
                Some(Ok(Header { id: hi, value }))
            }
            None => {
                self.data = &[];
                Some(Err(PbapError::MalformedHeader))
            }
        }
    }
}

/// Header buffer handed to or received from the OBEX engine
///
/// Owned by value: moving it into the engine hands it over, dropping it
/// releases it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PduBuffer {
    data: Vec<u8, PDU_CAPACITY>,
}

impl PduBuffer {
    /// Create an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a buffer holding already encoded headers
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if `bytes` exceeds the capacity
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PbapError> {
        let mut buffer = Self::new();
        buffer.put(bytes)?;
        Ok(buffer)
    }

    /// Encoded header bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of encoded bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no header has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Free space left in bytes
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.capacity() - self.data.len()
    }

    /// Drop every header
    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn ensure(&self, needed: usize) -> Result<(), PbapError> {
        if needed > self.remaining() {
            return Err(PbapError::BufferFull);
        }
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), PbapError> {
        self.data
            .extend_from_slice(bytes)
            .map_err(|()| PbapError::BufferFull)
    }

    fn put_prefix(&mut self, hi: u8, total: usize) -> Result<(), PbapError> {
        let total = u16::try_from(total).map_err(|_| PbapError::BufferFull)?;
        self.put(&[hi])?;
        self.put(&total.to_be_bytes())
    }

    /// Append the headers of another buffer
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if they do not fit
    pub fn append(&mut self, other: &PduBuffer) -> Result<(), PbapError> {
        self.ensure(other.len())?;
        self.put(other.as_bytes())
    }

    /// Add a single-byte header
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if `hi` is not a single-byte
    /// identifier, `PbapError::BufferFull` if it does not fit
    pub fn add_byte_header(&mut self, hi: u8, value: u8) -> Result<(), PbapError> {
        if hi & encoding::MASK != encoding::BYTE {
            return Err(PbapError::InvalidArgument);
        }
        self.ensure(2)?;
        self.put(&[hi, value])
    }

    /// Add a four-byte header
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if `hi` is not a four-byte
    /// identifier, `PbapError::BufferFull` if it does not fit
    pub fn add_quad_header(&mut self, hi: u8, value: u32) -> Result<(), PbapError> {
        if hi & encoding::MASK != encoding::QUAD {
            return Err(PbapError::InvalidArgument);
        }
        self.ensure(5)?;
        self.put(&[hi])?;
        self.put(&value.to_be_bytes())
    }

    /// Add a byte-sequence header
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if `hi` is not a byte-sequence
    /// identifier, `PbapError::BufferFull` if it does not fit
    pub fn add_bytes_header(&mut self, hi: u8, value: &[u8]) -> Result<(), PbapError> {
        if hi & encoding::MASK != encoding::BYTES {
            return Err(PbapError::InvalidArgument);
        }
        let total = PREFIXED_HEADER_OVERHEAD + value.len();
        self.ensure(total)?;
        self.put_prefix(hi, total)?;
        self.put(value)
    }

    fn add_tlv_header(&mut self, hi: u8, params: &[Tlv<'_>]) -> Result<(), PbapError> {
        if params.iter().any(|tlv| tlv.value.len() > usize::from(u8::MAX)) {
            return Err(PbapError::InvalidArgument);
        }
        let total = PREFIXED_HEADER_OVERHEAD + params.iter().map(Tlv::encoded_len).sum::<usize>();
        self.ensure(total)?;
        self.put_prefix(hi, total)?;
        for tlv in params {
            // Length checked above
            #[allow(clippy::cast_possible_truncation)]
            self.put(&[tlv.tag, tlv.value.len() as u8])?;
            self.put(tlv.value)?;
        }
        Ok(())
    }

    /// Add the Target header
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if it does not fit
    pub fn add_target(&mut self, target: &[u8]) -> Result<(), PbapError> {
        self.add_bytes_header(id::TARGET, target)
    }

    /// Add the Connection ID header
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if it does not fit
    pub fn add_connection_id(&mut self, connection_id: u32) -> Result<(), PbapError> {
        self.add_quad_header(id::CONNECTION_ID, connection_id)
    }

    /// Add the Type header as null-terminated ASCII
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` for non-ASCII types,
    /// `PbapError::BufferFull` if it does not fit
    pub fn add_type(&mut self, object_type: &str) -> Result<(), PbapError> {
        if !object_type.is_ascii() {
            return Err(PbapError::InvalidArgument);
        }
        let total = PREFIXED_HEADER_OVERHEAD + object_type.len() + 1;
        self.ensure(total)?;
        self.put_prefix(id::TYPE, total)?;
        self.put(object_type.as_bytes())?;
        self.put(&[0])
    }

    /// Add the Name header as null-terminated UTF-16BE
    ///
    /// An empty `name` produces an empty Name header, which addresses the
    /// current folder (GET) or the root folder (SETPATH).
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if the name is longer than
    /// `MAX_NAME_LENGTH` characters, `PbapError::BufferFull` if it does
    /// not fit
    pub fn add_name(&mut self, name: &str) -> Result<(), PbapError> {
        if name.is_empty() {
            self.ensure(PREFIXED_HEADER_OVERHEAD)?;
            return self.put_prefix(id::NAME, PREFIXED_HEADER_OVERHEAD);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(PbapError::InvalidArgument);
        }

        let units = name.encode_utf16().count() + 1;
        let total = PREFIXED_HEADER_OVERHEAD + units * 2;
        self.ensure(total)?;
        self.put_prefix(id::NAME, total)?;
        for unit in name.encode_utf16() {
            self.put(&unit.to_be_bytes())?;
        }
        self.put(&[0, 0])
    }

    /// Add the SRM header
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if it does not fit
    pub fn add_srm(&mut self, value: u8) -> Result<(), PbapError> {
        self.add_byte_header(id::SRM, value)
    }

    /// Add the SRMP header
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if it does not fit
    pub fn add_srm_param(&mut self, value: u8) -> Result<(), PbapError> {
        self.add_byte_header(id::SRM_PARAM, value)
    }

    /// Add the Application Parameters header
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if a value exceeds 255 bytes,
    /// `PbapError::BufferFull` if it does not fit
    pub fn add_app_params(&mut self, params: &[Tlv<'_>]) -> Result<(), PbapError> {
        self.add_tlv_header(id::APP_PARAMS, params)
    }

    /// Add the Authentication Challenge header
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if a value exceeds 255 bytes,
    /// `PbapError::BufferFull` if it does not fit
    pub fn add_auth_challenge(&mut self, params: &[Tlv<'_>]) -> Result<(), PbapError> {
        self.add_tlv_header(id::AUTH_CHALLENGE, params)
    }

    /// Add the Authentication Response header
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if a value exceeds 255 bytes,
    /// `PbapError::BufferFull` if it does not fit
    pub fn add_auth_response(&mut self, params: &[Tlv<'_>]) -> Result<(), PbapError> {
        self.add_tlv_header(id::AUTH_RESPONSE, params)
    }

    /// Add a Body header, or End-of-Body when `last` is set
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if it does not fit
    pub fn add_body(&mut self, data: &[u8], last: bool) -> Result<(), PbapError> {
        let hi = if last { id::END_OF_BODY } else { id::BODY };
        self.add_bytes_header(hi, data)
    }

    /// Iterate over the encoded headers
    #[must_use]
    pub fn headers(&self) -> HeaderIter<'_> {
        HeaderIter { data: &self.data }
    }

    /// Find the first well-formed header with identifier `hi`
    #[must_use]
    pub fn find(&self, hi: u8) -> Option<HeaderValue<'_>> {
        self.headers()
            .map_while(Result::ok)
            .find(|header| header.id == hi)
            .map(|header| header.value)
    }

    fn find_bytes(&self, hi: u8) -> Option<&[u8]> {
        match self.find(hi)? {
            HeaderValue::Bytes(bytes) | HeaderValue::Unicode(bytes) => Some(bytes),
            HeaderValue::Byte(_) | HeaderValue::Quad(_) => None,
        }
    }

    /// Connection ID header
    #[must_use]
    pub fn connection_id(&self) -> Option<u32> {
        match self.find(id::CONNECTION_ID)? {
            HeaderValue::Quad(value) => Some(value),
            _ => None,
        }
    }

    /// Type header without its terminator
    #[must_use]
    pub fn object_type(&self) -> Option<&[u8]> {
        self.find_bytes(id::TYPE)
            .map(|raw| raw.strip_suffix(&[0]).unwrap_or(raw))
    }

    /// Name header decoded from UTF-16BE
    ///
    /// Returns `None` if the header is absent or not valid UTF-16.
    #[must_use]
    pub fn name(&self) -> Option<String<MAX_NAME_BYTES>> {
        let raw = self.find_bytes(id::NAME)?;
        let units = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0);

        let mut name = String::new();
        for c in char::decode_utf16(units) {
            name.push(c.ok()?).ok()?;
        }
        Some(name)
    }

    /// Authentication Challenge triplets
    #[must_use]
    pub fn auth_challenge(&self) -> Option<TlvIter<'_>> {
        self.find_bytes(id::AUTH_CHALLENGE).map(TlvIter::new)
    }

    /// Authentication Response triplets
    #[must_use]
    pub fn auth_response(&self) -> Option<TlvIter<'_>> {
        self.find_bytes(id::AUTH_RESPONSE).map(TlvIter::new)
    }

    /// Application Parameters triplets
    #[must_use]
    pub fn app_params(&self) -> Option<TlvIter<'_>> {
        self.find_bytes(id::APP_PARAMS).map(TlvIter::new)
    }

    /// Body header
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.find_bytes(id::BODY)
    }

    /// End-of-Body header
    #[must_use]
    pub fn end_of_body(&self) -> Option<&[u8]> {
        self.find_bytes(id::END_OF_BODY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_encoding() {
        let mut buf = PduBuffer::new();
        buf.add_connection_id(0x0102_0304).unwrap();
        assert_eq!(buf.as_bytes(), &[0xCB, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(buf.connection_id(), Some(0x0102_0304));
    }

    #[test]
    fn test_type_is_null_terminated() {
        let mut buf = PduBuffer::new();
        buf.add_type("x-bt/vcard").unwrap();
        assert_eq!(buf.as_bytes()[..3], [0x42, 0x00, 14]);
        assert_eq!(buf.as_bytes().last(), Some(&0));
        assert_eq!(buf.object_type(), Some(&b"x-bt/vcard"[..]));
    }

    #[test]
    fn test_name_is_utf16_be() {
        let mut buf = PduBuffer::new();
        buf.add_name("pb").unwrap();
        assert_eq!(
            buf.as_bytes(),
            &[0x01, 0x00, 0x09, 0x00, b'p', 0x00, b'b', 0x00, 0x00]
        );
        assert_eq!(buf.name().unwrap().as_str(), "pb");
    }

    #[test]
    fn test_non_ascii_name_at_length_limit() {
        let mut long: String<{ 2 * MAX_NAME_LENGTH }> = String::new();
        for _ in 0..MAX_NAME_LENGTH {
            long.push('é').unwrap();
        }
        let mut buf = PduBuffer::new();
        buf.add_name(&long).unwrap();
        assert_eq!(buf.name().unwrap().as_str(), long.as_str());

        let mut short = PduBuffer::new();
        short.add_name("Müller 電話").unwrap();
        assert_eq!(short.name().unwrap().as_str(), "Müller 電話");
    }

    #[test]
    fn test_empty_name_header() {
        let mut buf = PduBuffer::new();
        buf.add_name("").unwrap();
        assert_eq!(buf.as_bytes(), &[0x01, 0x00, 0x03]);
        assert_eq!(buf.name().unwrap().as_str(), "");
    }

    #[test]
    fn test_tlv_header_round_trip() {
        let mut buf = PduBuffer::new();
        buf.add_app_params(&[Tlv::new(0x04, &[0x00, 0x0A]), Tlv::new(0x07, &[0x01])])
            .unwrap();
        assert_eq!(
            buf.as_bytes(),
            &[0x4C, 0x00, 0x0A, 0x04, 0x02, 0x00, 0x0A, 0x07, 0x01, 0x01]
        );

        let params: Vec<Tlv<'_>, 4> = buf.app_params().unwrap().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], Tlv::new(0x04, &[0x00, 0x0A]));
        assert_eq!(buf.app_params().unwrap().find_tag(0x07), Some(&[0x01][..]));
        assert_eq!(buf.app_params().unwrap().find_tag(0x09), None);
    }

    #[test]
    fn test_header_iteration() {
        let mut buf = PduBuffer::new();
        buf.add_connection_id(1).unwrap();
        buf.add_srm(SRM_ENABLE).unwrap();
        buf.add_body(b"BEGIN:VCARD", false).unwrap();
        buf.add_body(b"END:VCARD", true).unwrap();

        let ids: Vec<u8, 8> = buf.headers().map(|h| h.unwrap().id).collect();
        assert_eq!(ids.as_slice(), &[id::CONNECTION_ID, id::SRM, id::BODY, id::END_OF_BODY]);
        assert_eq!(buf.find(id::SRM), Some(HeaderValue::Byte(SRM_ENABLE)));
        assert_eq!(buf.body(), Some(&b"BEGIN:VCARD"[..]));
        assert_eq!(buf.end_of_body(), Some(&b"END:VCARD"[..]));
    }

    #[test]
    fn test_truncated_header_is_reported() {
        let buf = PduBuffer::from_bytes(&[0xCB, 0x00, 0x01, 0x48, 0x00, 0x10, 0xAA]).unwrap();
        let mut headers = buf.headers();
        assert!(headers.next().unwrap().is_ok());
        assert_eq!(headers.next(), Some(Err(PbapError::MalformedHeader)));
        assert_eq!(headers.next(), None);
        assert_eq!(buf.body(), None);

        let short_prefix = PduBuffer::from_bytes(&[0x48, 0x00, 0x02]).unwrap();
        assert_eq!(
            short_prefix.headers().next(),
            Some(Err(PbapError::MalformedHeader))
        );
    }

    #[test]
    fn test_truncated_tlv_stops_iteration() {
        let mut iter = TlvIter::new(&[0x00, 0x02, 0xAA, 0xBB, 0x01, 0x05, 0xCC]);
        assert_eq!(iter.next(), Some(Tlv::new(0x00, &[0xAA, 0xBB])));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_wrong_encoding_is_rejected() {
        let mut buf = PduBuffer::new();
        assert_eq!(
            buf.add_byte_header(id::CONNECTION_ID, 1),
            Err(PbapError::InvalidArgument)
        );
        assert_eq!(
            buf.add_quad_header(id::SRM, 1),
            Err(PbapError::InvalidArgument)
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_buffer_full_leaves_buffer_untouched() {
        let mut buf = PduBuffer::new();
        let filler = [0u8; PDU_CAPACITY - 10];
        buf.add_body(&filler, false).unwrap();
        let before = buf.len();

        assert_eq!(buf.add_name("phonebook"), Err(PbapError::BufferFull));
        assert_eq!(buf.add_target(&[0u8; 16]), Err(PbapError::BufferFull));
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn test_oversized_tlv_value_is_rejected() {
        let mut buf = PduBuffer::new();
        let big = [0u8; 256];
        assert_eq!(
            buf.add_app_params(&[Tlv::new(0x02, &big)]),
            Err(PbapError::InvalidArgument)
        );
    }
}
