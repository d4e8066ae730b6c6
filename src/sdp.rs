//! SDP Service Record
//!
//! Service record the PCE publishes so phonebook servers can identify it.
//! The record is static; this module only encodes it as SDP data elements
//! for the application's SDP server.
//!
//! ## Record
//!
//! - `0x0001` ServiceClassIDList: PBAP PCE (`0x112E`)
//! - `0x0009` BluetoothProfileDescriptorList: PBAP (`0x1130`) version 1.2
//! - `0x0100` ServiceName: "Phonebook Access PCE"

use crate::PbapError;
use heapless::Vec;

/// Service Class ID List
pub const SERVICE_CLASS_ID_LIST: u16 = 0x0001;
/// Bluetooth Profile Descriptor List
pub const PROFILE_DESCRIPTOR_LIST: u16 = 0x0009;
/// Service Name (primary language)
pub const SERVICE_NAME: u16 = 0x0100;

/// PBAP client service class
pub const PBAP_PCE_UUID: u16 = 0x112E;
/// Phonebook Access profile
pub const PBAP_PROFILE_UUID: u16 = 0x1130;
/// Profile version 1.2
pub const PBAP_VERSION: u16 = 0x0102;
/// Advertised service name
pub const PCE_SERVICE_NAME: &str = "Phonebook Access PCE";

/// Encoded record capacity
pub const RECORD_CAPACITY: usize = 64;

/// Data element type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataElementType {
    /// Unsigned integer
    UnsignedInt = 1,
    /// UUID
    Uuid = 3,
    /// Text string
    TextString = 4,
    /// Data element sequence
    Sequence = 6,
}

/// SDP data element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataElement<'a> {
    /// Unsigned 16-bit integer
    UnsignedInt16(u16),
    /// 16-bit UUID
    Uuid16(u16),
    /// Text string (UTF-8)
    TextString(&'a str),
    /// Data element sequence
    Sequence(&'a [DataElement<'a>]),
}

impl DataElement<'_> {
    /// Get the data element type
    #[must_use]
    pub const fn data_type(&self) -> DataElementType {
        match self {
            Self::UnsignedInt16(_) => DataElementType::UnsignedInt,
            Self::Uuid16(_) => DataElementType::Uuid,
            Self::TextString(_) => DataElementType::TextString,
            Self::Sequence(_) => DataElementType::Sequence,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            Self::UnsignedInt16(_) | Self::Uuid16(_) => 2,
            Self::TextString(text) => text.len(),
            Self::Sequence(items) => items.iter().map(Self::encoded_size).sum(),
        }
    }

    /// Get the encoded size of this data element
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        let payload = self.payload_size();
        1 + match self {
            Self::UnsignedInt16(_) | Self::Uuid16(_) => 0,
            Self::TextString(_) | Self::Sequence(_) => {
                if payload < 256 { 1 } else { 2 }
            }
        } + payload
    }

    /// Append the encoded element to `out`
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if it does not fit, or
    /// `PbapError::InvalidArgument` for elements longer than 65535 bytes
    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), PbapError> {
        let descriptor = (self.data_type() as u8) << 3;
        match self {
            // Size index 1: two bytes
            Self::UnsignedInt16(value) | Self::Uuid16(value) => {
                push(out, &[descriptor | 1])?;
                push(out, &value.to_be_bytes())
            }
            Self::TextString(text) => {
                put_length(out, descriptor, text.len())?;
                push(out, text.as_bytes())
            }
            Self::Sequence(items) => {
                put_length(out, descriptor, self.payload_size())?;
                items.iter().try_for_each(|item| item.encode(out))
            }
        }
    }
}

fn push<const N: usize>(out: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), PbapError> {
    out.extend_from_slice(bytes)
        .map_err(|()| PbapError::BufferFull)
}

/// Variable-length header: size index 5 (u8 length) or 6 (u16 length)
fn put_length<const N: usize>(
    out: &mut Vec<u8, N>,
    descriptor: u8,
    len: usize,
) -> Result<(), PbapError> {
    if let Ok(len) = u8::try_from(len) {
        push(out, &[descriptor | 5, len])
    } else {
        let len = u16::try_from(len).map_err(|_| PbapError::InvalidArgument)?;
        push(out, &[descriptor | 6])?;
        push(out, &len.to_be_bytes())
    }
}

/// Service record attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceAttribute<'a> {
    /// Attribute identifier
    pub id: u16,
    /// Attribute value
    pub value: DataElement<'a>,
}

const PCE_CLASSES: [DataElement<'static>; 1] = [DataElement::Uuid16(PBAP_PCE_UUID)];
const PBAP_PROFILE: [DataElement<'static>; 2] = [
    DataElement::Uuid16(PBAP_PROFILE_UUID),
    DataElement::UnsignedInt16(PBAP_VERSION),
];
const PCE_PROFILES: [DataElement<'static>; 1] = [DataElement::Sequence(&PBAP_PROFILE)];

/// Attributes of the PCE service record, in ascending id order
pub const PCE_ATTRIBUTES: [ServiceAttribute<'static>; 3] = [
    ServiceAttribute {
        id: SERVICE_CLASS_ID_LIST,
        value: DataElement::Sequence(&PCE_CLASSES),
    },
    ServiceAttribute {
        id: PROFILE_DESCRIPTOR_LIST,
        value: DataElement::Sequence(&PCE_PROFILES),
    },
    ServiceAttribute {
        id: SERVICE_NAME,
        value: DataElement::TextString(PCE_SERVICE_NAME),
    },
];

/// Encode `attributes` as an SDP attribute list
///
/// The list is a data element sequence of (attribute id, value) pairs.
///
/// # Errors
/// Returns `PbapError::BufferFull` if the list does not fit in `N` bytes
pub fn encode_attribute_list<const N: usize>(
    attributes: &[ServiceAttribute<'_>],
) -> Result<Vec<u8, N>, PbapError> {
    let body: usize = attributes
        .iter()
        .map(|attribute| {
            DataElement::UnsignedInt16(attribute.id).encoded_size()
                + attribute.value.encoded_size()
        })
        .sum();

    let mut out = Vec::new();
    put_length(&mut out, (DataElementType::Sequence as u8) << 3, body)?;
    for attribute in attributes {
        DataElement::UnsignedInt16(attribute.id).encode(&mut out)?;
        attribute.value.encode(&mut out)?;
    }
    Ok(out)
}

/// Encoded PCE service record, ready for registration with an SDP server
///
/// # Errors
/// Never fails with the built-in record; the `Result` mirrors
/// [`encode_attribute_list`]
pub fn pce_service_record() -> Result<Vec<u8, RECORD_CAPACITY>, PbapError> {
    encode_attribute_list(&PCE_ATTRIBUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(element: &DataElement<'_>) -> Vec<u8, 64> {
        let mut out = Vec::new();
        element.encode(&mut out).unwrap();
        out
    }

    #[test]
    fn test_attribute_values() {
        assert_eq!(
            encoded(&PCE_ATTRIBUTES[0].value).as_slice(),
            &[0x35, 0x03, 0x19, 0x11, 0x2E]
        );
        assert_eq!(
            encoded(&PCE_ATTRIBUTES[1].value).as_slice(),
            &[0x35, 0x08, 0x35, 0x06, 0x19, 0x11, 0x30, 0x09, 0x01, 0x02]
        );

        let name = encoded(&PCE_ATTRIBUTES[2].value);
        assert_eq!(&name[..2], &[0x25, 0x14]);
        assert_eq!(&name[2..], b"Phonebook Access PCE");
    }

    #[test]
    fn test_encoded_size_matches_encoding() {
        for attribute in &PCE_ATTRIBUTES {
            assert_eq!(
                attribute.value.encoded_size(),
                encoded(&attribute.value).len()
            );
        }
        assert_eq!(DataElement::Uuid16(0x112E).encoded_size(), 3);
    }

    #[test]
    fn test_pce_service_record() {
        let record = pce_service_record().unwrap();
        assert_eq!(&record[..2], &[0x35, 46]);
        assert_eq!(record.len(), 48);
        assert_eq!(&record[2..5], &[0x09, 0x00, 0x01]);
        assert_eq!(&record[10..13], &[0x09, 0x00, 0x09]);
        assert_eq!(&record[23..26], &[0x09, 0x01, 0x00]);
    }

    #[test]
    fn test_record_too_large_for_buffer() {
        assert_eq!(
            encode_attribute_list::<16>(&PCE_ATTRIBUTES),
            Err(PbapError::BufferFull)
        );
    }

    #[test]
    fn test_long_text_uses_u16_length() {
        let text = core::str::from_utf8(&[b'a'; 300]).unwrap();
        let mut out: Vec<u8, 512> = Vec::new();
        DataElement::TextString(text).encode(&mut out).unwrap();
        assert_eq!(&out[..3], &[0x26, 0x01, 0x2C]);
        assert_eq!(out.len(), 303);
    }
}
