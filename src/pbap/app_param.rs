//! PBAP Application Parameters
//!
//! Pull requests refine what the server returns (ordering, paging,
//! filters) through tag/length/value triplets carried in the OBEX
//! Application Parameters header. Responses use the same header to report
//! phonebook size, missed calls and folder versions.
//!
//! ## Usage
//!
//! ```rust
//! use pbapbird::obex::PduBuffer;
//! use pbapbird::pbap::app_param::AppParams;
//!
//! let mut params = AppParams::new();
//! params.add_max_list_count(50).unwrap();
//! params.add_list_start_offset(0).unwrap();
//!
//! let mut request = PduBuffer::new();
//! params.write_to(&mut request).unwrap();
//! ```

use crate::{
    PbapError,
    obex::{PduBuffer, header::id},
};
use heapless::Vec;

/// Capacity of an encoded parameter set
pub const APP_PARAMS_CAPACITY: usize = 128;

/// Application parameter tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AppParamTag {
    /// Listing order, 1 byte
    Order = 0x01,
    /// Search text, variable
    SearchValue = 0x02,
    /// Property the search applies to, 1 byte
    SearchProperty = 0x03,
    /// Maximum number of entries, 2 bytes
    MaxListCount = 0x04,
    /// Offset of the first entry, 2 bytes
    ListStartOffset = 0x05,
    /// vCard property filter, 8 bytes
    PropertySelector = 0x06,
    /// vCard format, 1 byte
    Format = 0x07,
    /// Number of entries in the phonebook, 2 bytes
    PhonebookSize = 0x08,
    /// Number of missed calls not yet checked, 1 byte
    NewMissedCalls = 0x09,
    /// Primary folder version counter, 16 bytes
    PrimaryFolderVersion = 0x0A,
    /// Secondary folder version counter, 16 bytes
    SecondaryFolderVersion = 0x0B,
    /// vCard selection filter, 8 bytes
    VcardSelector = 0x0C,
    /// Database identifier, 16 bytes
    DatabaseIdentifier = 0x0D,
    /// How selector bits combine, 1 byte
    VcardSelectorOperator = 0x0E,
    /// Reset the new missed calls counter, 1 byte
    ResetNewMissedCalls = 0x0F,
    /// PBAP supported features, 4 bytes
    SupportedFeatures = 0x10,
}

impl AppParamTag {
    /// Required value length, `None` for variable-length parameters
    #[must_use]
    pub const fn fixed_len(self) -> Option<usize> {
        match self {
            Self::SearchValue => None,
            Self::Order
            | Self::SearchProperty
            | Self::Format
            | Self::NewMissedCalls
            | Self::VcardSelectorOperator
            | Self::ResetNewMissedCalls => Some(1),
            Self::MaxListCount | Self::ListStartOffset | Self::PhonebookSize => Some(2),
            Self::SupportedFeatures => Some(4),
            Self::PropertySelector | Self::VcardSelector => Some(8),
            Self::PrimaryFolderVersion
            | Self::SecondaryFolderVersion
            | Self::DatabaseIdentifier => Some(16),
        }
    }
}

impl TryFrom<u8> for AppParamTag {
    type Error = PbapError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Self::Order,
            0x02 => Self::SearchValue,
            0x03 => Self::SearchProperty,
            0x04 => Self::MaxListCount,
            0x05 => Self::ListStartOffset,
            0x06 => Self::PropertySelector,
            0x07 => Self::Format,
            0x08 => Self::PhonebookSize,
            0x09 => Self::NewMissedCalls,
            0x0A => Self::PrimaryFolderVersion,
            0x0B => Self::SecondaryFolderVersion,
            0x0C => Self::VcardSelector,
            0x0D => Self::DatabaseIdentifier,
            0x0E => Self::VcardSelectorOperator,
            0x0F => Self::ResetNewMissedCalls,
            0x10 => Self::SupportedFeatures,
            _ => return Err(PbapError::InvalidArgument),
        })
    }
}

/// PBAP supported feature bits
pub mod feature {
    /// Download
    pub const DOWNLOAD: u32 = 1 << 0;
    /// Browsing
    pub const BROWSING: u32 = 1 << 1;
    /// Database identifier
    pub const DATABASE_IDENTIFIER: u32 = 1 << 2;
    /// Folder version counters
    pub const FOLDER_VERSION_COUNTERS: u32 = 1 << 3;
    /// vCard selecting
    pub const VCARD_SELECTING: u32 = 1 << 4;
    /// Enhanced missed calls
    pub const ENHANCED_MISSED_CALLS: u32 = 1 << 5;
    /// X-BT-UCI vCard property
    pub const X_BT_UCI: u32 = 1 << 6;
    /// X-BT-UID vCard property
    pub const X_BT_UID: u32 = 1 << 7;
    /// Contact referencing
    pub const CONTACT_REFERENCING: u32 = 1 << 8;
    /// Default contact image format
    pub const DEFAULT_CONTACT_IMAGE_FORMAT: u32 = 1 << 9;
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Order {
    /// By handle index
    Indexed = 0x00,
    /// Alphabetical
    Alphabetical = 0x01,
    /// Phonetical
    Phonetical = 0x02,
}

/// Property a listing search applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SearchProperty {
    /// Name
    Name = 0x00,
    /// Number
    Number = 0x01,
    /// Sound
    Sound = 0x02,
}

/// vCard format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum VcardFormat {
    /// vCard 2.1
    V21 = 0x00,
    /// vCard 3.0
    V30 = 0x01,
}

/// How vCard selector bits combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SelectorOperator {
    /// Any selected property present
    Or = 0x00,
    /// All selected properties present
    And = 0x01,
}

/// Encoded application parameter set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppParams {
    data: Vec<u8, APP_PARAMS_CAPACITY>,
}

impl AppParams {
    /// Create an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Encoded triplets
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Check if no parameter has been added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Add a raw parameter
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if the value length does not fit
    /// the tag, `PbapError::BufferFull` if the set is full
    pub fn add(&mut self, tag: AppParamTag, value: &[u8]) -> Result<(), PbapError> {
        match tag.fixed_len() {
            Some(len) if len != value.len() => return Err(PbapError::InvalidArgument),
            _ => {}
        }
        let len = u8::try_from(value.len()).map_err(|_| PbapError::InvalidArgument)?;
        if self.data.capacity() - self.data.len() < 2 + value.len() {
            return Err(PbapError::BufferFull);
        }

        self.data
            .extend_from_slice(&[tag as u8, len])
            .and_then(|()| self.data.extend_from_slice(value))
            .map_err(|()| PbapError::BufferFull)
    }

    /// Add the listing order
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_order(&mut self, order: Order) -> Result<(), PbapError> {
        self.add(AppParamTag::Order, &[order as u8])
    }

    /// Add the search text
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if the text exceeds 255 bytes,
    /// `PbapError::BufferFull` if the set is full
    pub fn add_search_value(&mut self, value: &str) -> Result<(), PbapError> {
        self.add(AppParamTag::SearchValue, value.as_bytes())
    }

    /// Add the searched property
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_search_property(&mut self, property: SearchProperty) -> Result<(), PbapError> {
        self.add(AppParamTag::SearchProperty, &[property as u8])
    }

    /// Add the maximum number of entries to return
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_max_list_count(&mut self, count: u16) -> Result<(), PbapError> {
        self.add(AppParamTag::MaxListCount, &count.to_be_bytes())
    }

    /// Add the offset of the first entry to return
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_list_start_offset(&mut self, offset: u16) -> Result<(), PbapError> {
        self.add(AppParamTag::ListStartOffset, &offset.to_be_bytes())
    }

    /// Add the vCard property filter
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_property_selector(&mut self, mask: u64) -> Result<(), PbapError> {
        self.add(AppParamTag::PropertySelector, &mask.to_be_bytes())
    }

    /// Add the vCard format
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_format(&mut self, format: VcardFormat) -> Result<(), PbapError> {
        self.add(AppParamTag::Format, &[format as u8])
    }

    /// Add the vCard selection filter
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_vcard_selector(&mut self, mask: u64) -> Result<(), PbapError> {
        self.add(AppParamTag::VcardSelector, &mask.to_be_bytes())
    }

    /// Add how selector bits combine
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_vcard_selector_operator(
        &mut self,
        operator: SelectorOperator,
    ) -> Result<(), PbapError> {
        self.add(AppParamTag::VcardSelectorOperator, &[operator as u8])
    }

    /// Ask the server to reset its new missed calls counter
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_reset_new_missed_calls(&mut self) -> Result<(), PbapError> {
        self.add(AppParamTag::ResetNewMissedCalls, &[0x01])
    }

    /// Add the local PBAP supported features
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the set is full
    pub fn add_supported_features(&mut self, features: u32) -> Result<(), PbapError> {
        self.add(AppParamTag::SupportedFeatures, &features.to_be_bytes())
    }

    /// Write the set as one Application Parameters header
    ///
    /// # Errors
    /// Returns `PbapError::BufferFull` if the header does not fit
    pub fn write_to(&self, buf: &mut PduBuffer) -> Result<(), PbapError> {
        buf.add_bytes_header(id::APP_PARAMS, &self.data)
    }
}

fn find_fixed<const L: usize>(buf: &PduBuffer, tag: AppParamTag) -> Option<[u8; L]> {
    let value = buf.app_params()?.find_tag(tag as u8)?;
    <[u8; L]>::try_from(value).ok()
}

/// Phonebook size reported by the server
#[must_use]
pub fn phonebook_size(buf: &PduBuffer) -> Option<u16> {
    find_fixed(buf, AppParamTag::PhonebookSize).map(u16::from_be_bytes)
}

/// New missed calls count reported by the server
#[must_use]
pub fn new_missed_calls(buf: &PduBuffer) -> Option<u8> {
    find_fixed::<1>(buf, AppParamTag::NewMissedCalls).map(|[count]| count)
}

/// Primary folder version reported by the server
#[must_use]
pub fn primary_folder_version(buf: &PduBuffer) -> Option<[u8; 16]> {
    find_fixed(buf, AppParamTag::PrimaryFolderVersion)
}

/// Secondary folder version reported by the server
#[must_use]
pub fn secondary_folder_version(buf: &PduBuffer) -> Option<[u8; 16]> {
    find_fixed(buf, AppParamTag::SecondaryFolderVersion)
}

/// Database identifier reported by the server
#[must_use]
pub fn database_identifier(buf: &PduBuffer) -> Option<[u8; 16]> {
    find_fixed(buf, AppParamTag::DatabaseIdentifier)
}

/// PBAP supported features carried in a header buffer
#[must_use]
pub fn supported_features(buf: &PduBuffer) -> Option<u32> {
    find_fixed(buf, AppParamTag::SupportedFeatures).map(u32::from_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obex::Tlv;

    #[test]
    fn test_tag_round_trip() {
        for raw in 0x01..=0x10u8 {
            let tag = AppParamTag::try_from(raw).unwrap();
            assert_eq!(tag as u8, raw);
        }
        assert_eq!(AppParamTag::try_from(0x00), Err(PbapError::InvalidArgument));
        assert_eq!(AppParamTag::try_from(0x11), Err(PbapError::InvalidArgument));
    }

    #[test]
    fn test_paging_request_encoding() {
        let mut params = AppParams::new();
        params.add_order(Order::Alphabetical).unwrap();
        params.add_max_list_count(0x0100).unwrap();
        params.add_list_start_offset(5).unwrap();

        assert_eq!(
            params.as_bytes(),
            &[0x01, 0x01, 0x01, 0x04, 0x02, 0x01, 0x00, 0x05, 0x02, 0x00, 0x05]
        );

        let mut buf = PduBuffer::new();
        params.write_to(&mut buf).unwrap();
        assert_eq!(buf.as_bytes()[..3], [0x4C, 0x00, 14]);
        assert_eq!(
            buf.app_params().unwrap().find_tag(0x04),
            Some(&[0x01, 0x00][..])
        );
    }

    #[test]
    fn test_fixed_length_is_enforced() {
        let mut params = AppParams::new();
        assert_eq!(
            params.add(AppParamTag::MaxListCount, &[0x01]),
            Err(PbapError::InvalidArgument)
        );
        assert_eq!(
            params.add(AppParamTag::SupportedFeatures, &[0; 8]),
            Err(PbapError::InvalidArgument)
        );
        assert!(params.is_empty());

        params.add_search_value("Smith").unwrap();
        assert_eq!(params.as_bytes(), b"\x02\x05Smith");
    }

    #[test]
    fn test_full_set_is_rejected() {
        let mut params = AppParams::new();
        while params
            .add(AppParamTag::DatabaseIdentifier, &[0xEE; 16])
            .is_ok()
        {}
        assert_eq!(params.as_bytes().len(), 7 * 18);
        assert_eq!(params.add_max_list_count(1), Err(PbapError::BufferFull));
    }

    #[test]
    fn test_response_getters() {
        let mut buf = PduBuffer::new();
        buf.add_app_params(&[
            Tlv::new(0x08, &[0x01, 0x2C]),
            Tlv::new(0x09, &[0x03]),
            Tlv::new(0x0D, &[0xAB; 16]),
            Tlv::new(0x10, &[0x00, 0x00, 0x03, 0xFF]),
        ])
        .unwrap();

        assert_eq!(phonebook_size(&buf), Some(300));
        assert_eq!(new_missed_calls(&buf), Some(3));
        assert_eq!(database_identifier(&buf), Some([0xAB; 16]));
        assert_eq!(supported_features(&buf), Some(0x3FF));
        assert_eq!(primary_folder_version(&buf), None);
        assert_eq!(secondary_folder_version(&buf), None);
    }

    #[test]
    fn test_malformed_response_value_is_ignored() {
        let mut buf = PduBuffer::new();
        buf.add_app_params(&[Tlv::new(0x08, &[0x01])]).unwrap();
        assert_eq!(phonebook_size(&buf), None);
        assert_eq!(phonebook_size(&PduBuffer::new()), None);
    }

    #[test]
    fn test_feature_bits() {
        assert_eq!(feature::DOWNLOAD | feature::BROWSING, 0x03);
        assert_eq!(feature::DEFAULT_CONTACT_IMAGE_FORMAT, 0x200);
    }
}
