use crate::PbapError;
use core::fmt;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Bluetooth Device Address (`BD_ADDR`) of a remote phonebook server
///
/// Identifies the peer a session is bound to. The session never owns the
/// underlying ACL link, it only keeps this address as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothAddress(pub [u8; 6]);

impl BluetoothAddress {
    /// Create a new Bluetooth address from bytes
    #[must_use]
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Format the address as a colon-separated hex string
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            result
                .push(char::from(HEX_DIGITS[usize::from(byte >> 4)]))
                .ok();
            result
                .push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]))
                .ok();
        }
        result
    }

    /// Parse a Bluetooth address from a colon-separated hex string
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` if the string is not six
    /// colon-separated two-digit hex octets
    pub fn from_hex(hex: &str) -> Result<Self, PbapError> {
        if hex.len() != 17 {
            return Err(PbapError::InvalidArgument);
        }

        let mut bytes = [0u8; 6];
        let mut octets = hex.split(':');
        for byte in &mut bytes {
            let octet = octets.next().ok_or(PbapError::InvalidArgument)?;
            if octet.len() != 2 {
                return Err(PbapError::InvalidArgument);
            }
            *byte = u8::from_str_radix(octet, 16).map_err(|_| PbapError::InvalidArgument)?;
        }
        if octets.next().is_some() {
            return Err(PbapError::InvalidArgument);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_hex())
    }
}

impl From<[u8; 6]> for BluetoothAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for [u8; 6] {
    fn from(addr: BluetoothAddress) -> Self {
        addr.0
    }
}

impl From<BluetoothAddress> for bt_hci::param::BdAddr {
    fn from(addr: BluetoothAddress) -> Self {
        bt_hci::param::BdAddr::new(addr.0)
    }
}

impl TryFrom<bt_hci::param::BdAddr> for BluetoothAddress {
    type Error = PbapError;

    fn try_from(bd_addr: bt_hci::param::BdAddr) -> Result<Self, Self::Error> {
        bd_addr.raw().try_into()
    }
}

impl TryFrom<&str> for BluetoothAddress {
    type Error = PbapError;

    fn try_from(hex: &str) -> Result<Self, Self::Error> {
        BluetoothAddress::from_hex(hex)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = PbapError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 6]>::try_from(bytes)
            .map(Self)
            .map_err(|_| PbapError::InvalidArgument)
    }
}
