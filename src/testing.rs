//! Test doubles shared by the unit tests

use crate::{
    BluetoothAddress, PbapError,
    obex::{ObexTransport, PduBuffer, ResponseCode, SetPathFlags, TransportChannel},
    pbap::{Credential, PceHandler, SessionId},
};
use heapless::Vec;
use rand_core::{CryptoRng, RngCore};

/// Counter-based generator, deterministic for tests
pub struct CountingRng(pub u8);

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for byte in dest {
            *byte = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for CountingRng {}

/// Request recorded by [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ConnectTransport(SessionId, BluetoothAddress, TransportChannel),
    DisconnectTransport(SessionId),
    Connect(SessionId, u16, PduBuffer),
    Disconnect(SessionId, PduBuffer),
    Get(SessionId, bool, PduBuffer),
    SetPath(SessionId, SetPathFlags, PduBuffer),
    Abort(SessionId, PduBuffer),
}

/// Transport recording every request
#[derive(Debug, Default)]
pub struct MockTransport {
    pub calls: Vec<Call, 16>,
    /// Error returned by the next request, which is then not recorded
    pub fail_next: Option<PbapError>,
}

impl MockTransport {
    fn record(&mut self, call: Call) -> Result<(), PbapError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.calls.push(call).map_err(|_| PbapError::NoResources)
    }
}

impl ObexTransport for MockTransport {
    fn connect_transport(
        &mut self,
        session: SessionId,
        peer: BluetoothAddress,
        channel: TransportChannel,
    ) -> Result<(), PbapError> {
        self.record(Call::ConnectTransport(session, peer, channel))
    }

    fn disconnect_transport(&mut self, session: SessionId) -> Result<(), PbapError> {
        self.record(Call::DisconnectTransport(session))
    }

    fn connect(
        &mut self,
        session: SessionId,
        max_packet_len: u16,
        headers: PduBuffer,
    ) -> Result<(), PbapError> {
        self.record(Call::Connect(session, max_packet_len, headers))
    }

    fn disconnect(&mut self, session: SessionId, headers: PduBuffer) -> Result<(), PbapError> {
        self.record(Call::Disconnect(session, headers))
    }

    fn get(
        &mut self,
        session: SessionId,
        final_bit: bool,
        headers: PduBuffer,
    ) -> Result<(), PbapError> {
        self.record(Call::Get(session, final_bit, headers))
    }

    fn set_path(
        &mut self,
        session: SessionId,
        flags: SetPathFlags,
        headers: PduBuffer,
    ) -> Result<(), PbapError> {
        self.record(Call::SetPath(session, flags, headers))
    }

    fn abort(&mut self, session: SessionId, headers: PduBuffer) -> Result<(), PbapError> {
        self.record(Call::Abort(session, headers))
    }
}

/// Application callback recorded by [`MockHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Connected(SessionId, u16),
    AuthInfo(SessionId),
    Disconnected(SessionId, ResponseCode),
    Phonebook(SessionId, ResponseCode, PduBuffer),
    VcardListing(SessionId, ResponseCode, PduBuffer),
    VcardEntry(SessionId, ResponseCode, PduBuffer),
    SetPath(SessionId, ResponseCode),
    Abort(SessionId, ResponseCode),
}

/// Handler recording every callback
#[derive(Debug, Default)]
pub struct MockHandler {
    pub callbacks: Vec<Callback, 16>,
    /// Credential handed out when the peer challenges
    pub credential: Option<Credential>,
}

impl MockHandler {
    fn record(&mut self, callback: Callback) {
        self.callbacks.push(callback).ok();
    }
}

impl PceHandler for MockHandler {
    fn connected(&mut self, session: SessionId, max_packet_len: u16) {
        self.record(Callback::Connected(session, max_packet_len));
    }

    fn get_auth_info(&mut self, session: SessionId) -> Option<Credential> {
        self.record(Callback::AuthInfo(session));
        self.credential.clone()
    }

    fn disconnected(&mut self, session: SessionId, code: ResponseCode) {
        self.record(Callback::Disconnected(session, code));
    }

    fn pull_phonebook(&mut self, session: SessionId, code: ResponseCode, response: &PduBuffer) {
        self.record(Callback::Phonebook(session, code, response.clone()));
    }

    fn pull_vcard_listing(&mut self, session: SessionId, code: ResponseCode, response: &PduBuffer) {
        self.record(Callback::VcardListing(session, code, response.clone()));
    }

    fn pull_vcard_entry(&mut self, session: SessionId, code: ResponseCode, response: &PduBuffer) {
        self.record(Callback::VcardEntry(session, code, response.clone()));
    }

    fn set_path(&mut self, session: SessionId, code: ResponseCode) {
        self.record(Callback::SetPath(session, code));
    }

    fn abort(&mut self, session: SessionId, code: ResponseCode) {
        self.record(Callback::Abort(session, code));
    }
}
