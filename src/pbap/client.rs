//! PBAP Client (PCE)
//!
//! [`PbapClient`] is the public entry point of the profile. Application
//! calls validate the session state, build a header buffer and hand it to
//! the OBEX engine; engine completions come back through
//! [`PbapClient::process_event`], advance the session and reach the
//! application through its [`PceHandler`].
//!
//! ## Architecture
//!
//! - One outstanding request per session; a new operation needs
//!   [`SessionState::Idle`]
//! - RFCOMM pulls answered with Continue are re-requested automatically
//!   with a Connection ID only GET
//! - L2CAP pulls use Single Response Mode; when the application asked the
//!   server to wait, it drives the next part with
//!   [`PbapClient::continue_pull`]
//! - Every failure during connect, and every response to an abort, tears
//!   the transport down; the slot is released once the engine reports the
//!   transport closed
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut client: PbapClient<_, _, _> = PbapClient::new(transport, rng);
//! client.register(handler)?;
//!
//! let session = client.connect(peer, TransportChannel::Rfcomm(5), SessionConfig::new(0))?;
//! // feed engine completions
//! client.process_event(event);
//! // once `connected` fired
//! client.pull_phonebook(session, PduBuffer::new(), "telecom/pb.vcf", false)?;
//! ```

use crate::{
    BluetoothAddress, PbapError,
    constants::{MAX_SESSIONS, PBAP_TARGET_UUID},
    obex::{
        ObexEvent, ObexTransport, PduBuffer, ResponseCode, Tlv, TransportChannel, TransportKind,
        header::{SRM_ENABLE, SRMP_WAIT, challenge_tag, response_tag},
    },
    pbap::{
        app_param::AppParams,
        auth::{self, Nonce},
        registry::{SessionId, SessionRegistry},
        session::{
            Credential, PullKind, PullPhase, Session, SessionConfig, SessionState, SetPathTarget,
        },
    },
};
use rand_core::{CryptoRng, RngCore};

/// Application callbacks
///
/// Every method has an empty default so handlers only implement what they
/// use. Response buffers are borrowed for the duration of the call.
pub trait PceHandler {
    /// OBEX session established
    fn connected(&mut self, _session: SessionId, _max_packet_len: u16) {}

    /// Peer challenged and the session has no credential
    ///
    /// Returning `None` aborts the connection.
    fn get_auth_info(&mut self, _session: SessionId) -> Option<Credential> {
        None
    }

    /// Session closed, or an OBEX DISCONNECT was refused
    ///
    /// After a refused DISCONNECT the session stays connected and `code`
    /// is the peer's answer; retry with `enforce` set to tear it down.
    fn disconnected(&mut self, _session: SessionId, _code: ResponseCode) {}

    /// Part of a phonebook object
    fn pull_phonebook(&mut self, _session: SessionId, _code: ResponseCode, _response: &PduBuffer) {
    }

    /// Part of a vCard listing
    fn pull_vcard_listing(
        &mut self,
        _session: SessionId,
        _code: ResponseCode,
        _response: &PduBuffer,
    ) {
    }

    /// Part of a single vCard
    fn pull_vcard_entry(
        &mut self,
        _session: SessionId,
        _code: ResponseCode,
        _response: &PduBuffer,
    ) {
    }

    /// SETPATH answered
    fn set_path(&mut self, _session: SessionId, _code: ResponseCode) {}

    /// Response received after an abort, the session is being torn down
    fn abort(&mut self, _session: SessionId, _code: ResponseCode) {}
}

/// Phonebook Access Profile client
pub struct PbapClient<T, H, R, const N: usize = MAX_SESSIONS> {
    transport: T,
    rng: R,
    handler: Option<H>,
    sessions: SessionRegistry<N>,
}

impl<T, H, R, const N: usize> PbapClient<T, H, R, N>
where
    T: ObexTransport,
    H: PceHandler,
    R: RngCore + CryptoRng,
{
    /// Create a client driving `transport`
    ///
    /// `rng` supplies the nonces of local authentication challenges.
    #[must_use]
    pub fn new(transport: T, rng: R) -> Self {
        Self {
            transport,
            rng,
            handler: None,
            sessions: SessionRegistry::new(),
        }
    }

    /// Register the application callbacks
    ///
    /// # Errors
    /// Returns `PbapError::AlreadyRegistered` if a handler is registered
    pub fn register(&mut self, handler: H) -> Result<(), PbapError> {
        if self.handler.is_some() {
            warn!("[PCE] Handler already registered");
            return Err(PbapError::AlreadyRegistered);
        }
        self.handler = Some(handler);
        info!("[PCE] Handler registered");
        Ok(())
    }

    /// Check if a handler is registered
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.handler.is_some()
    }

    /// Get the registered handler
    #[must_use]
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// Get the registered handler mutably
    pub fn handler_mut(&mut self) -> Option<&mut H> {
        self.handler.as_mut()
    }

    /// Get the OBEX engine
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the OBEX engine mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Get the session behind `id`
    ///
    /// # Errors
    /// Returns `PbapError::InvalidSession` for released or unknown handles
    pub fn session(&self, id: SessionId) -> Result<&Session, PbapError> {
        self.sessions.get(id)
    }

    /// Get the session registry
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry<N> {
        &self.sessions
    }

    /// Find the session of `peer` for `instance_id`
    #[must_use]
    pub fn find_session(&self, peer: BluetoothAddress, instance_id: u8) -> Option<SessionId> {
        self.sessions.find(peer, instance_id)
    }

    fn ensure_registered(&self) -> Result<(), PbapError> {
        if self.handler.is_none() {
            warn!("[PCE] No handler registered");
            return Err(PbapError::NotRegistered);
        }
        Ok(())
    }

    /// Open a session toward `peer`
    ///
    /// Returns once the transport connection is pending. The outcome is
    /// reported through [`PceHandler::connected`] or
    /// [`PceHandler::disconnected`].
    ///
    /// # Errors
    /// Returns `PbapError::NotRegistered` before registration,
    /// `PbapError::AlreadyConnected` if a session exists for the peer and
    /// instance, `PbapError::NoResources` if the pool is full, or the
    /// engine's error if the transport cannot be opened
    pub fn connect(
        &mut self,
        peer: BluetoothAddress,
        channel: TransportChannel,
        config: SessionConfig,
    ) -> Result<SessionId, PbapError> {
        self.ensure_registered()?;

        let id = self.sessions.allocate(peer, channel.kind(), config)?;
        if let Err(err) = self.transport.connect_transport(id, peer, channel) {
            warn!("[PCE] Failed to open transport to {}: {}", peer, err);
            self.sessions.release(id);
            return Err(err);
        }

        self.sessions.get_mut(id)?.state = SessionState::Connecting;
        info!("[PCE] Connection to {} pending", peer);
        Ok(id)
    }

    /// Close a session
    ///
    /// With `enforce` the transport is closed without any OBEX exchange.
    /// Otherwise an OBEX DISCONNECT is sent and the transport is closed
    /// once the server accepts it.
    ///
    /// # Errors
    /// Returns `PbapError::NotRegistered` before registration,
    /// `PbapError::InvalidSession` for stale handles,
    /// `PbapError::NotConnected` for a graceful disconnect without OBEX
    /// session, `PbapError::InProgress` for a graceful disconnect while
    /// another operation is outstanding, or the engine's error
    pub fn disconnect(&mut self, id: SessionId, enforce: bool) -> Result<(), PbapError> {
        self.ensure_registered()?;
        let session = self.sessions.get_mut(id)?;

        if enforce {
            self.transport.disconnect_transport(id)?;
            session.state = SessionState::Disconnecting;
            info!("[PCE] Tearing down session {}", id);
            return Ok(());
        }

        if let Err(err) = session.state.ensure_idle() {
            warn!("[PCE] Disconnect rejected in state {}", session.state);
            return Err(err);
        }

        let mut request = PduBuffer::new();
        if let Some(connection_id) = session.connection_id {
            request.add_connection_id(connection_id)?;
        }
        self.transport.disconnect(id, request)?;
        session.state = SessionState::Disconnecting;
        info!("[PCE] Disconnect requested for session {}", id);
        Ok(())
    }

    /// Pull a phonebook object such as `telecom/pb.vcf`
    ///
    /// Headers already in `buffer`, such as application parameters, are
    /// sent after the mandatory ones. With `wait` an L2CAP server holds
    /// every part until [`PbapClient::continue_pull`] is called.
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` for an empty name,
    /// `PbapError::NotConnected` or `PbapError::InProgress` unless the
    /// session is idle, or the engine's error
    pub fn pull_phonebook(
        &mut self,
        id: SessionId,
        buffer: PduBuffer,
        name: &str,
        wait: bool,
    ) -> Result<(), PbapError> {
        self.start_pull(id, PullKind::Phonebook, buffer, name, wait)
    }

    /// Pull the vCard listing of `folder`, or of the current folder when
    /// empty
    ///
    /// # Errors
    /// Returns `PbapError::NotConnected` or `PbapError::InProgress` unless
    /// the session is idle, or the engine's error
    pub fn pull_vcard_listing(
        &mut self,
        id: SessionId,
        buffer: PduBuffer,
        folder: &str,
        wait: bool,
    ) -> Result<(), PbapError> {
        self.start_pull(id, PullKind::VcardListing, buffer, folder, wait)
    }

    /// Pull a single vCard such as `0.vcf`
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` for an empty name,
    /// `PbapError::NotConnected` or `PbapError::InProgress` unless the
    /// session is idle, or the engine's error
    pub fn pull_vcard_entry(
        &mut self,
        id: SessionId,
        buffer: PduBuffer,
        name: &str,
        wait: bool,
    ) -> Result<(), PbapError> {
        self.start_pull(id, PullKind::VcardEntry, buffer, name, wait)
    }

    fn start_pull(
        &mut self,
        id: SessionId,
        kind: PullKind,
        buffer: PduBuffer,
        name: &str,
        wait: bool,
    ) -> Result<(), PbapError> {
        self.ensure_registered()?;
        let session = self.sessions.get_mut(id)?;
        if let Err(err) = session.state.ensure_idle() {
            warn!("[PCE] Pull rejected in state {}", session.state);
            return Err(err);
        }
        if name.is_empty() && kind != PullKind::VcardListing {
            return Err(PbapError::InvalidArgument);
        }

        let request = get_request(session, Some((kind, name)), &buffer, wait)?;
        self.transport.get(id, true, request)?;

        session.srm_wait = wait;
        session.state = SessionState::Pull {
            kind,
            phase: PullPhase::Requested,
        };
        debug!("[PCE] Pull {} started on session {}", kind, id);
        Ok(())
    }

    /// Request the next part of a pull the server is holding
    ///
    /// Only L2CAP sessions that pulled with `wait` are ever held.
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` when no pull is held,
    /// `PbapError::NotConnected` without OBEX session,
    /// `PbapError::InProgress` while a request is outstanding, or the
    /// engine's error
    pub fn continue_pull(
        &mut self,
        id: SessionId,
        buffer: PduBuffer,
        wait: bool,
    ) -> Result<(), PbapError> {
        self.ensure_registered()?;
        let session = self.sessions.get_mut(id)?;
        let kind = match session.state {
            SessionState::Pull {
                kind,
                phase: PullPhase::Held,
            } => kind,
            SessionState::Idle => return Err(PbapError::InvalidArgument),
            SessionState::Disconnected | SessionState::Connecting => {
                return Err(PbapError::NotConnected);
            }
            _ => return Err(PbapError::InProgress),
        };

        let request = get_request(session, None, &buffer, wait)?;
        self.transport.get(id, true, request)?;

        session.srm_wait = wait;
        session.state = SessionState::Pull {
            kind,
            phase: PullPhase::Requested,
        };
        Ok(())
    }

    /// Change the current folder
    ///
    /// `path` is `/` for the root, `..` for the parent or `./name` for a
    /// child folder.
    ///
    /// # Errors
    /// Returns `PbapError::InvalidArgument` for any other path,
    /// `PbapError::NotConnected` or `PbapError::InProgress` unless the
    /// session is idle, or the engine's error
    pub fn set_path(&mut self, id: SessionId, buffer: PduBuffer, path: &str) -> Result<(), PbapError> {
        self.ensure_registered()?;
        let session = self.sessions.get_mut(id)?;
        if let Err(err) = session.state.ensure_idle() {
            warn!("[PCE] Set path rejected in state {}", session.state);
            return Err(err);
        }
        let target = SetPathTarget::parse(path)?;

        let mut request = PduBuffer::new();
        if let Some(connection_id) = session.connection_id {
            request.add_connection_id(connection_id)?;
        }
        if let Some(name) = target.name() {
            request.add_name(name)?;
        }
        request.append(&buffer)?;

        self.transport.set_path(id, target.flags(), request)?;
        session.state = SessionState::SetPath;
        Ok(())
    }

    /// Abort the outstanding operation
    ///
    /// `Ok` means the ABORT was sent; whatever the server answers next,
    /// the session is torn down. Nothing is sent while an abort is already
    /// pending.
    ///
    /// # Errors
    /// Returns `PbapError::InProgress` if an abort or disconnect is
    /// pending, `PbapError::NotConnected` without OBEX session, or the
    /// engine's error, in which case the interrupted operation stays
    /// outstanding
    pub fn abort(&mut self, id: SessionId) -> Result<(), PbapError> {
        self.ensure_registered()?;
        let session = self.sessions.get_mut(id)?;
        match session.state {
            SessionState::Abort | SessionState::Disconnecting => {
                debug!("[PCE] Abort already pending on session {}", id);
                return Err(PbapError::InProgress);
            }
            SessionState::Disconnected | SessionState::Connecting => {
                return Err(PbapError::NotConnected);
            }
            _ => {}
        }

        let mut request = PduBuffer::new();
        if let Some(connection_id) = session.connection_id {
            request.add_connection_id(connection_id)?;
        }

        let previous = session.state;
        session.state = SessionState::Abort;
        if let Err(err) = self.transport.abort(id, request) {
            warn!("[PCE] Failed to send abort: {}", err);
            session.state = previous;
            return Err(err);
        }
        info!("[PCE] Abort sent on session {}", id);
        Ok(())
    }

    /// Feed a completion from the OBEX engine
    pub fn process_event(&mut self, event: ObexEvent) {
        match event {
            ObexEvent::TransportConnected { session } => self.on_transport_connected(session),
            ObexEvent::TransportDisconnected { session } => {
                info!("[PCE] Transport of session {} closed", session);
                self.release(session);
            }
            ObexEvent::Connect {
                session,
                code,
                version,
                max_packet_len,
                headers,
            } => self.on_connect(session, code, version, max_packet_len, &headers),
            ObexEvent::Disconnect { session, code, .. } => self.on_disconnect(session, code),
            ObexEvent::Get {
                session,
                code,
                headers,
            } => self.on_get(session, code, &headers),
            ObexEvent::SetPath { session, code, .. } => self.on_set_path(session, code),
            ObexEvent::Abort { session, code, .. } => self.on_abort(session, code),
        }
    }

    fn on_transport_connected(&mut self, id: SessionId) {
        let Ok(session) = self.sessions.get_mut(id) else {
            warn!("[PCE] Transport connected for unknown session {}", id);
            return;
        };
        if session.state != SessionState::Connecting {
            warn!("[PCE] Transport connected in state {}", session.state);
            return;
        }
        info!("[PCE] Transport to {} connected", session.peer());

        let max_packet_len = session.config.max_packet_len;
        let result = connect_request(session, &mut self.rng)
            .and_then(|request| self.transport.connect(id, max_packet_len, request));
        if let Err(err) = result {
            warn!("[PCE] Failed to send connect request: {}", err);
            self.teardown(id, ResponseCode::Unavailable);
        }
    }

    fn on_connect(
        &mut self,
        id: SessionId,
        code: ResponseCode,
        version: u8,
        max_packet_len: u16,
        headers: &PduBuffer,
    ) {
        let Ok(session) = self.sessions.get_mut(id) else {
            return;
        };
        if session.state != SessionState::Connecting {
            warn!("[PCE] Connect response in state {}", session.state);
            return;
        }
        debug!(
            "[PCE] Connect response {}, version {=u8:x}, mopl {}",
            code, version, max_packet_len
        );

        if let Some(connection_id) = headers.connection_id() {
            session.connection_id = Some(connection_id);
        }

        match code {
            ResponseCode::Unauthorized => {
                if let Err(err) = self.answer_challenge(id, headers) {
                    warn!("[AUTH] Cannot answer peer challenge: {}", err);
                    self.teardown(id, code);
                }
            }
            ResponseCode::Success => {
                if session.local_auth && !peer_answer_valid(session, headers) {
                    warn!("[AUTH] Peer failed authentication");
                    self.teardown(id, ResponseCode::Unauthorized);
                    return;
                }
                if session.local_auth {
                    info!("[AUTH] Peer authenticated");
                }

                session.local_challenge = None;
                session.local_auth = false;
                session.peer_auth = false;
                session.peer_max_packet_len = max_packet_len;
                session.state = SessionState::Idle;
                info!("[PCE] Session {} connected", id);

                if let Some(handler) = self.handler.as_mut() {
                    handler.connected(id, max_packet_len);
                }
            }
            refused => {
                warn!("[PCE] Connect refused: {}", refused);
                self.teardown(id, refused);
            }
        }
    }

    fn answer_challenge(&mut self, id: SessionId, headers: &PduBuffer) -> Result<(), PbapError> {
        let session = self.sessions.get_mut(id)?;
        if session.peer_auth {
            return Err(PbapError::AuthenticationFailed);
        }
        session.peer_auth = true;

        let nonce: Nonce = headers
            .auth_challenge()
            .and_then(|challenge| challenge.find_tag(challenge_tag::NONCE))
            .and_then(|nonce| Nonce::try_from(nonce).ok())
            .ok_or(PbapError::MalformedHeader)?;

        if session.config.credential.is_none() {
            let credential = self
                .handler
                .as_mut()
                .and_then(|handler| handler.get_auth_info(id))
                .ok_or(PbapError::AuthenticationFailed)?;
            self.sessions.get_mut(id)?.config.credential = Some(credential);
        }

        let session = self.sessions.get_mut(id)?;
        let credential = session
            .config
            .credential
            .as_ref()
            .ok_or(PbapError::AuthenticationFailed)?;
        let digest = auth::generate_response(credential.password(), &nonce);

        let mut request = PduBuffer::new();
        request.add_target(&PBAP_TARGET_UUID)?;
        match credential.user_id() {
            Some(user_id) => request.add_auth_response(&[
                Tlv::new(response_tag::REQUEST_DIGEST, &digest),
                Tlv::new(response_tag::USER_ID, user_id),
            ])?,
            None => request.add_auth_response(&[Tlv::new(response_tag::REQUEST_DIGEST, &digest)])?,
        }
        if let Some(challenge) = session.local_challenge.filter(|_| session.local_auth) {
            request.add_auth_challenge(&[Tlv::new(challenge_tag::NONCE, &challenge.nonce)])?;
        }

        let max_packet_len = session.config.max_packet_len;
        self.transport.connect(id, max_packet_len, request)?;
        debug!("[AUTH] Answered peer challenge on session {}", id);
        Ok(())
    }

    fn on_disconnect(&mut self, id: SessionId, code: ResponseCode) {
        let Ok(session) = self.sessions.get_mut(id) else {
            return;
        };
        if session.state != SessionState::Disconnecting {
            warn!("[PCE] Disconnect response in state {}", session.state);
            return;
        }

        if code.is_success() {
            session.close_reason = Some(code);
            if let Err(err) = self.transport.disconnect_transport(id) {
                warn!("[PCE] Failed to close transport: {}", err);
                self.release(id);
            }
            return;
        }

        warn!("[PCE] Disconnect refused: {}", code);
        session.state = SessionState::Idle;
        if let Some(handler) = self.handler.as_mut() {
            handler.disconnected(id, code);
        }
    }

    fn on_get(&mut self, id: SessionId, code: ResponseCode, headers: &PduBuffer) {
        let Ok(session) = self.sessions.get_mut(id) else {
            return;
        };
        let kind = match session.state {
            SessionState::Pull { kind, .. } => kind,
            SessionState::Abort => {
                self.on_abort(id, code);
                return;
            }
            state => {
                warn!("[PCE] GET response in state {}", state);
                return;
            }
        };

        let transport = session.transport();
        let auto_continue = code.is_continue() && transport == TransportKind::Rfcomm;
        session.state = if code.is_continue() {
            let phase = if transport == TransportKind::L2cap && session.srm_wait {
                PullPhase::Held
            } else {
                PullPhase::Requested
            };
            SessionState::Pull { kind, phase }
        } else {
            SessionState::Idle
        };

        if let Some(handler) = self.handler.as_mut() {
            match kind {
                PullKind::Phonebook => handler.pull_phonebook(id, code, headers),
                PullKind::VcardListing => handler.pull_vcard_listing(id, code, headers),
                PullKind::VcardEntry => handler.pull_vcard_entry(id, code, headers),
            }
        }

        if auto_continue {
            trace!("[PCE] Requesting next part on session {}", id);
            let result = self
                .sessions
                .get(id)
                .and_then(|session| get_request(session, None, &PduBuffer::new(), false))
                .and_then(|request| self.transport.get(id, true, request));
            if let Err(err) = result {
                warn!("[PCE] Failed to send continuation: {}", err);
                self.teardown(id, ResponseCode::Unavailable);
            }
        }
    }

    fn on_set_path(&mut self, id: SessionId, code: ResponseCode) {
        let Ok(session) = self.sessions.get_mut(id) else {
            return;
        };
        match session.state {
            SessionState::SetPath => {
                session.state = SessionState::Idle;
                if let Some(handler) = self.handler.as_mut() {
                    handler.set_path(id, code);
                }
            }
            SessionState::Abort => self.on_abort(id, code),
            state => warn!("[PCE] Set path response in state {}", state),
        }
    }

    fn on_abort(&mut self, id: SessionId, code: ResponseCode) {
        let Ok(session) = self.sessions.get(id) else {
            return;
        };
        if session.state != SessionState::Abort {
            warn!("[PCE] Abort response in state {}", session.state);
            return;
        }

        info!("[PCE] Abort completed with {}", code);
        if let Some(handler) = self.handler.as_mut() {
            handler.abort(id, code);
        }
        self.teardown(id, code);
    }

    /// Close the transport and remember why
    fn teardown(&mut self, id: SessionId, reason: ResponseCode) {
        let Ok(session) = self.sessions.get_mut(id) else {
            return;
        };
        session.state = SessionState::Disconnecting;
        session.close_reason = Some(reason);
        session.local_challenge = None;

        if let Err(err) = self.transport.disconnect_transport(id) {
            // No close event will follow
            error!("[PCE] Failed to tear down session {}: {}", id, err);
            self.release(id);
        }
    }

    fn release(&mut self, id: SessionId) {
        let Some(session) = self.sessions.release(id) else {
            return;
        };
        // Transport lost without a local request
        let reason = session.close_reason.unwrap_or(match session.state {
            SessionState::Disconnecting => ResponseCode::OK,
            _ => ResponseCode::Unavailable,
        });
        info!("[PCE] Session {} released ({})", id, reason);
        if let Some(handler) = self.handler.as_mut() {
            handler.disconnected(id, reason);
        }
    }
}

/// CONNECT request: Target, local challenge, supported features
fn connect_request<R>(session: &mut Session, rng: &mut R) -> Result<PduBuffer, PbapError>
where
    R: RngCore + CryptoRng,
{
    let mut request = PduBuffer::new();
    request.add_target(&PBAP_TARGET_UUID)?;

    if let Some(credential) = &session.config.credential {
        let challenge = auth::generate_challenge(rng, credential.password());
        request.add_auth_challenge(&[Tlv::new(challenge_tag::NONCE, &challenge.nonce)])?;
        session.local_challenge = Some(challenge);
        session.local_auth = true;
    }

    if session.config.peer_features.is_some() {
        let mut params = AppParams::new();
        params.add_supported_features(session.config.local_features)?;
        params.write_to(&mut request)?;
    }
    Ok(request)
}

/// GET request of a pull sequence
///
/// `first` carries the type and name, sent on the first request only.
fn get_request(
    session: &Session,
    first: Option<(PullKind, &str)>,
    extra: &PduBuffer,
    wait: bool,
) -> Result<PduBuffer, PbapError> {
    let mut request = PduBuffer::new();
    if let Some(connection_id) = session.connection_id {
        request.add_connection_id(connection_id)?;
    }
    if session.transport() == TransportKind::L2cap {
        request.add_srm(SRM_ENABLE)?;
        if wait {
            request.add_srm_param(SRMP_WAIT)?;
        }
    }
    if let Some((kind, name)) = first {
        request.add_type(kind.object_type())?;
        request.add_name(name)?;
    }
    request.append(extra)?;
    Ok(request)
}

fn peer_answer_valid(session: &Session, headers: &PduBuffer) -> bool {
    let (Some(challenge), Some(credential)) =
        (session.local_challenge, session.config.credential.as_ref())
    else {
        return false;
    };
    headers
        .auth_response()
        .and_then(|response| response.find_tag(response_tag::REQUEST_DIGEST))
        .is_some_and(|digest| auth::verify(&challenge.nonce, digest, credential.password()))
}
