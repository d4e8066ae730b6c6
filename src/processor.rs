//! Processor - OBEX event delivery for multi-task hosts
//!
//! [`PbapRuntime`] shares one [`PbapClient`] between application tasks and
//! the task driving the OBEX engine. The client sits behind a mutex, engine
//! completions are queued in a channel and a single processor applies them
//! in order, so session state is only ever touched under the lock.
//!
//! # Usage
//!
//! ```rust,ignore
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use pbapbird::processor::PbapRuntime;
//!
//! static RUNTIME: StaticCell<PbapRuntime<CriticalSectionRawMutex, Engine, App, Rng>> =
//!     StaticCell::new();
//! let runtime = RUNTIME.init(PbapRuntime::new(client));
//!
//! // Engine task, for every completion
//! runtime.post(event).await;
//!
//! // Processor task
//! spawner.spawn(pbap_task(runtime)).unwrap();
//! async fn pbap_task(runtime: &'static PbapRuntime<...>) -> ! { runtime.run().await }
//!
//! // Application task
//! runtime.client().await.pull_phonebook(session, PduBuffer::new(), "telecom/pb.vcf", false)?;
//! ```

use crate::{
    PbapError,
    constants::{EVENT_QUEUE_DEPTH, MAX_SESSIONS},
    obex::{ObexEvent, ObexTransport},
    pbap::{PbapClient, PceHandler},
};
use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::Channel,
    mutex::{Mutex, MutexGuard},
};
use rand_core::{CryptoRng, RngCore};

/// Client shared between tasks together with its event queue
pub struct PbapRuntime<M, T, H, R, const N: usize = MAX_SESSIONS>
where
    M: RawMutex,
{
    client: Mutex<M, PbapClient<T, H, R, N>>,
    events: Channel<M, ObexEvent, EVENT_QUEUE_DEPTH>,
}

impl<M, T, H, R, const N: usize> PbapRuntime<M, T, H, R, N>
where
    M: RawMutex,
    T: ObexTransport,
    H: PceHandler,
    R: RngCore + CryptoRng,
{
    /// Wrap `client` for shared use
    #[must_use]
    pub fn new(client: PbapClient<T, H, R, N>) -> Self {
        Self {
            client: Mutex::new(client),
            events: Channel::new(),
        }
    }

    /// Lock the client for an application call
    pub async fn client(&self) -> MutexGuard<'_, M, PbapClient<T, H, R, N>> {
        self.client.lock().await
    }

    /// Queue an engine completion, waiting for room
    pub async fn post(&self, event: ObexEvent) {
        self.events.send(event).await;
    }

    /// Queue an engine completion from a context that cannot wait
    ///
    /// # Errors
    /// Returns `PbapError::NoResources` if the queue is full
    pub fn try_post(&self, event: ObexEvent) -> Result<(), PbapError> {
        self.events.try_send(event).map_err(|_| {
            warn!("[PROCESSOR] Event queue full");
            PbapError::NoResources
        })
    }

    /// Number of queued events
    #[must_use]
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    async fn dispatch(&self, event: ObexEvent) {
        trace!("[PROCESSOR] Event for session {}", event.session());
        self.client.lock().await.process_event(event);
    }

    /// Wait for the next event and apply it
    pub async fn process_next(&self) {
        let event = self.events.receive().await;
        self.dispatch(event).await;
    }

    /// Apply every queued event without waiting for new ones
    ///
    /// Returns the number of events applied.
    pub async fn drain(&self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events.try_receive() {
            self.dispatch(event).await;
            count += 1;
        }
        count
    }

    /// Apply events forever
    pub async fn run(&self) -> ! {
        info!("[PROCESSOR] Started");
        loop {
            self.process_next().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BluetoothAddress,
        obex::{PduBuffer, ResponseCode, TransportChannel},
        pbap::{SessionConfig, SessionState},
        testing::{Call, Callback, CountingRng, MockHandler, MockTransport},
    };
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestRuntime = PbapRuntime<NoopRawMutex, MockTransport, MockHandler, CountingRng>;

    const PEER: BluetoothAddress = BluetoothAddress::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    fn runtime() -> TestRuntime {
        let mut client = PbapClient::new(MockTransport::default(), CountingRng(0));
        client.register(MockHandler::default()).unwrap();
        PbapRuntime::new(client)
    }

    #[test]
    fn test_events_applied_in_order() {
        let runtime = runtime();
        block_on(async {
            let id = runtime
                .client()
                .await
                .connect(PEER, TransportChannel::Rfcomm(3), SessionConfig::new(0))
                .unwrap();

            runtime.post(ObexEvent::TransportConnected { session: id }).await;
            let mut headers = PduBuffer::new();
            headers.add_connection_id(7).unwrap();
            runtime
                .post(ObexEvent::Connect {
                    session: id,
                    code: ResponseCode::Success,
                    version: 0x10,
                    max_packet_len: 0x0800,
                    headers,
                })
                .await;
            assert_eq!(runtime.pending(), 2);

            assert_eq!(runtime.drain().await, 2);
            assert_eq!(runtime.pending(), 0);

            let client = runtime.client().await;
            let session = client.session(id).unwrap();
            assert_eq!(session.state(), SessionState::Idle);
            assert_eq!(session.connection_id(), Some(7));
            assert!(matches!(
                client.transport().calls.last(),
                Some(Call::Connect(..))
            ));
            assert_eq!(
                client.handler().unwrap().callbacks.as_slice(),
                &[Callback::Connected(id, 0x0800)]
            );
        });
    }

    #[test]
    fn test_process_next_applies_single_event() {
        let runtime = runtime();
        block_on(async {
            let id = runtime
                .client()
                .await
                .connect(PEER, TransportChannel::L2cap(0x1001), SessionConfig::new(1))
                .unwrap();

            runtime
                .try_post(ObexEvent::TransportDisconnected { session: id })
                .unwrap();
            runtime.process_next().await;

            let client = runtime.client().await;
            assert!(client.sessions().is_empty());
            assert_eq!(
                client.handler().unwrap().callbacks.as_slice(),
                &[Callback::Disconnected(id, ResponseCode::Unavailable)]
            );
        });
    }

    #[test]
    fn test_try_post_reports_full_queue() {
        let runtime = runtime();
        let id = block_on(async {
            runtime
                .client()
                .await
                .connect(PEER, TransportChannel::Rfcomm(3), SessionConfig::new(0))
                .unwrap()
        });

        for _ in 0..EVENT_QUEUE_DEPTH {
            runtime
                .try_post(ObexEvent::TransportDisconnected { session: id })
                .unwrap();
        }
        assert_eq!(
            runtime.try_post(ObexEvent::TransportDisconnected { session: id }),
            Err(PbapError::NoResources)
        );
        assert_eq!(block_on(runtime.drain()), EVENT_QUEUE_DEPTH);
    }
}
