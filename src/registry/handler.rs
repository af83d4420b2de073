//! Application hooks invoked by the callback relay

use crate::connection::Connection;
use rtcbond_shared::{
    DataChannel, IceCandidate, IceConnectionState, MediaStream, SessionDescription,
    SignalingState,
};

/// Application-level reactions to connection events.
///
/// Every hook defaults to a no-op. Hooks run before the connection's own
/// default handling of the same event.
pub trait RegistryHandler: Send + Sync {
    /// Teardown has started; the connection still holds its bonds and source
    fn on_connection_deleted(&self, _connection: &Connection) {}

    /// Return false to suppress the connection's default handling of this channel
    fn on_data_channel(&self, _connection: &Connection, _channel: &DataChannel) -> bool {
        true
    }

    fn on_negotiation_needed(&self, _connection: &Connection) {}

    fn on_ice_candidate(&self, _connection: &Connection, _candidate: &IceCandidate) {}

    fn on_ice_candidate_state_change(&self, _connection: &Connection, _state: IceConnectionState) {}

    fn on_signaling_state_change(&self, _connection: &Connection, _state: SignalingState) {}

    fn on_add_stream(&self, _connection: &Connection, _stream: &MediaStream) {}

    fn on_remove_stream(&self, _connection: &Connection, _stream: &MediaStream) {}

    fn on_set_session_description(&self, _connection: &Connection, _description: &SessionDescription) {}
}

/// Handler that accepts every event and reacts to none
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl RegistryHandler for NoopHandler {}
