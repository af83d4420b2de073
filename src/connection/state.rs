//! Default handling of relayed peer events

use rtcbond_shared::{IceConnectionState, PeerEvent, SdpType, SignalingState};

/// What a connection has learned about its peer from relayed events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerState {
    /// Labels of data channels opened by the peer
    pub data_channels: Vec<String>,
    /// Labels of streams currently added by the peer
    pub streams: Vec<String>,
    pub signaling_state: Option<SignalingState>,
    pub ice_state: Option<IceConnectionState>,
    pub ice_candidates: u32,
    pub negotiations_needed: u32,
    /// Type of the last session description set
    pub session_description: Option<SdpType>,
}

impl PeerState {
    pub fn apply(&mut self, event: &PeerEvent) {
        match event {
            PeerEvent::DataChannelOpened(channel) => {
                self.data_channels.push(channel.label.clone());
            }
            PeerEvent::IceCandidate(_) => self.ice_candidates += 1,
            PeerEvent::IceCandidateStateChanged(state) => self.ice_state = Some(*state),
            PeerEvent::SignalingStateChanged(state) => self.signaling_state = Some(*state),
            PeerEvent::NegotiationNeeded => self.negotiations_needed += 1,
            PeerEvent::StreamAdded(stream) => {
                if !self.streams.contains(&stream.label) {
                    self.streams.push(stream.label.clone());
                }
            }
            PeerEvent::StreamRemoved(stream) => {
                self.streams.retain(|label| label != &stream.label);
            }
            PeerEvent::SessionDescriptionSet(description) => {
                self.session_description = Some(description.sdp_type);
            }
        }
    }
}
