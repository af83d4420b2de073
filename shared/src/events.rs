//! Events emitted by a peer connection's event source

/// A data channel opened by the remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChannel {
    pub label: String,
    pub id: Option<u16>,
    pub protocol: String,
    pub reliable: bool,
    pub ordered: bool,
}

impl DataChannel {
    /// Reliable, ordered channel with no sub-protocol
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: None,
            protocol: String::new(),
            reliable: true,
            ordered: true,
        }
    }
}

/// An ICE candidate discovered locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub sdp_mid: String,
    pub sdp_mline_index: u32,
    pub candidate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPrAnswer,
    HaveRemotePrAnswer,
    Closed,
}

/// A media stream added or removed by the remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub label: String,
    pub audio_tracks: Vec<String>,
    pub video_tracks: Vec<String>,
}

impl MediaStream {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            audio_tracks: Vec::new(),
            video_tracks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    PrAnswer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

/// Everything an event source can report for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    DataChannelOpened(DataChannel),
    IceCandidate(IceCandidate),
    IceCandidateStateChanged(IceConnectionState),
    SignalingStateChanged(SignalingState),
    NegotiationNeeded,
    StreamAdded(MediaStream),
    StreamRemoved(MediaStream),
    SessionDescriptionSet(SessionDescription),
}

impl PeerEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PeerEvent::DataChannelOpened(_) => "data-channel",
            PeerEvent::IceCandidate(_) => "ice-candidate",
            PeerEvent::IceCandidateStateChanged(_) => "ice-candidate-state",
            PeerEvent::SignalingStateChanged(_) => "signaling-state",
            PeerEvent::NegotiationNeeded => "negotiation-needed",
            PeerEvent::StreamAdded(_) => "add-stream",
            PeerEvent::StreamRemoved(_) => "remove-stream",
            PeerEvent::SessionDescriptionSet(_) => "set-session-description",
        }
    }
}
