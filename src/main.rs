use anyhow::{anyhow, Result};
use rtcbond::bond::{HeartbeatBondFactory, HeartbeatConfig, LivenessBond};
use rtcbond::shared::{ConnectionState, DataChannel, MediaStream, PeerEvent, SignalingState};
use rtcbond::source::{BridgeOptions, LaunchSpec, LoopbackSourceFactory};
use rtcbond::{
    Connection, ConnectionOptions, Registry, RegistryConfig, RegistryHandler, ServerHandle,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs hooks and refuses data channels whose label starts with '_'
struct DemoHandler;

impl RegistryHandler for DemoHandler {
    fn on_connection_deleted(&self, connection: &Connection) {
        info!(
            "[APP] {} deleted ({} bridge(s) open)",
            connection,
            connection.secondary_bond_count()
        );
    }

    fn on_data_channel(&self, connection: &Connection, channel: &DataChannel) -> bool {
        let accept = !channel.label.starts_with('_');
        info!("[APP] {} data channel \"{}\" accepted={}", connection, channel.label, accept);
        accept
    }

    fn on_negotiation_needed(&self, connection: &Connection) {
        info!("[APP] {} negotiation needed", connection);
    }

    fn on_signaling_state_change(&self, connection: &Connection, state: SignalingState) {
        info!("[APP] {} signaling state {:?}", connection, state);
    }

    fn on_add_stream(&self, connection: &Connection, stream: &MediaStream) {
        info!("[APP] {} stream \"{}\" added", connection, stream.label);
    }
}

/// Stand-in for the signaling server the registry owns
struct SignalingServer;

impl ServerHandle for SignalingServer {
    fn name(&self) -> &str {
        "signaling"
    }

    fn shutdown(&self) -> Result<()> {
        info!("[SIGNALING] stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let bonds = Arc::new(HeartbeatBondFactory::new(HeartbeatConfig {
        heartbeat_timeout: Duration::from_secs(2),
        heartbeat_period: Duration::from_millis(250),
    }));
    let sources = Arc::new(LoopbackSourceFactory::new());
    let config = RegistryConfig {
        namespace: Some("/robot".into()),
        ..Default::default()
    };

    info!("Registry starting: {}", config.id);
    let registry = Registry::new(config, Arc::new(DemoHandler), sources.clone(), bonds.clone());
    registry.add_server(Box::new(SignalingServer));

    let pc = registry.create(
        "session-1",
        "peer-1",
        ConnectionOptions::new().with_bond_timeout(Duration::from_secs(2)),
    )?;
    let source = sources
        .source(pc.key())
        .ok_or_else(|| anyhow!("No loopback source for {}", pc.key()))?;

    source.emit(PeerEvent::NegotiationNeeded);
    source.emit(PeerEvent::SignalingStateChanged(SignalingState::HaveRemoteOffer));
    source.emit(PeerEvent::StreamAdded(MediaStream::new("camera")));
    source.emit(PeerEvent::DataChannelOpened(DataChannel::new("_internal")));
    source.emit(PeerEvent::DataChannelOpened(DataChannel::new("chat")));

    let launch = LaunchSpec::new("rosbridge_server").arg("--port").arg("0");
    let bridge_options = BridgeOptions {
        timeout: Duration::from_secs(3),
        heartbeat: Some(Duration::from_millis(250)),
    };
    let bridge = pc.open_bridge("rosbridge", &launch, &bridge_options)?;

    // Play the remote ends of both bonds for a while, then go quiet
    let mut bond_ids = vec![pc.key().bond_id(pc.namespace())];
    bond_ids.extend(bridge.as_ref().map(|bond| bond.id().to_string()));

    let mut ticker = interval(Duration::from_millis(500));
    for _ in 0..6 {
        ticker.tick().await;
        for id in &bond_ids {
            if !bonds.observe(id) {
                warn!("[MAIN] no live bond {}", id);
            }
        }
    }
    info!("[MAIN] remote peer going quiet ...");

    timeout(Duration::from_secs(10), async {
        while pc.state() != ConnectionState::Deleted {
            ticker.tick().await;
        }
    })
    .await
    .map_err(|_| anyhow!("{} still {} after bonds lapsed", pc, pc.state()))?;

    if let Some(trigger) = pc.teardown_trigger() {
        info!("[MAIN] {} torn down: {}", pc, trigger);
    }
    info!("[MAIN] peer state: {:?}", pc.peer_state());
    info!("[MAIN] {} connection(s) left", registry.len());

    registry.shutdown();
    Ok(())
}
