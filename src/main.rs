use anyhow::{bail, Result};
use avatar_bridge::heygen::HeyGenClient;
use avatar_bridge::integration::config::env;
use avatar_bridge::integration::{Bridge, BridgeCommand, BridgeConfig, BridgeEvent};
use avatar_bridge::session::{IceServer, PeerConnection, PeerFactory};
use avatar_bridge::widget::JsonLinesSource;
use avatar_bridge::BridgeError;
use std::sync::Arc;
use std::thread;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "AVATAR_BRIDGE_CONFIG";

/// The binary has no media stack; it only speaks into existing sessions
struct NoMediaBackend;

impl PeerFactory for NoMediaBackend {
    fn create(&self, _ice_servers: &[IceServer]) -> avatar_bridge::Result<Arc<dyn PeerConnection>> {
        Err(BridgeError::PeerError("no media backend".to_string()))
    }
}

fn load_config() -> Result<BridgeConfig> {
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            BridgeConfig::from_file(&path)?
        }
        Err(_) => BridgeConfig::default(),
    }
    .apply_env();

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_bridge=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting avatar bridge");

    let config = load_config()?;
    let Some(session_id) = config.media.attach_session_id.clone() else {
        bail!("Set {} to the session the avatar should speak in", env::SESSION_ID);
    };
    let flush_grace = config.relay.quiet_period() * 2;

    let api = Arc::new(HeyGenClient::new(config.api.clone())?);
    let (bridge, handle) = Bridge::new(config, api, Arc::new(NoMediaBackend));
    let bridge_task = tokio::spawn(bridge.run());

    let events = handle.event_receiver();
    thread::spawn(move || {
        for event in events.iter() {
            match event {
                BridgeEvent::Spoken { text } => info!("Spoken: {}", text),
                BridgeEvent::ErrorDisplay(message) => warn!("{}", message),
                BridgeEvent::Error(message) => error!("{}", message),
                other => info!("{:?}", other),
            }
        }
    });

    handle.send_command(BridgeCommand::Attach(session_id))?;

    // Widget events arrive as one JSON object per line
    let mut source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()));
    loop {
        tokio::select! {
            next = source.next_event() => match next {
                Ok(Some(event)) => handle.send_command(BridgeCommand::Widget(event))?,
                Ok(None) => {
                    // Lets the last batch's quiet period run out so it is sent
                    info!("Input closed, waiting for pending text");
                    tokio::time::sleep(flush_grace).await;
                    break;
                }
                Err(e) => {
                    error!("Reading widget events failed: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if source.skipped() > 0 {
        warn!("Skipped {} malformed input lines", source.skipped());
    }

    // Shutdown waits for speech requests already in flight
    handle.send_command(BridgeCommand::Shutdown)?;
    bridge_task.await??;

    let utterances = handle.utterances();
    info!(
        "Relayed {} utterances ({} failed)",
        utterances.len(),
        utterances.failures()
    );

    Ok(())
}
