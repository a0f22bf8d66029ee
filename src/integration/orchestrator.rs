//! Orchestrator for the widget to avatar pipeline
//!
//! Connects all components: Widget -> TextAggregator -> SessionSpeaker -> Avatar

use crate::heygen::AvatarApi;
use crate::integration::config::BridgeConfig;
use crate::messages::UtteranceLog;
use crate::relay::{SpeechSink, TextAggregator};
use crate::session::{AvatarSession, PeerFactory, SessionSpeaker};
use crate::widget::{WidgetAdapter, WidgetEvent};
use crate::{BridgeError, Result};
use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 100;

/// Commands that can be sent to the bridge
#[derive(Debug, Clone)]
pub enum BridgeCommand {
    /// Open and start a new avatar session
    Start,

    /// Speak into an existing session
    Attach(String),

    /// Event from the chat widget
    Widget(WidgetEvent),

    /// Close the current session
    Close,

    /// Close the current session and stop the bridge
    Shutdown,
}

/// Events emitted by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The vendor created a session
    SessionOpened { session_id: String },

    /// The session is streaming and ready to speak
    SessionStarted { session_id: String },

    /// Widget events are now relayed to the session
    WidgetReady { process_id: String },

    /// A flushed batch was accepted by the avatar
    Spoken { text: String },

    /// Message to show to the user as-is
    ErrorDisplay(String),

    /// An error occurred
    Error(String),

    /// The session was closed
    Closed { session_id: String },

    /// Bridge has shut down
    Shutdown,
}

/// Handle for controlling the bridge
#[derive(Clone)]
pub struct BridgeHandle {
    command_tx: UnboundedSender<BridgeCommand>,
    event_rx: Receiver<BridgeEvent>,
    utterances: UtteranceLog,
}

impl BridgeHandle {
    /// Send a command to the bridge
    pub fn send_command(&self, cmd: BridgeCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| BridgeError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Try to receive an event from the bridge
    pub fn try_recv_event(&self) -> Option<BridgeEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get the event receiver
    pub fn event_receiver(&self) -> Receiver<BridgeEvent> {
        self.event_rx.clone()
    }

    /// Everything the avatar was asked to say
    pub fn utterances(&self) -> UtteranceLog {
        self.utterances.clone()
    }
}

fn emit(event_tx: &Sender<BridgeEvent>, event: BridgeEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => warn!("Event queue full, dropping {:?}", event),
        Err(TrySendError::Disconnected(_)) => debug!("No event receiver"),
    }
}

/// Speaker that reports accepted batches as events
struct ReportingSpeaker {
    speaker: SessionSpeaker,
    event_tx: Sender<BridgeEvent>,
}

#[async_trait]
impl SpeechSink for ReportingSpeaker {
    async fn speak(&self, text: String) -> Result<()> {
        self.speaker.speak(text.clone()).await?;
        emit(&self.event_tx, BridgeEvent::Spoken { text });
        Ok(())
    }
}

/// A started session with its relay wiring
struct ActiveSession {
    session: AvatarSession,
    aggregator: TextAggregator,
    adapter: WidgetAdapter,
}

/// Main orchestrator that owns the session and relays widget text into it
pub struct Bridge {
    config: BridgeConfig,
    api: Arc<dyn AvatarApi>,
    peers: Arc<dyn PeerFactory>,
    command_rx: UnboundedReceiver<BridgeCommand>,
    event_tx: Sender<BridgeEvent>,
    error_tx: UnboundedSender<BridgeError>,
    error_rx: UnboundedReceiver<BridgeError>,
    utterances: UtteranceLog,
    active: Option<ActiveSession>,
}

impl Bridge {
    /// Create a new bridge with the given configuration
    pub fn new(
        config: BridgeConfig,
        api: Arc<dyn AvatarApi>,
        peers: Arc<dyn PeerFactory>,
    ) -> (Self, BridgeHandle) {
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);
        let (error_tx, error_rx) = unbounded_channel();
        let utterances = UtteranceLog::new();

        let handle = BridgeHandle {
            command_tx,
            event_rx,
            utterances: utterances.clone(),
        };

        let bridge = Self {
            config,
            api,
            peers,
            command_rx,
            event_tx,
            error_tx,
            error_rx,
            utterances,
            active: None,
        };

        (bridge, handle)
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) -> Result<()> {
        info!("Bridge started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(BridgeCommand::Shutdown) => {
                        info!("Bridge shutdown requested");
                        self.close().await;
                        emit(&self.event_tx, BridgeEvent::Shutdown);
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        warn!("Command channel disconnected");
                        self.close().await;
                        break;
                    }
                },
                Some(err) = self.error_rx.recv() => {
                    emit(&self.event_tx, BridgeEvent::Error(err.to_string()));
                }
            }
        }

        info!("Bridge stopped");
        Ok(())
    }

    async fn handle(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::Start => self.start().await,
            BridgeCommand::Attach(session_id) => self.attach(session_id),
            BridgeCommand::Widget(event) => match &self.active {
                Some(active) => {
                    active.adapter.handle_event(&event);
                }
                None => debug!("No session yet, dropping widget event {}", event.kind),
            },
            BridgeCommand::Close => self.close().await,
            // Handled by the run loop
            BridgeCommand::Shutdown => {}
        }
    }

    async fn start(&mut self) {
        if let Some(active) = &self.active {
            warn!("Session {} already running", active.session.session_id());
            return;
        }

        let opened = AvatarSession::open(
            Arc::clone(&self.api),
            self.peers.as_ref(),
            &self.config.avatar,
            self.config.media.clone(),
        )
        .await;

        let session = match opened {
            Ok(session) => session,
            Err(e) => return self.report(e),
        };
        emit(
            &self.event_tx,
            BridgeEvent::SessionOpened {
                session_id: session.session_id().to_string(),
            },
        );

        if let Err(e) = session.start().await {
            self.report(e);
            if let Err(close_err) = session.close().await {
                warn!("Failed to close session: {}", close_err);
            }
            return;
        }

        self.activate(session);
    }

    fn attach(&mut self, session_id: String) {
        if let Some(active) = &self.active {
            warn!("Session {} already running", active.session.session_id());
            return;
        }

        let session = AvatarSession::attach(
            Arc::clone(&self.api),
            session_id,
            self.config.media.clone(),
        );
        self.activate(session);
    }

    fn activate(&mut self, session: AvatarSession) {
        let session_id = session.session_id().to_string();

        let sink = ReportingSpeaker {
            speaker: session.speaker().with_log(self.utterances.clone()),
            event_tx: self.event_tx.clone(),
        };
        let aggregator = match TextAggregator::with_error_channel(
            self.config.relay.clone(),
            Arc::new(sink),
            self.error_tx.clone(),
        ) {
            Ok(aggregator) => aggregator,
            Err(e) => return self.report(e),
        };

        let adapter = WidgetAdapter::new(self.config.widget.clone())
            .with_listener(Arc::new(aggregator.clone()));

        emit(
            &self.event_tx,
            BridgeEvent::SessionStarted {
                session_id: session_id.clone(),
            },
        );
        emit(
            &self.event_tx,
            BridgeEvent::WidgetReady {
                process_id: self.config.widget.process_id.clone(),
            },
        );
        debug!("Widget boot options: {}", self.config.widget.boot_options());
        info!("Relaying widget messages to session {}", session_id);

        self.active = Some(ActiveSession {
            session,
            aggregator,
            adapter,
        });
    }

    async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            debug!("No session to close");
            return;
        };

        // Pending text is dropped; speech already sent gets to finish
        active.aggregator.dispose();
        let grace = Duration::from_secs(self.config.api.timeout_secs);
        if !active.aggregator.settle(grace).await {
            warn!("Speech still in flight after {:?}, stopping anyway", grace);
        }
        while let Ok(err) = self.error_rx.try_recv() {
            emit(&self.event_tx, BridgeEvent::Error(err.to_string()));
        }

        if let Err(e) = active.session.close().await {
            error!("Failed to stop session: {}", e);
        }

        emit(
            &self.event_tx,
            BridgeEvent::Closed {
                session_id: active.session.session_id().to_string(),
            },
        );
    }

    fn report(&self, err: BridgeError) {
        error!("{}", err);
        let event = match &err {
            BridgeError::BadRequest(_) => BridgeEvent::ErrorDisplay(err.user_message()),
            _ => BridgeEvent::Error(err.to_string()),
        };
        emit(&self.event_tx, event);
    }
}
