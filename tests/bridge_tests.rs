//! End-to-end tests for the widget to avatar bridge
//!
//! The first group drives the bridge with in-process fakes and tokio's paused
//! clock. The last test talks to a mock HTTP server through the real client.

use async_trait::async_trait;
use avatar_bridge::heygen::{
    ApiConfig, AvatarApi, HeyGenClient, NewSessionRequest, SessionInfo,
};
use avatar_bridge::integration::{Bridge, BridgeCommand, BridgeConfig, BridgeEvent, BridgeHandle};
use avatar_bridge::session::{
    IceCandidateInit, IceServer, IceUrls, PeerConnection, PeerFactory, SessionDescription,
};
use avatar_bridge::widget::{JsonLinesSource, WidgetEvent};
use avatar_bridge::{BridgeError, Result};
use mockito::Matcher;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn bot_line(text: &str) -> String {
    serde_json::json!({
        "type": "message_received",
        "detail": { "type": "SEND_MESSAGE", "payload": { "text": text } }
    })
    .to_string()
}

fn bot_event(text: &str) -> WidgetEvent {
    serde_json::from_str(&bot_line(text)).unwrap()
}

fn drain(handle: &BridgeHandle) -> Vec<BridgeEvent> {
    std::iter::from_fn(|| handle.try_recv_event()).collect()
}

#[derive(Default)]
struct RecordingApi {
    calls: Mutex<Vec<String>>,
    fail_start: bool,
    speak_delay: Duration,
}

impl RecordingApi {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("speak:").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl AvatarApi for RecordingApi {
    async fn new_session(&self, request: &NewSessionRequest) -> Result<SessionInfo> {
        self.calls.lock().push(format!("new:{}", request.avatar_name));
        Ok(SessionInfo {
            session_id: "s-1".into(),
            sdp: SessionDescription::offer("offer-sdp"),
            ice_servers: vec![IceServer {
                urls: IceUrls::Many(vec!["stun:stun.example.com".into()]),
                username: None,
                credential: None,
            }],
        })
    }

    async fn start_session(&self, session_id: &str, answer: &SessionDescription) -> Result<Value> {
        self.calls.lock().push(format!("start:{}:{}", session_id, answer.sdp));
        if self.fail_start {
            return Err(BridgeError::ServerError {
                endpoint: "/v1/streaming.start".into(),
            });
        }
        Ok(Value::Null)
    }

    async fn send_ice_candidate(&self, session_id: &str, candidate: &IceCandidateInit) -> Result<Value> {
        self.calls.lock().push(format!("ice:{}:{}", session_id, candidate.candidate));
        Ok(Value::Null)
    }

    async fn speak(&self, _session_id: &str, text: &str) -> Result<Value> {
        if !self.speak_delay.is_zero() {
            tokio::time::sleep(self.speak_delay).await;
        }
        // Recorded on completion
        self.calls.lock().push(format!("speak:{}", text));
        Ok(Value::Null)
    }

    async fn stop_session(&self, session_id: &str) -> Result<Value> {
        self.calls.lock().push(format!("stop:{}", session_id));
        Ok(Value::Null)
    }
}

/// Peer that has already gathered two candidates
struct GatheredPeer {
    candidates: Mutex<Option<UnboundedReceiver<IceCandidateInit>>>,
    jitter_target: Mutex<Option<Duration>>,
    closed: Mutex<bool>,
}

impl GatheredPeer {
    fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        for candidate in ["candidate:1", "candidate:2"] {
            let _ = tx.send(IceCandidateInit::new(candidate).with_mid("0", 0));
        }
        Self {
            candidates: Mutex::new(Some(rx)),
            jitter_target: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }
}

#[async_trait]
impl PeerConnection for GatheredPeer {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        assert_eq!(description.sdp, "offer-sdp");
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::answer("answer-sdp"))
    }

    async fn set_local_description(&self, _description: SessionDescription) -> Result<()> {
        Ok(())
    }

    fn take_local_candidates(&self) -> Option<UnboundedReceiver<IceCandidateInit>> {
        self.candidates.lock().take()
    }

    fn set_jitter_buffer_target(&self, target: Duration) {
        *self.jitter_target.lock() = Some(target);
    }

    async fn close(&self) -> Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

struct SinglePeer(Arc<GatheredPeer>);

impl PeerFactory for SinglePeer {
    fn create(&self, _ice_servers: &[IceServer]) -> Result<Arc<dyn PeerConnection>> {
        Ok(self.0.clone())
    }
}

struct NoPeers;

impl PeerFactory for NoPeers {
    fn create(&self, _ice_servers: &[IceServer]) -> Result<Arc<dyn PeerConnection>> {
        Err(BridgeError::PeerError("no media backend".into()))
    }
}

fn config() -> BridgeConfig {
    BridgeConfig::new("key", "anna", "voice-1").with_widget_process("p-1")
}

#[tokio::test(start_paused = true)]
async fn test_start_negotiates_and_speaks_batches() {
    let api = Arc::new(RecordingApi::default());
    let peer = Arc::new(GatheredPeer::new());
    let (bridge, handle) = Bridge::new(config(), api.clone(), Arc::new(SinglePeer(peer.clone())));
    tokio::spawn(bridge.run());

    handle.send_command(BridgeCommand::Start).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        drain(&handle),
        vec![
            BridgeEvent::SessionOpened {
                session_id: "s-1".into()
            },
            BridgeEvent::SessionStarted {
                session_id: "s-1".into()
            },
            BridgeEvent::WidgetReady {
                process_id: "p-1".into()
            },
        ]
    );
    let calls = api.calls();
    assert_eq!(calls[0], "new:anna");
    assert!(calls.contains(&"start:s-1:answer-sdp".to_string()));
    assert!(calls.contains(&"ice:s-1:candidate:1".to_string()));
    assert!(calls.contains(&"ice:s-1:candidate:2".to_string()));
    assert_eq!(*peer.jitter_target.lock(), Some(Duration::from_millis(500)));

    // Spaced closer than the quiet period: one batch
    handle.send_command(BridgeCommand::Widget(bot_event("Hello"))).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.send_command(BridgeCommand::Widget(bot_event("world"))).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Spaced further apart: separate batches
    handle.send_command(BridgeCommand::Widget(bot_event("How are"))).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.send_command(BridgeCommand::Widget(bot_event("you?"))).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(api.spoken(), vec!["Hello world", "How are", "you?"]);
    assert_eq!(handle.utterances().len(), 3);

    handle.send_command(BridgeCommand::Close).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(*peer.closed.lock());
    assert_eq!(api.calls().last().map(String::as_str), Some("stop:s-1"));
    assert_eq!(
        drain(&handle).last(),
        Some(&BridgeEvent::Closed {
            session_id: "s-1".into()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_keeps_first_session() {
    let api = Arc::new(RecordingApi::default());
    let peer = Arc::new(GatheredPeer::new());
    let (bridge, handle) = Bridge::new(config(), api.clone(), Arc::new(SinglePeer(peer)));
    tokio::spawn(bridge.run());

    handle.send_command(BridgeCommand::Start).unwrap();
    handle.send_command(BridgeCommand::Start).unwrap();
    handle.send_command(BridgeCommand::Attach("s-2".into())).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let new_calls = api.calls().iter().filter(|c| c.starts_with("new:")).count();
    assert_eq!(new_calls, 1);
    assert!(!drain(&handle).contains(&BridgeEvent::SessionStarted {
        session_id: "s-2".into()
    }));
}

#[tokio::test(start_paused = true)]
async fn test_peer_failure_stops_vendor_session() {
    let api = Arc::new(RecordingApi::default());
    let (bridge, handle) = Bridge::new(config(), api.clone(), Arc::new(NoPeers));
    tokio::spawn(bridge.run());

    handle.send_command(BridgeCommand::Start).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(api.calls(), vec!["new:anna", "stop:s-1"]);
    assert_eq!(
        drain(&handle),
        vec![BridgeEvent::Error(
            "Peer connection error: no media backend".into()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_start_stops_vendor_session() {
    let api = Arc::new(RecordingApi {
        fail_start: true,
        ..Default::default()
    });
    let peer = Arc::new(GatheredPeer::new());
    let (bridge, handle) = Bridge::new(config(), api.clone(), Arc::new(SinglePeer(peer.clone())));
    tokio::spawn(bridge.run());

    handle.send_command(BridgeCommand::Start).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        drain(&handle),
        vec![
            BridgeEvent::SessionOpened {
                session_id: "s-1".into()
            },
            BridgeEvent::Error("Server error on /v1/streaming.start".into()),
        ]
    );
    let calls = api.calls();
    assert_eq!(calls[0], "new:anna");
    assert!(calls.contains(&"start:s-1:answer-sdp".to_string()));
    assert_eq!(calls.last().map(String::as_str), Some("stop:s-1"));
    assert!(*peer.closed.lock());

    // No session was kept, so widget text goes nowhere
    handle.send_command(BridgeCommand::Widget(bot_event("lost"))).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(api.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_speech_in_flight() {
    let api = Arc::new(RecordingApi {
        speak_delay: Duration::from_secs(1),
        ..Default::default()
    });
    let (bridge, handle) = Bridge::new(config(), api.clone(), Arc::new(NoPeers));
    let bridge_task = tokio::spawn(bridge.run());

    handle.send_command(BridgeCommand::Attach("s-1".into())).unwrap();
    handle.send_command(BridgeCommand::Widget(bot_event("Goodbye"))).unwrap();

    // Quiet period over, speak request outstanding
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(api.calls().is_empty());

    handle.send_command(BridgeCommand::Shutdown).unwrap();
    bridge_task.await.unwrap().unwrap();

    assert_eq!(api.calls(), vec!["speak:Goodbye", "stop:s-1"]);
    let events = drain(&handle);
    assert_eq!(
        &events[events.len() - 3..],
        &[
            BridgeEvent::Spoken {
                text: "Goodbye".into()
            },
            BridgeEvent::Closed {
                session_id: "s-1".into()
            },
            BridgeEvent::Shutdown,
        ]
    );
    assert_eq!(handle.utterances().len(), 1);
}

async fn wait_for<F>(handle: &BridgeHandle, done: F) -> Vec<BridgeEvent>
where
    F: Fn(&BridgeEvent) -> bool,
{
    let mut seen = Vec::new();
    for _ in 0..300 {
        while let Some(event) = handle.try_recv_event() {
            let finished = done(&event);
            seen.push(event);
            if finished {
                return seen;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected event not received, saw {:?}", seen);
}

#[tokio::test]
async fn test_widget_lines_reach_the_task_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let task = server
        .mock("POST", "/v1/streaming.task")
        .match_header("x-api-key", "key")
        .match_body(Matcher::Json(serde_json::json!({
            "session_id": "s-9",
            "text": " Welcome to the tour"
        })))
        .with_status(200)
        .with_body(r#"{"code":100,"data":{"task_id":"t-1"}}"#)
        .expect(1)
        .create_async()
        .await;
    let stop = server
        .mock("POST", "/v1/streaming.stop")
        .match_body(Matcher::Json(serde_json::json!({ "session_id": "s-9" })))
        .with_status(200)
        .with_body(r#"{"code":100,"data":null}"#)
        .create_async()
        .await;

    let config = config()
        .with_quiet_period(Duration::from_millis(50))
        .with_attach_session("s-9");
    let api = HeyGenClient::new(ApiConfig::new("key").with_base_url(server.url())).unwrap();
    let (bridge, handle) = Bridge::new(config, Arc::new(api), Arc::new(NoPeers));
    let bridge_task = tokio::spawn(bridge.run());

    handle.send_command(BridgeCommand::Attach("s-9".into())).unwrap();

    let input = [
        bot_line("## Welcome"),
        r#"{"type":"widget_opened"}"#.to_string(),
        "not json".to_string(),
        String::new(),
        bot_line("to the **tour**"),
    ]
    .join("\n");
    let mut source = JsonLinesSource::new(input.as_bytes());
    while let Some(event) = source.next_event().await.unwrap() {
        handle.send_command(BridgeCommand::Widget(event)).unwrap();
    }
    assert_eq!(source.skipped(), 1);

    let events = wait_for(&handle, |e| matches!(e, BridgeEvent::Spoken { .. })).await;
    // Cleaning leaves the space after the heading marker
    assert_eq!(
        events.last(),
        Some(&BridgeEvent::Spoken {
            text: " Welcome to the tour".into()
        })
    );

    handle.send_command(BridgeCommand::Shutdown).unwrap();
    bridge_task.await.unwrap().unwrap();

    task.assert_async().await;
    stop.assert_async().await;
}
