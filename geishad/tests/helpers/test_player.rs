//! Player actor harness
//!
//! Starts the actor against a [`FakeOutput`] and subscribes to its events
//! before any request is sent, so tests can assert exact event sequences.

use std::sync::Arc;
use std::time::Duration;

use geisha_common::ipc::{QueueInfo, ResponseBody, StateInfo};
use geisha_common::{Control, Event, Method, Request, Response};
use geishad::events::EventBus;
use geishad::playback::{self, PlayerHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::FakeOutput;

/// How long to wait for an expected event
const EVENT_WAIT: Duration = Duration::from_secs(2);

pub struct TestPlayer {
    pub player: PlayerHandle,
    pub bus: EventBus,
    pub output: Arc<FakeOutput>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<()>,
    events: mpsc::Receiver<Event>,
}

impl TestPlayer {
    pub fn start() -> Self {
        Self::start_with(FakeOutput::new())
    }

    pub fn start_with(output: Arc<FakeOutput>) -> Self {
        let bus = EventBus::new(256);
        let events = bus.subscribe();
        let shutdown = CancellationToken::new();
        let (player, task) = playback::spawn(output.clone(), bus.clone(), 8, shutdown.clone());

        Self {
            player,
            bus,
            output,
            shutdown,
            task,
            events,
        }
    }

    pub async fn call(&self, method: Method, args: &[&str]) -> Response {
        self.player
            .request(Request::with_args(method, args.iter().copied()))
            .await
            .expect("player answered")
    }

    /// Call and assert the request succeeded
    pub async fn ok(&self, method: Method, args: &[&str]) {
        let response = self.call(method, args).await;
        assert!(response.is_ok(), "{method:?} {args:?} failed");
    }

    pub async fn ctrl(&self, control: Control) -> Response {
        let code = u8::from(control).to_string();
        self.call(Method::Ctrl, &[code.as_str()]).await
    }

    pub async fn state(&self) -> StateInfo {
        match self.call(Method::GetState, &[]).await.result {
            Some(ResponseBody::State(state)) => state,
            other => panic!("Expected state body, got {other:?}"),
        }
    }

    pub async fn queue(&self) -> QueueInfo {
        match self.call(Method::GetQueue, &[]).await.result {
            Some(ResponseBody::Queue(queue)) => queue,
            other => panic!("Expected queue body, got {other:?}"),
        }
    }

    /// Queue ids in order
    pub async fn queue_ids(&self) -> Vec<u64> {
        self.queue().await.queue.iter().map(|e| e.id).collect()
    }

    /// Assert the next events are exactly `expected`
    pub async fn expect_events(&mut self, expected: &[Event]) {
        for want in expected {
            let got = timeout(EVENT_WAIT, self.events.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
                .expect("event bus closed");
            assert_eq!(got, *want, "expected {want}, got {got}");
        }
    }

    /// Assert nothing else was emitted, using a round trip through the
    /// actor and the bus as a barrier
    pub async fn expect_quiet(&mut self) {
        self.ok(Method::Sort, &[]).await;
        self.expect_events(&[Event::QueueChange]).await;
        assert!(
            self.events.try_recv().is_err(),
            "unexpected event after barrier"
        );
    }
}
