//! Player actor
//!
//! The single authority over the [`Queue`] and the open audio handle. Client
//! requests and handle completions arrive as messages and are processed one
//! at a time on one task, so queue mutation, handle lifecycle and event
//! emission are totally ordered without locks.
//!
//! **States:**
//! - `Idle`: no handle open
//! - `Active`: exactly one handle open, bound to one queue entry
//!
//! A new handle is only opened from `Idle`, and `Idle` is only re-entered
//! when the open handle reports its completion.

use std::sync::Arc;
use std::time::Duration;

use geisha_common::ipc::{QueueEntryInfo, QueueInfo, ResponseBody, StateInfo};
use geisha_common::{Control, Event, Method, Request, Response};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::{Queue, QueueEntry, Track};
use crate::audio::{
    self, AudioHandle, AudioOutput, CompletionReason, CompletionReceiver, CompletionSender,
};
use crate::error::{Error, Result};
use crate::events::EventBus;

type Command = (Request, oneshot::Sender<Response>);

/// Cloneable client side of the actor's request channel
#[derive(Clone, Debug)]
pub struct PlayerHandle {
    tx: mpsc::Sender<Command>,
}

impl PlayerHandle {
    /// Send `request` and wait for the actor's answer
    pub async fn request(&self, request: Request) -> Result<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| Error::Internal("player actor has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Internal("player actor dropped the request".to_string()))
    }
}

enum PlayerState {
    Idle,
    Active {
        handle: Arc<dyn AudioHandle>,
        entry: QueueEntry,
        /// Teardown reason that decides navigation once the handle completes
        requested: Option<CompletionReason>,
    },
}

/// The actor itself; owned by its task
struct Player {
    queue: Queue,
    state: PlayerState,
    output: Arc<dyn AudioOutput>,
    bus: EventBus,
    completion_tx: CompletionSender,
    completion_rx: CompletionReceiver,
    requests: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
}

/// Start the actor on its own task
///
/// The actor stops on a `Shutdown` request, when `shutdown` is cancelled, or
/// when every [`PlayerHandle`] is dropped. On the way out it cancels
/// `shutdown` so the rest of the daemon follows.
pub fn spawn(
    output: Arc<dyn AudioOutput>,
    bus: EventBus,
    request_queue: usize,
    shutdown: CancellationToken,
) -> (PlayerHandle, JoinHandle<()>) {
    let (tx, requests) = mpsc::channel(request_queue.max(1));
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let player = Player {
        queue: Queue::new(),
        state: PlayerState::Idle,
        output,
        bus,
        completion_tx,
        completion_rx,
        requests,
        shutdown,
    };

    let task = tokio::spawn(player.run());
    (PlayerHandle { tx }, task)
}

impl Player {
    async fn run(mut self) {
        info!("Player actor started");

        loop {
            tokio::select! {
                Some(reason) = self.completion_rx.recv() => self.handle_completion(reason),
                command = self.requests.recv() => {
                    let Some((request, reply)) = command else {
                        debug!("All player handles dropped");
                        break;
                    };
                    let stop = request.method == Method::Shutdown;
                    let response = self.handle_request(request);
                    let _ = reply.send(response);
                    if stop {
                        info!("Shutdown requested by client");
                        break;
                    }
                }
                _ = self.shutdown.cancelled() => break,
            }
        }

        if let PlayerState::Active { handle, .. } = &self.state {
            handle.teardown(CompletionReason::Noop);
        }
        self.shutdown.cancel();
        info!("Player actor stopped");
    }

    fn handle_request(&mut self, request: Request) -> Response {
        let method = request.method;
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                debug!("{:?} failed: {}", method, e);
                Response::err()
            }
        }
    }

    fn dispatch(&mut self, request: Request) -> Result<Response> {
        let Request { method, args } = request;
        debug!("Request {:?} {:?}", method, args);

        match method {
            Method::GetState => {
                return Ok(Response::ok_with(ResponseBody::State(self.state_info())))
            }
            Method::GetQueue => {
                return Ok(Response::ok_with(ResponseBody::Queue(self.queue_info())))
            }
            Method::Subscribe => {
                return Err(Error::BadRequest(
                    "subscribe is handled by the connection".to_string(),
                ))
            }
            Method::PlaySong => self.play_song(&args)?,
            Method::Enqueue => {
                require_args(&args)?;
                for track in args {
                    self.queue.append(Track::from(track));
                }
                self.bus.emit(Event::QueueChange);
                self.try_advance();
            }
            Method::Next => {
                require_args(&args)?;
                let slot = self.queue.next_slot();
                for (offset, track) in args.into_iter().enumerate() {
                    self.queue.insert(slot + offset, Track::from(track));
                }
                self.bus.emit(Event::QueueChange);
                self.try_advance();
            }
            Method::Ctrl => {
                let [code] = args.as_slice() else {
                    return Err(Error::BadRequest(format!(
                        "ctrl takes one argument, got {}",
                        args.len()
                    )));
                };
                let control: Control = code.parse()?;
                self.handle_control(control);
            }
            Method::Sort => {
                self.queue.sort();
                self.bus.emit(Event::QueueChange);
            }
            Method::Shuffle => {
                self.queue.shuffle();
                self.bus.emit(Event::QueueChange);
            }
            Method::Loop => {
                let looping = self.queue.toggle_loop();
                debug!("Loop {}", if looping { "on" } else { "off" });
                self.bus.emit(Event::ModeChange);
                self.try_advance();
            }
            Method::Repeat => {
                let repeat = self.queue.toggle_repeat();
                debug!("Repeat {}", if repeat { "on" } else { "off" });
                self.bus.emit(Event::ModeChange);
                self.try_advance();
            }
            Method::Remove => self.remove(&args)?,
            Method::Clear => {
                self.queue.reset();
                self.bus.emit(Event::QueueChange);
                self.request_teardown(CompletionReason::Noop);
            }
            Method::Shutdown => {}
        }

        Ok(Response::ok())
    }

    fn play_song(&mut self, args: &[String]) -> Result<()> {
        let [arg] = args else {
            return Err(Error::BadRequest(format!(
                "play song takes one id, got {}",
                args.len()
            )));
        };
        let id = parse_id(arg)?;
        let index = self
            .queue
            .find(id)
            .ok_or_else(|| Error::NotFound(format!("no queue entry {id}")))?;

        self.queue.set_cursor(index);
        self.bus.emit(Event::QueueChange);

        if self.is_active() {
            self.request_teardown(CompletionReason::Noop);
        } else {
            self.try_advance();
        }
        Ok(())
    }

    fn remove(&mut self, args: &[String]) -> Result<()> {
        require_args(args)?;
        let ids = args
            .iter()
            .map(|arg| parse_id(arg))
            .collect::<Result<Vec<_>>>()?;

        let bound = self.bound_entry().map(|entry| entry.id);
        let mut removed_bound = false;
        for id in ids {
            // Unknown ids are skipped
            if let Some(index) = self.queue.find(id) {
                self.queue.remove(index);
                removed_bound |= bound == Some(id);
            }
        }

        self.bus.emit(Event::QueueChange);
        if removed_bound {
            // The cursor already sits on whatever follows the removed entry.
            self.request_teardown(CompletionReason::Noop);
        }
        Ok(())
    }

    fn handle_control(&mut self, control: Control) {
        let active = match &self.state {
            PlayerState::Active { handle, .. } => Some(Arc::clone(handle)),
            PlayerState::Idle => None,
        };

        match (active, control) {
            (Some(handle), Control::Play) => handle.play(),
            (Some(handle), Control::Pause) => handle.pause(),
            (Some(handle), Control::Toggle) => handle.toggle(),
            (Some(handle), Control::Fwd) => handle.seek_relative(true),
            (Some(handle), Control::Bwd) => handle.seek_relative(false),
            (Some(handle), Control::Stop) => {
                handle.seek_absolute(Duration::ZERO);
                handle.pause();
            }
            (Some(_), Control::Prev) => self.request_teardown(CompletionReason::Prev),
            (Some(_), Control::Skip) => self.request_teardown(CompletionReason::Skip),
            (None, Control::Prev) => {
                self.queue.advance(-1, true);
                self.try_advance();
            }
            (None, Control::Skip) => {
                self.queue.advance(1, true);
                self.try_advance();
            }
            (None, _) => debug!("{:?} ignored while idle", control),
        }

        self.bus.emit(Event::from(control));
    }

    fn handle_completion(&mut self, delivered: CompletionReason) {
        let PlayerState::Active {
            entry, requested, ..
        } = std::mem::replace(&mut self.state, PlayerState::Idle)
        else {
            warn!("Completion ({:?}) with no open handle", delivered);
            return;
        };

        let reason = requested.unwrap_or(delivered);
        debug!(
            "Entry {} done ({:?}, delivered {:?})",
            entry.id, reason, delivered
        );
        self.bus.emit(Event::SongDone);

        match reason {
            CompletionReason::Prev => self.queue.advance(-1, true),
            CompletionReason::Skip => self.queue.advance(1, true),
            CompletionReason::Natural => self.queue.advance(1, false),
            CompletionReason::Noop => {}
        }
        self.try_advance();
    }

    /// Open the current entry if idle, dropping entries that fail to open
    ///
    /// Bounded by the queue length at entry, so it terminates even when
    /// nothing in the queue is playable.
    fn try_advance(&mut self) {
        if self.is_active() {
            return;
        }

        for _ in 0..self.queue.len() {
            let Some(entry) = self.queue.current().cloned() else {
                break;
            };

            let opened = audio::block_in_place(|| {
                self.output.open(&entry.track, self.completion_tx.clone())
            });
            match opened {
                Ok(handle) => {
                    info!("Playing entry {}: {}", entry.id, entry.track);
                    self.state = PlayerState::Active {
                        handle,
                        entry,
                        requested: None,
                    };
                    self.bus.emit(Event::SongPlay);
                    return;
                }
                Err(e) => {
                    warn!("Dropping unplayable entry {} ({}): {}", entry.id, entry.track, e);
                    if let Some(index) = self.queue.find(entry.id) {
                        self.queue.remove(index);
                    }
                }
            }
        }

        debug!("Nothing to play");
    }

    /// Ask the open handle to stop; the completion arrives later as a message
    fn request_teardown(&mut self, reason: CompletionReason) {
        let PlayerState::Active {
            handle,
            entry,
            requested,
        } = &mut self.state
        else {
            return;
        };

        if let Some(earlier) = *requested {
            // The handle is already going away. A request that placed the
            // cursor itself replaces a pending skip/prev; anything else is
            // dropped.
            if reason == CompletionReason::Noop && earlier != CompletionReason::Noop {
                debug!(
                    "Entry {} teardown now {:?} (was {:?})",
                    entry.id, reason, earlier
                );
                *requested = Some(reason);
            } else {
                debug!(
                    "Teardown of entry {} already requested ({:?}), ignoring {:?}",
                    entry.id, earlier, reason
                );
            }
            return;
        }

        debug!("Tearing down entry {} ({:?})", entry.id, reason);
        *requested = Some(reason);
        let handle = Arc::clone(handle);
        tokio::task::spawn_blocking(move || handle.teardown(reason));
    }

    fn is_active(&self) -> bool {
        matches!(self.state, PlayerState::Active { .. })
    }

    fn bound_entry(&self) -> Option<&QueueEntry> {
        match &self.state {
            PlayerState::Active { entry, .. } => Some(entry),
            PlayerState::Idle => None,
        }
    }

    fn state_info(&self) -> StateInfo {
        let mut info = StateInfo {
            current: -1,
            looping: self.queue.looping(),
            repeat: self.queue.repeat(),
            shuffled: self.queue.shuffled(),
            ..StateInfo::default()
        };

        if let PlayerState::Active { handle, entry, .. } = &self.state {
            let (elapsed, total) = handle.progress();
            info.elapsed = elapsed.as_secs();
            info.total = total.as_secs();
            info.current = entry.id as i64;
            info.path = entry.track.to_string();
            info.paused = handle.is_paused();
        }
        info
    }

    fn queue_info(&self) -> QueueInfo {
        QueueInfo {
            current: self.bound_entry().map_or(-1, |entry| entry.id as i64),
            queue: self
                .queue
                .entries()
                .iter()
                .map(|entry| QueueEntryInfo {
                    id: entry.id,
                    song: entry.track.to_string(),
                })
                .collect(),
        }
    }
}

fn require_args(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err(Error::BadRequest("at least one argument required".to_string()));
    }
    Ok(())
}

fn parse_id(arg: &str) -> Result<u64> {
    arg.trim()
        .parse()
        .map_err(|_| Error::BadRequest(format!("not an entry id: {arg:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert_eq!(parse_id(" 3 ").unwrap(), 3);
        assert!(matches!(parse_id("-1"), Err(Error::BadRequest(_))));
        assert!(matches!(parse_id("abc"), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_require_args() {
        assert!(require_args(&[]).is_err());
        assert!(require_args(&["a.mp3".to_string()]).is_ok());
    }
}
