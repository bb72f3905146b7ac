//! Push-only snapshot stream with automatic reconnection.
//!
//! The server sends full snapshots; the client never writes application
//! messages. Only the newest snapshot is kept. After any close, one
//! reconnection attempt follows a fixed delay, until [`StreamChannel::teardown`].

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Result, ViewerError};
use crate::snapshot::Snapshot;

mod ws;

pub use ws::WsConnector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedRetrying,
    TornDown,
}

/// Stream endpoint for a page served from `page_origin`: `wss` for `https`
/// pages, `ws` otherwise, same host and port.
pub fn stream_url(page_origin: &str, path: &str) -> Result<Url> {
    let origin = Url::parse(page_origin)
        .map_err(|e| ViewerError::InvalidArgument(format!("bad origin {page_origin}: {e}")))?;
    let scheme = match origin.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(ViewerError::InvalidArgument(format!(
                "unsupported page scheme: {other}"
            )))
        }
    };
    let host = origin
        .host_str()
        .ok_or_else(|| ViewerError::InvalidArgument(format!("origin has no host: {page_origin}")))?;
    let port = origin.port().map(|p| format!(":{p}")).unwrap_or_default();
    Url::parse(&format!("{scheme}://{host}{port}{path}"))
        .map_err(|e| ViewerError::InvalidArgument(e.to_string()))
}

/// Opens transport sessions. Each session yields text frames; `Err` items
/// other than [`ViewerError::Parse`] end the session.
pub trait Connector {
    type Frames: Stream<Item = Result<String>> + Unpin;

    fn connect(&mut self, url: &Url) -> impl Future<Output = Result<Self::Frames>>;
}

/// Channel events. All methods default to no-ops.
pub trait ChannelListener {
    fn on_open(&mut self, _url: &Url) {}
    fn on_message(&mut self, _snapshot: &Snapshot) {}
    fn on_close(&mut self, _reason: Option<&ViewerError>) {}
}

impl ChannelListener for () {}

/// Holds at most one snapshot: the newest one not yet taken.
#[derive(Debug, Clone, Default)]
pub struct LatestSnapshot {
    slot: Rc<RefCell<Option<Snapshot>>>,
    received: Rc<Cell<u64>>,
    overwritten: Rc<Cell<u64>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any snapshot not yet taken. Returns true if one was replaced.
    pub fn store(&self, snapshot: Snapshot) -> bool {
        self.received.set(self.received.get() + 1);
        let replaced = self.slot.borrow_mut().replace(snapshot).is_some();
        if replaced {
            self.overwritten.set(self.overwritten.get() + 1);
        }
        replaced
    }

    pub fn take(&self) -> Option<Snapshot> {
        self.slot.borrow_mut().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Snapshots received in total.
    pub fn received(&self) -> u64 {
        self.received.get()
    }

    /// Snapshots replaced before anyone took them.
    pub fn overwritten(&self) -> u64 {
        self.overwritten.get()
    }
}

#[derive(Debug)]
struct Shared {
    state: Cell<ConnectionState>,
    torn_down: Cell<bool>,
    attempts: Cell<u64>,
    latest: LatestSnapshot,
}

#[derive(Debug)]
pub struct StreamChannel {
    url: Url,
    shared: Rc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl StreamChannel {
    /// Starts connecting immediately. Must be called from within a
    /// [`tokio::task::LocalSet`].
    pub fn connect<C, L>(url: Url, connector: C, listener: L, reconnect_delay: Duration) -> Self
    where
        C: Connector + 'static,
        L: ChannelListener + 'static,
    {
        let shared = Rc::new(Shared {
            state: Cell::new(ConnectionState::Connecting),
            torn_down: Cell::new(false),
            attempts: Cell::new(0),
            latest: LatestSnapshot::new(),
        });
        let task = tokio::task::spawn_local(run(
            url.clone(),
            connector,
            listener,
            Rc::clone(&shared),
            reconnect_delay,
        ));
        Self {
            url,
            shared,
            task: Some(task),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Connection attempts made so far, including the first.
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.get()
    }

    pub fn latest(&self) -> LatestSnapshot {
        self.shared.latest.clone()
    }

    /// Closes the connection for good. Idempotent.
    pub fn teardown(&mut self) {
        self.shared.torn_down.set(true);
        if let Some(task) = self.task.take() {
            task.abort();
            info!(url = %self.url, "stream torn down");
        }
        self.shared.state.set(ConnectionState::TornDown);
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run<C, L>(
    url: Url,
    mut connector: C,
    mut listener: L,
    shared: Rc<Shared>,
    reconnect_delay: Duration,
) where
    C: Connector,
    L: ChannelListener,
{
    // One session at a time: the retry is only armed once the previous
    // session has fully ended, so close events never stack timers.
    while !shared.torn_down.get() {
        shared.state.set(ConnectionState::Connecting);
        let attempt = shared.attempts.get() + 1;
        shared.attempts.set(attempt);
        debug!(%url, attempt, "connecting to snapshot stream");

        let reason = match connector.connect(&url).await {
            Ok(mut frames) => {
                shared.state.set(ConnectionState::Open);
                info!(%url, attempt, "snapshot stream open");
                listener.on_open(&url);
                read_frames(&mut frames, &shared, &mut listener).await
            }
            Err(e) => Some(e),
        };
        if shared.torn_down.get() {
            break;
        }

        shared.state.set(ConnectionState::ClosedRetrying);
        let delay_ms = reconnect_delay.as_millis() as u64;
        match &reason {
            Some(e) => warn!(%url, error = %e, delay_ms, "stream closed; reconnecting"),
            None => info!(%url, delay_ms, "stream closed; reconnecting"),
        }
        listener.on_close(reason.as_ref());
        tokio::time::sleep(reconnect_delay).await;
    }
    shared.state.set(ConnectionState::TornDown);
}

/// Reads until the session ends. Returns the error that ended it, if any.
async fn read_frames<S, L>(frames: &mut S, shared: &Shared, listener: &mut L) -> Option<ViewerError>
where
    S: Stream<Item = Result<String>> + Unpin,
    L: ChannelListener,
{
    while let Some(frame) = frames.next().await {
        if shared.torn_down.get() {
            return None;
        }
        match frame.and_then(|text| Snapshot::parse(&text)) {
            Ok(snapshot) => {
                listener.on_message(&snapshot);
                if shared.latest.store(snapshot) {
                    trace!("replaced snapshot that was never rendered");
                }
            }
            Err(ViewerError::Parse(msg)) => warn!(error = %msg, "dropping malformed snapshot"),
            Err(e) => return Some(e),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::pin::Pin;

    use futures_util::stream;

    use super::*;

    type Frames = Pin<Box<dyn Stream<Item = Result<String>>>>;

    enum Session {
        Refuse,
        /// Yields the frames, then ends (server close).
        Frames(Vec<Result<String>>),
        /// Yields the frames, then stays open.
        Hold(Vec<Result<String>>),
    }

    struct Scripted {
        sessions: VecDeque<Session>,
    }

    impl Scripted {
        fn new(sessions: impl IntoIterator<Item = Session>) -> Self {
            Self {
                sessions: sessions.into_iter().collect(),
            }
        }
    }

    impl Connector for Scripted {
        type Frames = Frames;

        fn connect(&mut self, _url: &Url) -> impl Future<Output = Result<Frames>> {
            let session = self.sessions.pop_front().unwrap_or(Session::Refuse);
            async move {
                match session {
                    Session::Refuse => Err(ViewerError::Transport("connection refused".into())),
                    Session::Frames(frames) => Ok(Box::pin(stream::iter(frames)) as Frames),
                    Session::Hold(frames) => {
                        Ok(Box::pin(stream::iter(frames).chain(stream::pending())) as Frames)
                    }
                }
            }
        }
    }

    #[derive(Default, Clone)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl ChannelListener for Recorder {
        fn on_open(&mut self, _url: &Url) {
            self.events.borrow_mut().push("open".into());
        }
        fn on_message(&mut self, snapshot: &Snapshot) {
            self.events
                .borrow_mut()
                .push(format!("gen {}", snapshot.generation()));
        }
        fn on_close(&mut self, reason: Option<&ViewerError>) {
            let label = match reason {
                Some(_) => "close (error)",
                None => "close",
            };
            self.events.borrow_mut().push(label.into());
        }
    }

    fn frame(generation: u64) -> Result<String> {
        Ok(format!(
            r#"{{"width":8,"height":8,"depth":8,"generation":{generation},"population":1,"cells":[{{"x":1,"y":1,"z":1}}]}}"#
        ))
    }

    fn url() -> Url {
        Url::parse("ws://localhost:8080/ws").unwrap()
    }

    const DELAY: Duration = Duration::from_millis(2000);

    async fn in_local<F: Future>(f: F) -> F::Output {
        tokio::task::LocalSet::new().run_until(f).await
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn url_follows_page_scheme() {
        assert_eq!(
            stream_url("https://life.example.com", "/ws").unwrap().as_str(),
            "wss://life.example.com/ws"
        );
        assert_eq!(
            stream_url("http://localhost:8080/index.html", "/ws")
                .unwrap()
                .as_str(),
            "ws://localhost:8080/ws"
        );
        assert_eq!(
            stream_url("http://127.0.0.1:3000", "/live").unwrap().as_str(),
            "ws://127.0.0.1:3000/live"
        );
        assert!(stream_url("file:///tmp/index.html", "/ws").is_err());
        assert!(stream_url("not a url", "/ws").is_err());
    }

    #[test]
    fn latest_slot_keeps_only_newest() {
        let latest = LatestSnapshot::new();
        let a = Snapshot::parse(&frame(1).unwrap()).unwrap();
        let b = Snapshot::parse(&frame(2).unwrap()).unwrap();
        assert!(!latest.store(a));
        assert!(latest.store(b));
        assert_eq!(latest.take().map(|s| s.generation()), Some(2));
        assert!(latest.take().is_none());
        assert_eq!((latest.received(), latest.overwritten()), (2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_messages_leave_only_the_last() {
        in_local(async {
            let recorder = Recorder::default();
            let channel = StreamChannel::connect(
                url(),
                Scripted::new([Session::Hold(vec![frame(1), frame(2)])]),
                recorder.clone(),
                DELAY,
            );
            advance(10).await;

            assert_eq!(channel.state(), ConnectionState::Open);
            assert_eq!(*recorder.events.borrow(), vec!["open", "gen 1", "gen 2"]);
            assert_eq!(channel.latest().take().map(|s| s.generation()), Some(2));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped_without_closing() {
        in_local(async {
            let channel = StreamChannel::connect(
                url(),
                Scripted::new([Session::Hold(vec![
                    frame(1),
                    Ok("{\"cells\": 5}".into()),
                    Err(ViewerError::Parse("invalid utf-8".into())),
                    frame(3),
                ])]),
                (),
                DELAY,
            );
            advance(10).await;

            assert_eq!(channel.state(), ConnectionState::Open);
            assert_eq!(channel.attempts(), 1);
            let latest = channel.latest();
            assert_eq!(latest.received(), 2);
            assert_eq!(latest.take().map(|s| s.generation()), Some(3));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn one_reconnect_per_close_after_delay() {
        in_local(async {
            let recorder = Recorder::default();
            let channel = StreamChannel::connect(
                url(),
                Scripted::new([
                    Session::Frames(vec![frame(1)]),
                    Session::Hold(vec![frame(7)]),
                ]),
                recorder.clone(),
                DELAY,
            );
            advance(10).await;
            assert_eq!(channel.state(), ConnectionState::ClosedRetrying);
            assert_eq!(channel.attempts(), 1);

            advance(1500).await;
            assert_eq!(channel.attempts(), 1);

            advance(1000).await;
            assert_eq!(channel.attempts(), 2);
            assert_eq!(channel.state(), ConnectionState::Open);
            assert_eq!(
                *recorder.events.borrow(),
                vec!["open", "gen 1", "close", "open", "gen 7"]
            );
            assert_eq!(channel.latest().take().map(|s| s.generation()), Some(7));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_errors_do_not_multiply_retries() {
        in_local(async {
            let channel = StreamChannel::connect(
                url(),
                Scripted::new([Session::Frames(vec![
                    Err(ViewerError::Transport("reset".into())),
                    Err(ViewerError::Transport("reset".into())),
                    Err(ViewerError::Transport("closed".into())),
                ])]),
                (),
                DELAY,
            );
            advance(1990).await;
            assert_eq!(channel.attempts(), 1);
            assert_eq!(channel.state(), ConnectionState::ClosedRetrying);

            // Every later attempt is refused: one per delay period.
            advance(5000).await;
            assert_eq!(channel.attempts(), 4);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_reconnecting() {
        in_local(async {
            let mut channel =
                StreamChannel::connect(url(), Scripted::new([Session::Refuse]), (), DELAY);
            advance(10).await;
            assert_eq!(channel.state(), ConnectionState::ClosedRetrying);

            channel.teardown();
            assert_eq!(channel.state(), ConnectionState::TornDown);
            advance(10_000).await;
            assert_eq!(channel.attempts(), 1);
            assert_eq!(channel.state(), ConnectionState::TornDown);
            channel.teardown();
        })
        .await;
    }
}
