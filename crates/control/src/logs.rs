use futures::stream::{self, BoxStream, StreamExt};
use jambda_models::LogsConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lazy, finite sequence of log lines for one function.
pub type LogStream = BoxStream<'static, String>;

/// Anything that can produce a log stream for a function.
///
/// A scripted timer source and a real streaming transport both fit here.
pub trait LogSource: Send + Sync {
    fn open(&self, external_id: &str) -> LogStream;
}

/// Replays a fixed script, one line per interval.
#[derive(Debug, Clone)]
pub struct ScriptedLogSource {
    lines: Vec<String>,
    interval: Duration,
}

impl ScriptedLogSource {
    pub fn new(lines: Vec<String>, interval: Duration) -> Self {
        Self { lines, interval }
    }
}

impl From<&LogsConfig> for ScriptedLogSource {
    fn from(config: &LogsConfig) -> Self {
        Self::new(config.script.clone(), Duration::from_millis(config.interval_ms))
    }
}

impl LogSource for ScriptedLogSource {
    fn open(&self, _external_id: &str) -> LogStream {
        let interval = self.interval;
        stream::iter(self.lines.clone())
            .then(move |line| async move {
                tokio::time::sleep(interval).await;
                line
            })
            .boxed()
    }
}

pub type SessionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEventKind {
    Line(String),
    Finished,
}

/// Delivered by a running session to whoever owns the display buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub session: SessionId,
    pub kind: LogEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogState {
    Idle,
    Active(String),
}

struct LogSession {
    id: SessionId,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LogSession {
    fn spawn<F>(id: SessionId, mut stream: LogStream, sink: F) -> Self
    where
        F: Fn(LogEvent) -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        debug!(session = id, "Log session cancelled");
                        return;
                    }
                    next = stream.next() => {
                        let kind = match next {
                            Some(line) => LogEventKind::Line(line),
                            None => LogEventKind::Finished,
                        };
                        let finished = kind == LogEventKind::Finished;
                        if cancelled.is_cancelled()
                            || !sink(LogEvent { session: id, kind })
                            || finished
                        {
                            return;
                        }
                    }
                }
            }
        });

        Self { id, token, handle }
    }

    fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Owns the single active log session and its display buffer.
pub struct LogStreamer {
    source: Arc<dyn LogSource>,
    session: Option<LogSession>,
    next_id: SessionId,
    state: LogState,
    lines: Vec<String>,
}

impl LogStreamer {
    pub fn new(source: Arc<dyn LogSource>) -> Self {
        Self {
            source,
            session: None,
            next_id: 0,
            state: LogState::Idle,
            lines: Vec::new(),
        }
    }

    pub fn state(&self) -> &LogState {
        &self.state
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    /// Cancels any running session, clears the buffer and starts streaming
    /// `external_id`.
    pub fn start<F>(&mut self, external_id: &str, sink: F) -> SessionId
    where
        F: Fn(LogEvent) -> bool + Send + 'static,
    {
        self.cancel_current();
        self.next_id += 1;
        let id = self.next_id;

        self.lines.clear();
        self.lines.push(format!(
            "Initializing log stream for function '{external_id}' ..."
        ));

        let stream = self.source.open(external_id);
        self.session = Some(LogSession::spawn(id, stream, sink));
        self.state = LogState::Active(external_id.to_string());
        debug!(session = id, external_id = %external_id, "Log session started");
        id
    }

    /// Cancels the running session and clears the buffer.
    pub fn stop(&mut self) {
        self.cancel_current();
        self.lines.clear();
        self.state = LogState::Idle;
    }

    fn cancel_current(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }

    /// Applies an event from a session. Events from anything but the current
    /// session are dropped. Returns whether a line was appended.
    pub fn accept(&mut self, event: LogEvent) -> bool {
        if self.session_id() != Some(event.session) {
            debug!(session = event.session, "Dropping event from stale log session");
            return false;
        }

        match event.kind {
            LogEventKind::Line(line) => {
                self.lines.push(line);
                true
            }
            LogEventKind::Finished => {
                if let Some(session) = self.session.take() {
                    debug!(
                        session = session.id,
                        finished = session.handle.is_finished(),
                        "Log session drained"
                    );
                }
                self.state = LogState::Idle;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn script(lines: &[&str]) -> Arc<dyn LogSource> {
        Arc::new(ScriptedLogSource::new(
            lines.iter().map(|line| line.to_string()).collect(),
            Duration::from_millis(10),
        ))
    }

    fn channel_sink(
        tx: mpsc::UnboundedSender<LogEvent>,
    ) -> impl Fn(LogEvent) -> bool + Send + 'static {
        move |event| tx.send(event).is_ok()
    }

    #[tokio::test]
    async fn scripted_source_is_lazy_and_finite() {
        let source = ScriptedLogSource::new(vec!["a".into(), "b".into()], Duration::from_millis(1));
        let lines: Vec<String> = source.open("fn").collect().await;
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn session_delivers_lines_in_order_then_finishes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut streamer = LogStreamer::new(script(&["one", "two", "two"]));

        streamer.start("abc", channel_sink(tx));
        assert_eq!(streamer.state(), &LogState::Active("abc".into()));
        assert_eq!(
            streamer.lines(),
            &["Initializing log stream for function 'abc' ...".to_string()]
        );

        while streamer.state() != &LogState::Idle {
            let event = rx.recv().await.unwrap();
            streamer.accept(event);
        }

        assert_eq!(&streamer.lines()[1..], &["one", "two", "two"]);
    }

    #[tokio::test]
    async fn restarting_discards_previous_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut streamer = LogStreamer::new(script(&["line"]));

        let first = streamer.start("a", channel_sink(tx.clone()));
        let second = streamer.start("b", channel_sink(tx));
        assert_ne!(first, second);
        assert_eq!(streamer.lines().len(), 1);
        assert!(streamer.lines()[0].contains("'b'"));

        while streamer.state() != &LogState::Idle {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.session, second);
            streamer.accept(event);
        }
    }

    #[tokio::test]
    async fn default_script_comes_from_config() {
        let source = ScriptedLogSource::from(&LogsConfig {
            interval_ms: 1,
            ..LogsConfig::default()
        });
        let lines: Vec<String> = source.open("fn").collect().await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Log entry 1: Process started");
    }

    #[test]
    fn stale_events_are_dropped() {
        let mut streamer = LogStreamer::new(script(&[]));
        assert!(!streamer.accept(LogEvent {
            session: 42,
            kind: LogEventKind::Line("late".into()),
        }));
        assert!(streamer.lines().is_empty());
    }
}
