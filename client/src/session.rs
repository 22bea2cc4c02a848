//! Session lifecycle: `NotStarted -> Open -> Closed`.
//!
//! A session owns one transport. `Closed` is terminal; a closed session is
//! never reopened.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, SessionStateError};
use crate::http::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Open,
    Closed,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    fn check_start(self) -> std::result::Result<(), SessionStateError> {
        match self {
            Self::NotStarted => Ok(()),
            Self::Open => Err(SessionStateError::AlreadyRunning),
            Self::Closed => Err(SessionStateError::AlreadyClosed),
        }
    }

    fn check_close(self) -> std::result::Result<(), SessionStateError> {
        match self {
            Self::Open => Ok(()),
            Self::NotStarted => Err(SessionStateError::NotStarted),
            Self::Closed => Err(SessionStateError::AlreadyClosed),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Session<H> {
    http: Arc<H>,
    state: Mutex<SessionState>,
    /// Serializes `start`/`close` so a transition and its transport call are atomic.
    transition: tokio::sync::Mutex<()>,
}

impl<H: HttpClient> Session<H> {
    #[must_use]
    pub fn new(http: H) -> Self {
        Self {
            http: Arc::new(http),
            state: Mutex::new(SessionState::NotStarted),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub async fn start(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        self.state().check_start()?;

        self.http.start().await?;
        self.set_state(SessionState::Open);
        tracing::debug!("Session started");
        Ok(())
    }

    /// Close the session. The state becomes `Closed` even if the transport
    /// fails to shut down cleanly; that failure is still returned.
    pub async fn close(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        self.state().check_close()?;

        self.set_state(SessionState::Closed);
        let closed = self.http.close().await;
        tracing::debug!("Session closed");
        closed
    }

    /// The transport, if the session is open.
    pub fn require_open(&self) -> Result<Arc<H>> {
        match self.state() {
            SessionState::Open => Ok(Arc::clone(&self.http)),
            SessionState::NotStarted | SessionState::Closed => {
                Err(SessionStateError::NotStarted.into())
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl<H> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Session").field("state", &state).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::error::CraftError;
    use crate::http::{HttpFut, HttpResponse};

    #[derive(Default)]
    struct CountingHttp {
        starts: AtomicUsize,
        closes: AtomicUsize,
        close_fails: bool,
    }

    impl HttpClient for CountingHttp {
        fn start(&self) -> HttpFut<'_, ()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn get<'a>(&'a self, url: &'a Url) -> HttpFut<'a, HttpResponse> {
            Box::pin(async move {
                Ok(HttpResponse {
                    status: 200,
                    url: url.to_string(),
                    body: Vec::new(),
                })
            })
        }

        fn close(&self) -> HttpFut<'_, ()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            let fails = self.close_fails;
            Box::pin(async move {
                if fails {
                    return Err(CraftError::Transport {
                        url: "http://localhost/".to_string(),
                        message: "connection reset".to_string(),
                    });
                }
                Ok(())
            })
        }
    }

    fn session_error(result: Result<()>) -> SessionStateError {
        match result {
            Err(CraftError::Session(e)) => e,
            other => panic!("expected session error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_then_close() {
        let session = Session::new(CountingHttp::default());
        assert_eq!(session.state(), SessionState::NotStarted);

        session.start().await.expect("start");
        assert!(session.is_open());
        session.close().await.expect("close");
        assert_eq!(session.state(), SessionState::Closed);

        assert_eq!(session.http.starts.load(Ordering::SeqCst), 1);
        assert_eq!(session.http.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_transport_close_still_closes() {
        let session = Session::new(CountingHttp {
            close_fails: true,
            ..CountingHttp::default()
        });
        session.start().await.expect("start");

        let err = session.close().await.expect_err("transport close fails");
        assert!(matches!(err, CraftError::Transport { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.require_open().is_err());

        assert_eq!(
            session_error(session.close().await),
            SessionStateError::AlreadyClosed
        );
        assert_eq!(session.http.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_before_start_fails() {
        let session = Session::new(CountingHttp::default());
        assert_eq!(
            session_error(session.close().await),
            SessionStateError::NotStarted
        );
        assert_eq!(session.http.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn double_start_fails() {
        let session = Session::new(CountingHttp::default());
        session.start().await.expect("start");
        assert_eq!(
            session_error(session.start().await),
            SessionStateError::AlreadyRunning
        );
        assert_eq!(session.http.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_is_terminal() {
        let session = Session::new(CountingHttp::default());
        session.start().await.expect("start");
        session.close().await.expect("close");

        assert_eq!(
            session_error(session.start().await),
            SessionStateError::AlreadyClosed
        );
        assert_eq!(
            session_error(session.close().await),
            SessionStateError::AlreadyClosed
        );
    }

    #[tokio::test]
    async fn requests_need_an_open_session() {
        let session = Session::new(CountingHttp::default());
        assert!(session.require_open().is_err());

        session.start().await.expect("start");
        assert!(session.require_open().is_ok());

        session.close().await.expect("close");
        assert!(matches!(
            session.require_open(),
            Err(CraftError::Session(SessionStateError::NotStarted))
        ));
    }
}
