use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::PeerTransport;
use crate::domain::value_objects::ConnectionState;

/// One negotiated peer connection
pub struct PeerSession {
    id: String,
    sequence: u64,
    created_at: Instant,
    transport: Arc<dyn PeerTransport>,
    state: Mutex<ConnectionState>,
    closed: AtomicBool,
}

impl PeerSession {
    pub fn new(sequence: u64, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sequence,
            created_at: Instant::now(),
            transport,
            state: Mutex::new(ConnectionState::New),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insertion order; lower is older
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn transport(&self) -> &Arc<dyn PeerTransport> {
        &self.transport
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a transition reported by the transport, returning the previous state.
    /// Once closed, later reports are ignored.
    pub fn record_state(&self, state: ConnectionState) -> ConnectionState {
        let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let previous = *current;
        if previous != ConnectionState::Closed {
            *current = state;
        }
        previous
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear down the transport.
    ///
    /// Only the first call reaches the transport and returns `Ok(true)`;
    /// every later call is a no-op returning `Ok(false)`. A transport error
    /// still leaves the session closed.
    pub async fn close(&self) -> Result<bool> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let result = self.transport.close().await;
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Closed;

        result
            .map(|_| true)
            .map_err(|e| DomainError::SessionClose(e.to_string()))
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{FrameStream, StateListener};
    use crate::domain::value_objects::{
        AudioFrame, CodecCapability, MediaKind, SessionDescription, VideoFrame,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingTransport {
        closes: AtomicUsize,
        fail_close: bool,
    }

    #[async_trait]
    impl PeerTransport for CountingTransport {
        fn on_state_change(&self, _listener: StateListener) {}

        async fn add_video(
            &self,
            _frames: Box<dyn FrameStream<VideoFrame>>,
            _codecs: Option<Vec<CodecCapability>>,
        ) -> Result<()> {
            Ok(())
        }

        async fn add_audio(&self, _frames: Box<dyn FrameStream<AudioFrame>>) -> Result<()> {
            Ok(())
        }

        async fn set_remote_description(&self, _offer: SessionDescription) -> Result<()> {
            Ok(())
        }

        async fn remote_media_kinds(&self) -> Vec<MediaKind> {
            Vec::new()
        }

        async fn create_answer(&self) -> Result<SessionDescription> {
            Ok(SessionDescription::answer("v=0"))
        }

        async fn set_local_description(
            &self,
            answer: SessionDescription,
        ) -> Result<SessionDescription> {
            Ok(answer)
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(DomainError::SessionClose("transport already failed".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = Arc::new(CountingTransport::default());
        let session = PeerSession::new(0, transport.clone());

        assert!(session.close().await.unwrap());
        assert!(!session.close().await.unwrap());
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_failed_close_still_marks_closed() {
        let transport = Arc::new(CountingTransport {
            fail_close: true,
            ..Default::default()
        });
        let session = PeerSession::new(0, transport.clone());

        assert!(session.close().await.is_err());
        assert!(session.is_closed());
        assert!(!session.close().await.unwrap());
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_record_state_returns_previous() {
        let session = PeerSession::new(3, Arc::new(CountingTransport::default()));
        assert_eq!(session.record_state(ConnectionState::Connecting), ConnectionState::New);
        assert_eq!(session.record_state(ConnectionState::Connected), ConnectionState::Connecting);
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.sequence(), 3);
    }

    #[test]
    fn test_sessions_have_unique_ids() {
        let a = PeerSession::new(0, Arc::new(CountingTransport::default()));
        let b = PeerSession::new(1, Arc::new(CountingTransport::default()));
        assert_ne!(a.id(), b.id());
    }
}
