// Drives a capture device through a learning session
//
// start -> poll every interval until a capture, a stop, or the timeout.
// State changes only go through LearningState::on so the legal transitions
// are all in one table.

use crate::codec::IrCodec;
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A device that can record an IR burst
///
/// Connection, discovery and authentication are the implementor's business.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Put the device into learning mode
    async fn enter_learning(&self) -> Result<()>;

    /// Raw capture bytes if the device has recorded something
    async fn check_data(&self) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningState {
    Idle,
    Learning,
    CodeReceived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningEvent {
    Start,
    Stop,
    CodeCaptured,
    TimedOut,
}

impl LearningState {
    /// Next state after `event`, or `None` if the event is not legal here
    pub fn on(self, event: LearningEvent) -> Option<LearningState> {
        use LearningEvent::*;
        use LearningState::*;

        match (self, event) {
            (Learning, Start) => None,
            (Idle | CodeReceived, Start) => Some(Learning),
            (_, Stop) => Some(Idle),
            // a one-shot poll may find a code outside a session
            (_, CodeCaptured) => Some(CodeReceived),
            (Learning, TimedOut) => Some(Idle),
            (Idle | CodeReceived, TimedOut) => None,
        }
    }
}

impl std::fmt::Display for LearningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LearningState::Idle => "idle",
            LearningState::Learning => "learning",
            LearningState::CodeReceived => "code_received",
        };
        write!(f, "{}", s)
    }
}

/// How a learning session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearningOutcome {
    /// Wire code of the captured burst
    Captured(String),
    Cancelled,
    TimedOut,
}

#[derive(Debug)]
struct Session {
    state: LearningState,
    last_code: Option<String>,
}

impl Session {
    fn apply(&mut self, event: LearningEvent) -> bool {
        match self.state.on(event) {
            Some(next) => {
                debug!("Learning state {} -> {} on {:?}", self.state, next, event);
                self.state = next;
                true
            }
            None => false,
        }
    }
}

struct Monitor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<LearningOutcome>>,
}

/// Learning session manager for one capture device
pub struct Learner<D: CaptureDevice + 'static> {
    device: Arc<D>,
    codec: IrCodec,
    timeout: Duration,
    poll_interval: Duration,
    session: Arc<Mutex<Session>>,
    monitor: Mutex<Option<Monitor>>,
}

impl<D: CaptureDevice + 'static> Learner<D> {
    pub fn new(device: Arc<D>, codec: IrCodec, config: &Config) -> Self {
        Self::with_timing(device, codec, config.learning_timeout, config.poll_interval)
    }

    pub fn with_timing(
        device: Arc<D>,
        codec: IrCodec,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            device,
            codec,
            timeout,
            poll_interval,
            session: Arc::new(Mutex::new(Session {
                state: LearningState::Idle,
                last_code: None,
            })),
            monitor: Mutex::new(None),
        }
    }

    /// Put the device in learning mode and start watching for a capture
    ///
    /// # Arguments
    /// * `timeout` - How long to wait; `None` uses the configured timeout
    ///
    /// # Returns
    /// * `Ok(true)` - Session started
    /// * `Ok(false)` - A session is already running
    /// * `Err(IrError)` - The device refused to enter learning mode
    pub async fn start_learning(&self, timeout: Option<Duration>) -> Result<bool> {
        let mut session = self.session.lock().await;

        if session.state == LearningState::Learning {
            warn!("Learning is already active");
            return Ok(false);
        }

        if let Err(e) = self.device.enter_learning().await {
            error!("Failed to start learning: {}", e);
            return Err(e);
        }

        session.apply(LearningEvent::Start);
        session.last_code = None;

        // hold the session until the new monitor is in its slot
        let timeout = timeout.unwrap_or(self.timeout);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor(
            Arc::clone(&self.device),
            self.codec,
            Arc::clone(&self.session),
            cancel.clone(),
            timeout,
            self.poll_interval,
        ));

        let previous = self.monitor.lock().await.replace(Monitor {
            cancel,
            handle: Some(handle),
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        drop(session);

        info!("Learning started (timeout: {}s)", timeout.as_secs_f32());
        Ok(true)
    }

    /// Cancel the running session, if any, and go back to idle
    pub async fn stop_learning(&self) {
        // same lock order as start_learning: session, then monitor
        let mut session = self.session.lock().await;
        if let Some(monitor) = self.monitor.lock().await.as_ref() {
            monitor.cancel.cancel();
        }

        session.apply(LearningEvent::Stop);
        info!("Learning stopped");
    }

    /// Poll the device once, outside the session monitor
    pub async fn get_learned_code(&self) -> Option<String> {
        poll_device(self.device.as_ref(), self.codec, &self.session).await
    }

    /// Wait for the current session's monitor to finish
    ///
    /// Returns `None` if no session was started since the last wait.
    pub async fn wait(&self) -> Option<LearningOutcome> {
        let handle = self.monitor.lock().await.as_mut()?.handle.take()?;

        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Learning monitor failed: {}", e);
                None
            }
        }
    }

    pub async fn state(&self) -> LearningState {
        self.session.lock().await.state
    }

    pub async fn is_learning(&self) -> bool {
        self.state().await == LearningState::Learning
    }

    /// Wire code of the most recent capture
    pub async fn last_learned_code(&self) -> Option<String> {
        self.session.lock().await.last_code.clone()
    }
}

impl<D: CaptureDevice + 'static> Drop for Learner<D> {
    fn drop(&mut self) {
        if let Ok(slot) = self.monitor.try_lock() {
            if let Some(monitor) = slot.as_ref() {
                monitor.cancel.cancel();
            }
        }
    }
}

async fn monitor<D: CaptureDevice + ?Sized>(
    device: Arc<D>,
    codec: IrCodec,
    session: Arc<Mutex<Session>>,
    cancel: CancellationToken,
    timeout: Duration,
    poll_interval: Duration,
) -> LearningOutcome {
    let deadline = Instant::now() + timeout;

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => None,
            polled = async {
                tokio::time::sleep(poll_interval).await;
                poll_device(device.as_ref(), codec, &session).await
            } => Some(polled),
        };

        match polled {
            None => {
                info!("Learning monitor cancelled");
                return LearningOutcome::Cancelled;
            }
            Some(Some(code)) => {
                info!("IR code captured");
                return LearningOutcome::Captured(code);
            }
            Some(None) => {}
        }

        // a one-shot poll may have picked the code up first
        {
            let session = session.lock().await;
            if session.state == LearningState::CodeReceived {
                if let Some(code) = &session.last_code {
                    info!("IR code captured outside the monitor");
                    return LearningOutcome::Captured(code.clone());
                }
            }
        }

        if Instant::now() >= deadline {
            break;
        }
    }

    let mut session = session.lock().await;

    // a stopped session may already have been restarted
    if cancel.is_cancelled() {
        return LearningOutcome::Cancelled;
    }

    session.apply(LearningEvent::TimedOut);
    warn!("Learning timed out after {}s", timeout.as_secs_f32());
    LearningOutcome::TimedOut
}

async fn poll_device<D: CaptureDevice + ?Sized>(
    device: &D,
    codec: IrCodec,
    session: &Mutex<Session>,
) -> Option<String> {
    match device.check_data().await {
        Ok(Some(bytes)) => {
            let code = codec.encode_wire(&bytes);
            let mut session = session.lock().await;
            session.apply(LearningEvent::CodeCaptured);
            session.last_code = Some(code.clone());
            Some(code)
        }
        Ok(None) => {
            debug!("No IR code yet");
            None
        }
        Err(e) => {
            error!("Failed to read learned code: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IrError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const CAPTURE: [u8; 8] = [0x26, 0x00, 0x04, 0x00, 0x1a, 0x00, 0x2b, 0x00];

    /// Returns a capture on the `ready_after`-th poll (never if 0)
    struct FakeDevice {
        polls: AtomicUsize,
        ready_after: usize,
        refuse: AtomicBool,
    }

    impl FakeDevice {
        fn new(ready_after: usize) -> Arc<Self> {
            Arc::new(Self {
                polls: AtomicUsize::new(0),
                ready_after,
                refuse: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CaptureDevice for FakeDevice {
        async fn enter_learning(&self) -> Result<()> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(IrError::Device("not authenticated".to_string()));
            }
            Ok(())
        }

        async fn check_data(&self) -> Result<Option<Vec<u8>>> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.ready_after != 0 && polls == self.ready_after {
                Ok(Some(CAPTURE.to_vec()))
            } else {
                Ok(None)
            }
        }
    }

    fn learner(device: Arc<FakeDevice>, timeout_ms: u64) -> Learner<FakeDevice> {
        Learner::with_timing(
            device,
            IrCodec::new(),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_transition_table() {
        use LearningEvent::*;
        use LearningState::*;

        assert_eq!(Idle.on(Start), Some(Learning));
        assert_eq!(Learning.on(Start), None);
        assert_eq!(Learning.on(CodeCaptured), Some(CodeReceived));
        assert_eq!(Learning.on(TimedOut), Some(Idle));
        assert_eq!(Learning.on(Stop), Some(Idle));
        assert_eq!(CodeReceived.on(Start), Some(Learning));
        assert_eq!(Idle.on(TimedOut), None);
        assert_eq!(CodeReceived.to_string(), "code_received");
    }

    #[tokio::test]
    async fn test_capture() {
        let learner = learner(FakeDevice::new(3), 2_000);

        assert!(learner.start_learning(None).await.unwrap());
        assert!(learner.is_learning().await);

        let outcome = learner.wait().await.unwrap();
        assert_eq!(outcome, LearningOutcome::Captured("JgAEABoAKwA=".to_string()));
        assert_eq!(learner.state().await, LearningState::CodeReceived);
        assert_eq!(learner.last_learned_code().await.as_deref(), Some("JgAEABoAKwA="));
    }

    #[tokio::test]
    async fn test_timeout() {
        let learner = learner(FakeDevice::new(0), 50);

        assert!(learner.start_learning(None).await.unwrap());
        assert_eq!(learner.wait().await, Some(LearningOutcome::TimedOut));
        assert_eq!(learner.state().await, LearningState::Idle);
        assert!(learner.last_learned_code().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_cancels() {
        let learner = learner(FakeDevice::new(0), 5_000);

        assert!(learner.start_learning(None).await.unwrap());
        learner.stop_learning().await;

        assert_eq!(learner.wait().await, Some(LearningOutcome::Cancelled));
        assert_eq!(learner.state().await, LearningState::Idle);
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let learner = learner(FakeDevice::new(0), 5_000);

        assert!(learner.start_learning(None).await.unwrap());
        assert!(!learner.start_learning(None).await.unwrap());

        learner.stop_learning().await;
        assert!(learner.start_learning(Some(Duration::from_millis(30))).await.unwrap());
        assert_eq!(learner.wait().await, Some(LearningOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_device_refuses() {
        let device = FakeDevice::new(0);
        device.refuse.store(true, Ordering::SeqCst);
        let learner = learner(device, 100);

        match learner.start_learning(None).await {
            Err(IrError::Device(_)) => {}
            other => panic!("Expected Device error, got {:?}", other),
        }
        assert_eq!(learner.state().await, LearningState::Idle);
        assert!(learner.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_one_shot_poll_ends_session() {
        let learner = learner(FakeDevice::new(1), 500);

        assert!(learner.start_learning(None).await.unwrap());
        let code = learner.get_learned_code().await;
        assert_eq!(code.as_deref(), Some("JgAEABoAKwA="));

        // the device has nothing left for the monitor to find
        let outcome = learner.wait().await.unwrap();
        assert_eq!(outcome, LearningOutcome::Captured("JgAEABoAKwA=".to_string()));
        assert_eq!(learner.state().await, LearningState::CodeReceived);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_start_and_stop() {
        for _ in 0..50 {
            let learner = Arc::new(learner(FakeDevice::new(0), 5_000));

            let starter = {
                let learner = Arc::clone(&learner);
                tokio::spawn(async move { learner.start_learning(None).await })
            };
            let stopper = {
                let learner = Arc::clone(&learner);
                tokio::spawn(async move { learner.stop_learning().await })
            };
            assert!(starter.await.unwrap().unwrap());
            stopper.await.unwrap();

            if learner.state().await == LearningState::Learning {
                // the stop ran first; this one must reach the new monitor
                learner.stop_learning().await;
            }
            assert_eq!(learner.state().await, LearningState::Idle);

            let outcome = tokio::time::timeout(Duration::from_secs(1), learner.wait())
                .await
                .expect("monitor kept running after stop");
            assert_eq!(outcome, Some(LearningOutcome::Cancelled));
        }
    }

    #[tokio::test]
    async fn test_one_shot_poll() {
        let learner = learner(FakeDevice::new(1), 100);

        let code = learner.get_learned_code().await;
        assert_eq!(code.as_deref(), Some("JgAEABoAKwA="));
        assert_eq!(learner.state().await, LearningState::CodeReceived);
    }
}
