// Per-session countdown timers that broadcast ticks into session rooms.
//
// Each running timer is a tokio task ticking once per second. Starting a
// timer for an id that already has one aborts the old task first. When a
// countdown reaches zero the task removes itself and reports the session id
// on the expiry channel handed out by `SessionTimers::new`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::hub::{session_room, EventHub, ServerEvent};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the expiry notification channel.
const EXPIRY_CHANNEL_CAPACITY: usize = 64;

struct RunningTimer {
    generation: u64,
    task: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<String, RunningTimer>>>;

fn lock(timers: &TimerMap) -> MutexGuard<'_, HashMap<String, RunningTimer>> {
    timers.lock().expect("timer map mutex poisoned")
}

pub struct SessionTimers {
    hub: Arc<EventHub>,
    timers: TimerMap,
    next_generation: AtomicU64,
    expired_tx: mpsc::Sender<String>,
}

impl SessionTimers {
    /// Create the timer registry and the receiver that yields the ids of
    /// sessions whose countdown ran out.
    pub fn new(hub: Arc<EventHub>) -> (Self, mpsc::Receiver<String>) {
        let (expired_tx, expired_rx) = mpsc::channel(EXPIRY_CHANNEL_CAPACITY);
        let timers = SessionTimers {
            hub,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            expired_tx,
        };
        (timers, expired_rx)
    }

    /// Start a countdown of `duration_sec` for `session_id`, replacing any
    /// timer already running for it. Must be called inside a tokio runtime.
    pub fn start(&self, session_id: &str, duration_sec: u64) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut timers = lock(&self.timers);

        if let Some(previous) = timers.remove(session_id) {
            previous.task.abort();
            debug!("Replaced running timer for session {session_id}");
        }

        let task = tokio::spawn(countdown(
            session_id.to_string(),
            duration_sec,
            generation,
            self.hub.clone(),
            self.timers.clone(),
            self.expired_tx.clone(),
        ));
        timers.insert(session_id.to_string(), RunningTimer { generation, task });
        info!("Timer started for session {session_id} ({duration_sec}s)");
    }

    /// Stop the timer for `session_id`. Returns `false` if none was running.
    pub fn stop(&self, session_id: &str) -> bool {
        match lock(&self.timers).remove(session_id) {
            Some(running) => {
                running.task.abort();
                info!("Timer stopped for session {session_id}");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        lock(&self.timers).contains_key(session_id)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Abort every running timer.
    pub fn shutdown(&self) {
        let mut timers = lock(&self.timers);
        let count = timers.len();
        for (_, running) in timers.drain() {
            running.task.abort();
        }
        if count > 0 {
            info!("Stopped {count} running timer(s)");
        }
    }
}

async fn countdown(
    session_id: String,
    duration_sec: u64,
    generation: u64,
    hub: Arc<EventHub>,
    timers: TimerMap,
    expired_tx: mpsc::Sender<String>,
) {
    let room = session_room(&session_id);
    let mut remaining = duration_sec;

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    // The first tick completes immediately.
    interval.tick().await;

    while remaining > 0 {
        interval.tick().await;
        remaining -= 1;
        hub.publish(&room, ServerEvent::TimerTick { remaining_sec: remaining });
    }

    {
        let mut map = lock(&timers);
        // A restart may already have replaced this entry.
        if map.get(&session_id).is_some_and(|t| t.generation == generation) {
            map.remove(&session_id);
        }
    }

    debug!("Countdown finished for session {session_id}");
    if expired_tx.send(session_id.clone()).await.is_err() {
        warn!("Expiry channel closed; session {session_id} will not be marked expired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    async fn next_tick(rx: &mut broadcast::Receiver<ServerEvent>) -> u64 {
        match rx.recv().await.unwrap() {
            ServerEvent::TimerTick { remaining_sec } => remaining_sec,
            other => panic!("expected timer tick, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_count_down_to_zero_then_expire() {
        let hub = Arc::new(EventHub::default());
        let (timers, mut expired_rx) = SessionTimers::new(hub.clone());
        let mut rx = hub.subscribe(&session_room("s1"));

        timers.start("s1", 3);
        assert!(timers.is_running("s1"));

        assert_eq!(next_tick(&mut rx).await, 2);
        assert_eq!(next_tick(&mut rx).await, 1);
        assert_eq!(next_tick(&mut rx).await, 0);

        assert_eq!(expired_rx.recv().await.as_deref(), Some("s1"));
        assert!(!timers.is_running("s1"));
        assert_eq!(timers.active_count(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err(), "no ticks after reaching zero");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_one_second_apart() {
        let hub = Arc::new(EventHub::default());
        let (timers, _expired_rx) = SessionTimers::new(hub.clone());
        let mut rx = hub.subscribe(&session_room("s1"));

        let start = tokio::time::Instant::now();
        timers.start("s1", 2);

        next_tick(&mut rx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        next_tick(&mut rx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_timer() {
        let hub = Arc::new(EventHub::default());
        let (timers, mut expired_rx) = SessionTimers::new(hub.clone());
        let mut rx = hub.subscribe(&session_room("s1"));

        timers.start("s1", 3);
        assert_eq!(next_tick(&mut rx).await, 2);

        tokio::time::sleep(Duration::from_millis(500)).await;
        timers.start("s1", 5);
        assert_eq!(timers.active_count(), 1);

        let ticks = [
            next_tick(&mut rx).await,
            next_tick(&mut rx).await,
            next_tick(&mut rx).await,
            next_tick(&mut rx).await,
            next_tick(&mut rx).await,
        ];
        assert_eq!(ticks, [4, 3, 2, 1, 0]);

        assert_eq!(expired_rx.recv().await.as_deref(), Some("s1"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(expired_rx.try_recv().is_err(), "old timer must not expire the session");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticks_without_expiry() {
        let hub = Arc::new(EventHub::default());
        let (timers, mut expired_rx) = SessionTimers::new(hub.clone());
        let mut rx = hub.subscribe(&session_room("s1"));

        timers.start("s1", 10);
        assert_eq!(next_tick(&mut rx).await, 9);

        assert!(timers.stop("s1"));
        assert!(!timers.stop("s1"));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(rx.try_recv().is_err());
        assert!(expired_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_expires_immediately() {
        let hub = Arc::new(EventHub::default());
        let (timers, mut expired_rx) = SessionTimers::new(hub.clone());
        let mut rx = hub.subscribe(&session_room("s1"));

        timers.start("s1", 0);
        assert_eq!(expired_rx.recv().await.as_deref(), Some("s1"));
        assert!(rx.try_recv().is_err());
        assert!(!timers.is_running("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_everything() {
        let hub = Arc::new(EventHub::default());
        let (timers, _expired_rx) = SessionTimers::new(hub);
        timers.start("a", 30);
        timers.start("b", 30);
        assert_eq!(timers.active_count(), 2);

        timers.shutdown();
        assert_eq!(timers.active_count(), 0);
    }
}
