//! Expiry sweeper
//!
//! A ticking task that asks the owning actor to evict rooms past their TTL.
//! The sweep itself runs inside the actor, so it never overlaps a handler.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::types::RoomCode;

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default maximum room age
pub const DEFAULT_ROOM_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Reason given to occupants of an expired room
pub const EXPIRED_REASON: &str = "Room expired";

/// Codes of every room created more than `ttl` before `now`
///
/// The returned list is a snapshot; callers re-check each code before acting.
pub fn expired_codes<'a, I>(rooms: I, now: Instant, ttl: Duration) -> Vec<RoomCode>
where
    I: IntoIterator<Item = (&'a RoomCode, Instant)>,
{
    rooms
        .into_iter()
        .filter(|(_, created_at)| now.saturating_duration_since(*created_at) > ttl)
        .map(|(code, _)| code.clone())
        .collect()
}

/// Spawn the ticking task
///
/// Every `interval` it sends `make_command(now)` to the actor mailbox. The
/// task ends when the actor is gone.
pub fn spawn_sweeper<C, F>(cmd_tx: mpsc::Sender<C>, interval: Duration, make_command: F) -> JoinHandle<()>
where
    C: Send + 'static,
    F: Fn(Instant) -> C + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if cmd_tx.send(make_command(Instant::now())).await.is_err() {
                debug!("Sweeper stopping, server closed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_codes() {
        let base = Instant::now();
        let old = RoomCode("OLDR".to_string());
        let young = RoomCode("YNGR".to_string());
        let rooms = vec![
            (&old, base),
            (&young, base + Duration::from_secs(90)),
        ];

        let now = base + Duration::from_secs(100);
        let expired = expired_codes(rooms, now, Duration::from_secs(30));
        assert_eq!(expired, vec![old]);
    }

    #[test]
    fn test_room_exactly_at_ttl_survives() {
        let base = Instant::now();
        let code = RoomCode("EDGE".to_string());
        let now = base + Duration::from_secs(30);
        assert!(expired_codes(vec![(&code, base)], now, Duration::from_secs(30)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_ticks_into_mailbox() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_sweeper(tx, Duration::from_secs(60), |_| "sweep");

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(rx.recv().await, Some("sweep"));

        drop(rx);
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.await.unwrap();
    }
}
