//! Occupancy events and the listener that feeds them to the idle tracker.

use std::sync::Arc;

use buildsys_domain::WorldName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::stores::IdleWorldTracker;

/// A change in whether a world has anyone in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OccupancyEvent {
    /// The last occupant left.
    BecameEmpty { world: WorldName, at: DateTime<Utc> },
    /// Someone entered.
    GainedOccupant { world: WorldName, at: DateTime<Utc> },
}

impl OccupancyEvent {
    pub fn world(&self) -> &WorldName {
        match self {
            Self::BecameEmpty { world, .. } | Self::GainedOccupant { world, .. } => world,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::BecameEmpty { at, .. } | Self::GainedOccupant { at, .. } => *at,
        }
    }

    /// Apply to the tracker. Returns `false` if the event was stale.
    pub fn apply(&self, tracker: &IdleWorldTracker) -> bool {
        match self {
            Self::BecameEmpty { world, at } => tracker.mark_empty(world, *at),
            Self::GainedOccupant { world, at } => tracker.mark_occupied(world, *at),
        }
    }
}

/// Translate a player moving between worlds into occupancy events.
///
/// - Join: `from` is `None`, `to` is the world joined.
/// - Quit: `to` is `None`.
/// - World change / teleport: both set; a move within one world yields nothing.
///
/// `remaining_in_from` is the number of occupants left behind.
pub fn occupancy_events_for_move(
    from: Option<&WorldName>,
    remaining_in_from: usize,
    to: Option<&WorldName>,
    at: DateTime<Utc>,
) -> Vec<OccupancyEvent> {
    if let (Some(from), Some(to)) = (from, to) {
        if from == to {
            return Vec::new();
        }
    }

    let mut events = Vec::with_capacity(2);
    if let Some(from) = from {
        if remaining_in_from == 0 {
            events.push(OccupancyEvent::BecameEmpty {
                world: from.clone(),
                at,
            });
        }
    }
    if let Some(to) = to {
        events.push(OccupancyEvent::GainedOccupant {
            world: to.clone(),
            at,
        });
    }
    events
}

/// Drains occupancy events into the idle tracker.
pub struct OccupancyListener {
    tracker: Arc<IdleWorldTracker>,
}

impl OccupancyListener {
    pub fn new(tracker: Arc<IdleWorldTracker>) -> Self {
        Self { tracker }
    }

    /// Apply events until the channel closes or `cancel` fires.
    pub async fn run(self, mut events: mpsc::Receiver<OccupancyEvent>, cancel: CancellationToken) {
        tracing::info!("Occupancy listener started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Occupancy listener shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Occupancy event source closed");
                        break;
                    };
                    if event.apply(&self.tracker) {
                        tracing::trace!(world = %event.world(), ?event, "Applied occupancy event");
                    }
                }
            }
        }
    }

    pub fn spawn(
        self,
        events: mpsc::Receiver<OccupancyEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn w(name: &str) -> WorldName {
        WorldName::new(name).unwrap()
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn last_player_leaving_empties_source_world() {
        let events = occupancy_events_for_move(Some(&w("a")), 0, Some(&w("b")), t(0));
        assert_eq!(
            events,
            vec![
                OccupancyEvent::BecameEmpty {
                    world: w("a"),
                    at: t(0)
                },
                OccupancyEvent::GainedOccupant {
                    world: w("b"),
                    at: t(0)
                },
            ]
        );
    }

    #[test]
    fn leaving_an_occupied_world_only_fills_destination() {
        let events = occupancy_events_for_move(Some(&w("a")), 2, Some(&w("b")), t(0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].world(), &w("b"));
    }

    #[test]
    fn quit_and_join() {
        let quit = occupancy_events_for_move(Some(&w("a")), 0, None, t(0));
        assert!(matches!(quit.as_slice(), [OccupancyEvent::BecameEmpty { .. }]));

        let join = occupancy_events_for_move(None, 0, Some(&w("a")), t(0));
        assert!(matches!(join.as_slice(), [OccupancyEvent::GainedOccupant { .. }]));
    }

    #[test]
    fn move_within_same_world_is_silent() {
        let events = occupancy_events_for_move(Some(&w("a")), 0, Some(&w("A")), t(0));
        assert!(events.is_empty());
    }

    #[test]
    fn parses_wire_form() {
        let json = r#"{"event":"became_empty","world":"w1","at":"2025-01-01T00:00:00Z"}"#;
        let event: OccupancyEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            OccupancyEvent::BecameEmpty {
                world: w("w1"),
                at: t(0)
            }
        );
    }

    #[tokio::test]
    async fn listener_applies_events_until_channel_closes() {
        let tracker = Arc::new(IdleWorldTracker::new());
        let (tx, rx) = mpsc::channel(8);
        let handle = OccupancyListener::new(Arc::clone(&tracker)).spawn(rx, CancellationToken::new());

        tx.send(OccupancyEvent::BecameEmpty {
            world: w("w1"),
            at: t(5),
        })
        .await
        .unwrap();
        // Stale: older than the event already applied.
        tx.send(OccupancyEvent::GainedOccupant {
            world: w("w1"),
            at: t(1),
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(tracker.idle_since(&w("w1")), Some(t(5)));
    }

    #[tokio::test]
    async fn listener_stops_on_cancel() {
        let tracker = Arc::new(IdleWorldTracker::new());
        let (_tx, rx) = mpsc::channel::<OccupancyEvent>(8);
        let cancel = CancellationToken::new();
        let handle = OccupancyListener::new(tracker).spawn(rx, cancel.clone());

        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
    }
}
