use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Lifecycle changes that interest the people on a ride. Consumed by the
/// external mail/push pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    MatchRequested,
    MatchAccepted,
    MatchWithdrawn,
    RideCancelled,
    RideInProgress,
    RideCompleted,
    RatingReceived,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::MatchRequested => "match_requested",
            LifecycleEvent::MatchAccepted => "match_accepted",
            LifecycleEvent::MatchWithdrawn => "match_withdrawn",
            LifecycleEvent::RideCancelled => "ride_cancelled",
            LifecycleEvent::RideInProgress => "ride_in_progress",
            LifecycleEvent::RideCompleted => "ride_completed",
            LifecycleEvent::RatingReceived => "rating_received",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub event: LifecycleEvent,
    pub ride_id: i64,
    pub actor_id: i64,
    pub recipient_id: i64,
    pub title: String,
    pub body: String,
}

/// Informed after the workflow transaction commits. Best effort: a lost
/// notification never affects the committed transition, so implementations
/// swallow their own failures.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LifecycleNotifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

pub struct LogNotifier;

#[async_trait]
impl LifecycleNotifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        tracing::info!(
            event = notification.event.as_str(),
            ride_id = notification.ride_id,
            actor_id = notification.actor_id,
            recipient_id = notification.recipient_id,
            "{}",
            notification.title
        );
    }
}
