//! Subscriptions to in-process services.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::debug;
use upnp_model::{ChangeListener, ListenerId, LocalService, StateVariableValue};
use uuid::Uuid;

use crate::error::Result;
use crate::subscription::{CancelReason, SubscriptionListener, SubscriptionState};

struct LocalInner {
    state: SubscriptionState,
    sequence: u32,
    registration: Option<ListenerId>,
    /// Last delivery instant per rate-moderated variable
    last_sent: HashMap<String, Instant>,
    /// Last delivered numeric value per delta-moderated variable
    baselines: HashMap<String, i64>,
}

/// A live subscription to a [`LocalService`].
///
/// Establishing takes a full snapshot, seeds the moderation baselines
/// from it, registers on the service's change registry and delivers the
/// snapshot as event zero. Later service changes arrive synchronously on
/// the mutating thread, pass moderation, and go out under the
/// subscription lock, so once `end` returns no further event can fire.
pub struct LocalSubscription {
    sid: String,
    service: Arc<LocalService>,
    listener: Arc<dyn SubscriptionListener>,
    inner: Mutex<LocalInner>,
}

impl LocalSubscription {
    /// Subscribe to a local service. A failed snapshot ends the
    /// subscription before it ever delivers.
    pub fn establish(
        service: Arc<LocalService>,
        listener: Arc<dyn SubscriptionListener>,
    ) -> Result<Arc<Self>> {
        let sid = format!("uuid:{}", Uuid::new_v4());
        let subscription = Arc::new(Self {
            sid: sid.clone(),
            service: Arc::clone(&service),
            listener: Arc::clone(&listener),
            inner: Mutex::new(LocalInner {
                state: SubscriptionState::Pending,
                sequence: 0,
                registration: None,
                last_sent: HashMap::new(),
                baselines: HashMap::new(),
            }),
        });

        let snapshot = match service.current_evented_values() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                subscription.lock_inner().state = SubscriptionState::Ended;
                listener.ended(&sid, None, None);
                return Err(e.into());
            }
        };

        // The initial snapshot is itself unmoderated but counts as a
        // send: it seeds the delta baselines and opens the rate windows.
        {
            let now = Instant::now();
            let mut inner = subscription.lock_inner();
            for value in &snapshot {
                let Some(var) = service.variable(&value.name) else {
                    continue;
                };
                if var.max_rate.is_some() {
                    inner.last_sent.insert(value.name.clone(), now);
                }
                if var.min_delta.is_some() {
                    if let Some(number) = value.value.as_number() {
                        inner.baselines.insert(value.name.clone(), number);
                    }
                }
            }

            let registration = service
                .changes()
                .register(Arc::clone(&subscription) as Arc<dyn ChangeListener>);
            inner.registration = Some(registration);
            inner.state = SubscriptionState::Established;

            listener.established(&sid);
            debug!(sid = %sid, variables = snapshot.len(), "local subscription established");

            listener.event_received(&sid, 0, &snapshot);
            for change in &snapshot {
                listener.value_changed(&sid, change);
            }
            inner.sequence = 1;
        }

        Ok(subscription)
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn state(&self) -> SubscriptionState {
        self.lock_inner().state
    }

    pub fn sequence(&self) -> u32 {
        self.lock_inner().sequence
    }

    /// End the subscription. Idempotent; after return no event fires.
    pub fn end(&self, reason: Option<CancelReason>) {
        let registration;
        {
            let mut inner = self.lock_inner();
            if inner.state == SubscriptionState::Ended {
                return;
            }
            inner.state = SubscriptionState::Ended;
            registration = inner.registration.take();
            self.listener.ended(&self.sid, reason, None);
        }
        if let Some(id) = registration {
            self.service.changes().unregister(id);
        }
        debug!(sid = %self.sid, "local subscription ended");
    }

    fn lock_inner(&self) -> MutexGuard<'_, LocalInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChangeListener for LocalSubscription {
    /// Moderate and deliver one change batch. Runs on the thread that
    /// mutated the service.
    fn state_changed(&self, changes: &[StateVariableValue]) {
        let mut inner = self.lock_inner();
        if inner.state != SubscriptionState::Established {
            return;
        }

        let now = Instant::now();
        let mut included = Vec::new();
        for change in changes {
            let Some(var) = self.service.variable(&change.name) else {
                continue;
            };
            if !var.sends_events {
                continue;
            }
            if let Some(rate) = var.max_rate {
                if let Some(last) = inner.last_sent.get(&change.name) {
                    if now.duration_since(*last) < rate {
                        continue;
                    }
                }
            }
            if let Some(delta) = var.min_delta {
                if let (Some(new), Some(baseline)) = (
                    change.value.as_number(),
                    inner.baselines.get(&change.name).copied(),
                ) {
                    if new.abs_diff(baseline) < delta.unsigned_abs() {
                        continue;
                    }
                }
            }

            if var.max_rate.is_some() {
                inner.last_sent.insert(change.name.clone(), now);
            }
            if var.min_delta.is_some() {
                if let Some(number) = change.value.as_number() {
                    inner.baselines.insert(change.name.clone(), number);
                }
            }
            included.push(change.clone());
        }

        // A batch that moderation emptied produces no event at all
        if included.is_empty() {
            return;
        }

        let sequence = inner.sequence;
        inner.sequence = inner.sequence.wrapping_add(1);
        self.listener.event_received(&self.sid, sequence, &included);
        for change in &included {
            self.listener.value_changed(&self.sid, change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CollectingSubscriptionListener;
    use std::time::Duration;
    use upnp_message::ServiceType;
    use upnp_model::{StateValue, StateVariable};

    fn service() -> Arc<LocalService> {
        Arc::new(LocalService::new(
            ServiceType::upnp_org("RenderingControl", 1),
            "urn:upnp-org:serviceId:RenderingControl",
            vec![
                StateVariable::text("TransportState"),
                StateVariable::number("Volume").with_min_delta(5),
                StateVariable::number("Position").with_max_rate(Duration::from_millis(50)),
            ],
        ))
    }

    #[test]
    fn test_first_event_is_full_snapshot_at_sequence_zero() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let subscription =
            LocalSubscription::establish(service, listener.clone()).unwrap();

        assert_eq!(subscription.state(), SubscriptionState::Established);
        assert!(subscription.sid().starts_with("uuid:"));
        assert_eq!(listener.established_sids(), vec![subscription.sid().to_string()]);

        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 0);
        let names: Vec<String> = events[0].1.iter().map(|v| v.name.clone()).collect();
        assert_eq!(names, vec!["TransportState", "Volume", "Position"]);
        assert_eq!(subscription.sequence(), 1);
    }

    #[test]
    fn test_changes_after_establish_increment_sequence() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let _subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        service
            .set_value("TransportState", StateValue::Text("PLAYING".into()))
            .unwrap();
        service
            .set_value("TransportState", StateValue::Text("PAUSED".into()))
            .unwrap();

        let events = listener.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].0, 1);
        assert_eq!(events[2].0, 2);
        assert_eq!(
            events[2].1,
            vec![StateVariableValue::new(
                "TransportState",
                StateValue::Text("PAUSED".into())
            )]
        );
    }

    #[test]
    fn test_delta_moderation_boundary() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let _subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        // Baseline is the snapshot value 0; a move of delta-1 stays quiet
        service.set_value("Volume", StateValue::Number(4)).unwrap();
        assert_eq!(listener.events().len(), 1);

        // A move of exactly delta goes out and becomes the new baseline
        service.set_value("Volume", StateValue::Number(5)).unwrap();
        assert_eq!(listener.events().len(), 2);

        // 9 is only 4 away from the new baseline of 5
        service.set_value("Volume", StateValue::Number(9)).unwrap();
        assert_eq!(listener.events().len(), 2);

        service.set_value("Volume", StateValue::Number(10)).unwrap();
        assert_eq!(listener.events().len(), 3);
    }

    #[test]
    fn test_rate_window_opens_at_establishment() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let _subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        // The snapshot counts as a send; a change inside the window
        // right after establishment stays quiet
        service.set_value("Position", StateValue::Number(1)).unwrap();
        assert_eq!(listener.events().len(), 1);

        std::thread::sleep(Duration::from_millis(60));
        service.set_value("Position", StateValue::Number(2)).unwrap();
        assert_eq!(listener.events().len(), 2);
    }

    #[test]
    fn test_rate_moderation_suppresses_rapid_changes() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let _subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        std::thread::sleep(Duration::from_millis(60));
        service.set_value("Position", StateValue::Number(1)).unwrap();
        assert_eq!(listener.events().len(), 2);

        // Immediately after, the window is open again
        service.set_value("Position", StateValue::Number(2)).unwrap();
        assert_eq!(listener.events().len(), 2);

        // Once the window has passed, changes flow again
        std::thread::sleep(Duration::from_millis(60));
        service.set_value("Position", StateValue::Number(3)).unwrap();
        assert_eq!(listener.events().len(), 3);
    }

    #[test]
    fn test_extreme_delta_values_are_delivered() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let _subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        // Baseline is the snapshot value 0; a swing to i64::MIN is far
        // past the delta and must not trip the difference arithmetic
        service
            .set_value("Volume", StateValue::Number(i64::MIN))
            .unwrap();
        assert_eq!(listener.events().len(), 2);

        service
            .set_value("Volume", StateValue::Number(i64::MAX))
            .unwrap();
        assert_eq!(listener.events().len(), 3);
    }

    #[test]
    fn test_moderated_out_batch_does_not_consume_a_sequence_number() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        service.set_value("Volume", StateValue::Number(1)).unwrap();
        assert_eq!(subscription.sequence(), 1);

        service
            .set_value("TransportState", StateValue::Text("PLAYING".into()))
            .unwrap();
        assert_eq!(subscription.sequence(), 2);
        assert_eq!(listener.events().last().unwrap().0, 1);
    }

    #[test]
    fn test_no_delivery_after_end() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        subscription.end(None);
        assert_eq!(subscription.state(), SubscriptionState::Ended);
        assert_eq!(listener.ended_count(), 1);

        service
            .set_value("TransportState", StateValue::Text("PLAYING".into()))
            .unwrap();
        assert_eq!(listener.events().len(), 1);

        // end is idempotent
        subscription.end(Some(CancelReason::ShuttingDown));
        assert_eq!(listener.ended_count(), 1);
    }

    #[test]
    fn test_value_changed_follows_each_event() {
        let service = service();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let _subscription =
            LocalSubscription::establish(service.clone(), listener.clone()).unwrap();

        // 3 from the snapshot
        assert_eq!(listener.value_changes().len(), 3);

        service
            .set_value("TransportState", StateValue::Text("PLAYING".into()))
            .unwrap();
        assert_eq!(listener.value_changes().len(), 4);
    }
}
