//! Subscription lifecycle types shared by the local and remote sides.

use upnp_message::StreamResponse;
use upnp_model::StateVariableValue;

use crate::error::EstablishFailure;

/// Requested subscription duration when the owner does not specify one.
pub const DEFAULT_SUBSCRIPTION_SECONDS: u32 = 1800;

/// Lifecycle of a subscription. Transitions are one-way; an ended
/// subscription is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Pending,
    Established,
    Ended,
}

/// Why a subscription ended without its owner asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The granted duration ran out without a successful renewal
    Expired,
    /// A renewal exchange failed
    RenewalFailed,
    /// The subscribed device disappeared from the network
    DeviceRemoved,
    /// The stack is shutting down
    ShuttingDown,
}

/// Owner-side notification points of a subscription.
///
/// All methods default to no-ops. Calls arrive on whatever task drives
/// the subscription, with the subscription's own lock held; implementors
/// must not call back into the same subscription.
pub trait SubscriptionListener: Send + Sync {
    /// The subscription is live under `sid`.
    fn established(&self, sid: &str) {
        let _ = sid;
    }

    /// The subscription will deliver nothing further. `reason` is `None`
    /// for owner-initiated ends; `response` carries the device's answer
    /// when a failed exchange caused the end.
    fn ended(&self, sid: &str, reason: Option<CancelReason>, response: Option<&StreamResponse>) {
        let _ = (sid, reason, response);
    }

    /// One event batch, in delivery order.
    fn event_received(&self, sid: &str, sequence: u32, changes: &[StateVariableValue]) {
        let _ = (sid, sequence, changes);
    }

    /// One variable out of a delivered batch, after `event_received`.
    fn value_changed(&self, sid: &str, change: &StateVariableValue) {
        let _ = (sid, change);
    }

    /// Events were lost between the previous batch and this one.
    fn events_missed(&self, sid: &str, missed: u32) {
        let _ = (sid, missed);
    }

    /// Establishing the subscription failed; `ended` will not follow.
    fn establish_failed(&self, failure: &EstablishFailure) {
        let _ = failure;
    }
}
