//! Subscriptions to services on remote devices.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use upnp_message::{
    CallbackHeader, HeaderName, Method, NtEvent, SidHeader, StreamRequest, StreamResponse,
    TimeoutHeader, UpnpMessage,
};
use upnp_model::{StateValue, StateVariableValue};
use upnp_router::Router;
use url::Url;
use uuid::Uuid;

use crate::error::{EstablishFailure, GenaError, Result};
use crate::subscription::{CancelReason, SubscriptionListener, SubscriptionState};

struct RemoteInner {
    state: SubscriptionState,
    sid: Option<String>,
    /// Granted duration in seconds; `None` means infinite
    granted_seconds: Option<u32>,
    /// Sequence of the last delivered event; `None` until the first one
    current_sequence: Option<u32>,
    /// Merged view of everything the device has reported so far
    values: HashMap<String, StateValue>,
}

/// A subscription to a remote service's event endpoint.
///
/// SUBSCRIBE/UNSUBSCRIBE run through the router's stream client; inbound
/// NOTIFY exchanges arrive via [`crate::CallbackRoutes`] under this
/// subscription's unique callback path. Event application and delivery
/// happen under one lock, so ordering observed by the listener matches
/// the order events were accepted in.
pub struct RemoteSubscription {
    router: Arc<Router>,
    listener: Arc<dyn SubscriptionListener>,
    event_url: Url,
    callback_path: String,
    callback_url: Url,
    requested_seconds: u32,
    inner: Mutex<RemoteInner>,
}

impl RemoteSubscription {
    /// Prepare a subscription to `event_url`. The callback URL points at
    /// this stack's stream server on the first bound address.
    pub fn new(
        router: Arc<Router>,
        event_url: Url,
        listener: Arc<dyn SubscriptionListener>,
        requested_seconds: u32,
    ) -> Arc<Self> {
        let callback_path = format!("/events/{}", Uuid::new_v4());
        let network = router.network();
        let local = network.bind_addresses()[0].address;
        let callback_url = Url::parse(&format!(
            "http://{local}:{}{callback_path}",
            network.stream_listen_port()
        ))
        .expect("callback url from fixed parts");

        Arc::new(Self {
            router,
            listener,
            event_url,
            callback_path,
            callback_url,
            requested_seconds,
            inner: Mutex::new(RemoteInner {
                state: SubscriptionState::Pending,
                sid: None,
                granted_seconds: None,
                current_sequence: None,
                values: HashMap::new(),
            }),
        })
    }

    /// Run the SUBSCRIBE exchange. On failure the subscription is dead;
    /// the listener hears `establish_failed` and nothing else. If the
    /// owner ended the subscription while the exchange was in flight,
    /// the grant is released and the subscription stays ended.
    pub async fn subscribe(&self) -> Result<()> {
        let mut message = UpnpMessage::request(Method::Subscribe, self.event_url.path());
        self.add_host(&mut message);
        message
            .headers
            .add_typed(&CallbackHeader(vec![self.callback_url.clone()]));
        message.headers.add_typed(&NtEvent);
        message
            .headers
            .add_typed(&TimeoutHeader(Some(self.requested_seconds)));

        let request = StreamRequest {
            message,
            url: self.event_url.clone(),
        };
        match self.establish_from(self.router.send_stream(request).await) {
            Ok(Some(sid)) => {
                debug!(sid = %sid, url = %self.event_url, "remote subscription established");
                self.listener.established(&sid);
                Ok(())
            }
            Ok(None) => {
                debug!(url = %self.event_url, "subscription ended while subscribe was in flight");
                Err(GenaError::Ended)
            }
            Err(failure) => {
                warn!(url = %self.event_url, failure = %failure, "subscription failed");
                self.listener.establish_failed(&failure);
                Err(failure.into())
            }
        }
    }

    fn establish_from(
        &self,
        response: Option<StreamResponse>,
    ) -> std::result::Result<Option<String>, EstablishFailure> {
        let mut inner = self.lock_inner();
        let outcome = match &response {
            None => Err(EstablishFailure::NoResponse),
            Some(response) if !response.is_success() => {
                Err(EstablishFailure::ErrorResponse(response.status()))
            }
            Some(response) => {
                let headers = &response.message.headers;
                match (headers.typed::<SidHeader>(), headers.typed::<TimeoutHeader>()) {
                    (Some(sid), Some(timeout)) => Ok((sid.0, timeout.0)),
                    _ => Err(EstablishFailure::MalformedResponse),
                }
            }
        };
        match outcome {
            Ok((sid, granted)) => {
                // An ended subscription never becomes established again.
                // If end() won the race, release the grant instead of
                // adopting it.
                if inner.state != SubscriptionState::Pending {
                    drop(inner);
                    self.spawn_unsubscribe(sid);
                    return Ok(None);
                }
                inner.state = SubscriptionState::Established;
                inner.sid = Some(sid.clone());
                inner.granted_seconds = granted;
                Ok(Some(sid))
            }
            Err(failure) => {
                if inner.state == SubscriptionState::Pending {
                    inner.state = SubscriptionState::Ended;
                }
                Err(failure)
            }
        }
    }

    /// Apply one NOTIFY event.
    ///
    /// The first event is accepted whatever its sequence. Afterwards a
    /// sequence at or below the current one is a duplicate or stale
    /// redelivery and is dropped; a gap is reported through
    /// `events_missed` before the event is delivered. A device restarting
    /// its counter past `u32::MAX` looks permanently stale; rollover is
    /// not handled.
    pub fn receive_event(&self, sequence: u32, changes: &[StateVariableValue]) {
        let mut inner = self.lock_inner();
        if inner.state != SubscriptionState::Established {
            debug!(sequence, "event on non-established subscription, dropping");
            return;
        }
        let sid = inner.sid.clone().unwrap_or_default();

        if let Some(current) = inner.current_sequence {
            if sequence <= current {
                debug!(sequence, current, "stale event, dropping");
                return;
            }
            let expected = current + 1;
            if sequence > expected {
                let missed = sequence - expected;
                warn!(sequence, expected, missed, "events missed");
                self.listener.events_missed(&sid, missed);
            }
        }

        inner.current_sequence = Some(sequence);
        for change in changes {
            inner
                .values
                .insert(change.name.clone(), change.value.clone());
        }

        self.listener.event_received(&sid, sequence, changes);
        for change in changes {
            self.listener.value_changed(&sid, change);
        }
    }

    /// Renew the subscription with the device. A failed renewal ends the
    /// subscription.
    pub async fn renew(&self) -> Result<()> {
        let sid = {
            let inner = self.lock_inner();
            if inner.state != SubscriptionState::Established {
                return Err(GenaError::Ended);
            }
            inner.sid.clone().ok_or(GenaError::Ended)?
        };

        let mut message = UpnpMessage::request(Method::Subscribe, self.event_url.path());
        self.add_host(&mut message);
        message.headers.add_typed(&SidHeader(sid));
        message
            .headers
            .add_typed(&TimeoutHeader(Some(self.requested_seconds)));

        let request = StreamRequest {
            message,
            url: self.event_url.clone(),
        };
        match self.router.send_stream(request).await {
            None => {
                self.end_with(Some(CancelReason::RenewalFailed), None);
                Err(EstablishFailure::NoResponse.into())
            }
            Some(response) if !response.is_success() => {
                let status = response.status();
                self.end_with(Some(CancelReason::RenewalFailed), Some(&response));
                Err(EstablishFailure::ErrorResponse(status).into())
            }
            Some(response) => {
                if let Some(timeout) = response.message.headers.typed::<TimeoutHeader>() {
                    self.lock_inner().granted_seconds = timeout.0;
                }
                debug!(url = %self.event_url, "remote subscription renewed");
                Ok(())
            }
        }
    }

    /// End the subscription. UNSUBSCRIBE goes out best-effort on a
    /// background task; the subscription is forgotten immediately.
    pub fn end(&self, reason: Option<CancelReason>) {
        self.end_with(reason, None);
    }

    fn end_with(&self, reason: Option<CancelReason>, response: Option<&StreamResponse>) {
        let sid = {
            let mut inner = self.lock_inner();
            if inner.state == SubscriptionState::Ended {
                return;
            }
            let was_established = inner.state == SubscriptionState::Established;
            inner.state = SubscriptionState::Ended;
            let sid = inner.sid.take();
            if was_established {
                self.listener
                    .ended(sid.as_deref().unwrap_or(""), reason, response);
            }
            sid
        };

        if let Some(sid) = sid {
            self.spawn_unsubscribe(sid);
        }
    }

    fn spawn_unsubscribe(&self, sid: String) {
        let router = Arc::clone(&self.router);
        let url = self.event_url.clone();
        let mut message = UpnpMessage::request(Method::Unsubscribe, url.path());
        self.add_host(&mut message);
        message.headers.add_typed(&SidHeader(sid));
        tokio::spawn(async move {
            if router.send_stream(StreamRequest { message, url }).await.is_none() {
                debug!("unsubscribe got no response, ignoring");
            }
        });
    }

    fn add_host(&self, message: &mut UpnpMessage) {
        if let Some(host) = self.event_url.host_str() {
            let host = match self.event_url.port_or_known_default() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            message.headers.add(HeaderName::Host, host);
        }
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    pub fn event_url(&self) -> &Url {
        &self.event_url
    }

    pub fn sid(&self) -> Option<String> {
        self.lock_inner().sid.clone()
    }

    pub fn state(&self) -> SubscriptionState {
        self.lock_inner().state
    }

    pub fn granted_seconds(&self) -> Option<u32> {
        self.lock_inner().granted_seconds
    }

    pub fn current_sequence(&self) -> Option<u32> {
        self.lock_inner().current_sequence
    }

    /// Current merged view of the remote service's reported state.
    pub fn values(&self) -> HashMap<String, StateValue> {
        self.lock_inner().values.clone()
    }

    fn lock_inner(&self) -> MutexGuard<'_, RemoteInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
