//! Inbound NOTIFY routing: callback path to subscription.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use upnp_message::{HeaderName, Operation, SeqHeader, SidHeader, UpnpMessage};

use crate::body::EventBodyProcessor;
use crate::remote::RemoteSubscription;

/// Maps each subscription's unique callback path to the subscription.
///
/// The stream server hands NOTIFY exchanges here; anything arriving on a
/// path no live subscription owns gets `412 Precondition Failed`, which
/// tells a well-behaved device to stop notifying.
#[derive(Default)]
pub struct CallbackRoutes {
    routes: Mutex<HashMap<String, Arc<RemoteSubscription>>>,
}

impl CallbackRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscription: Arc<RemoteSubscription>) {
        self.lock_routes()
            .insert(subscription.callback_path().to_string(), subscription);
    }

    pub fn unregister(&self, path: &str) {
        self.lock_routes().remove(path);
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<RemoteSubscription>> {
        self.lock_routes().get(path).cloned()
    }

    /// All registered callback paths, in no particular order.
    pub fn paths(&self) -> Vec<String> {
        self.lock_routes().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answer one inbound NOTIFY exchange.
    pub fn handle(
        &self,
        request: &UpnpMessage,
        processor: &dyn EventBodyProcessor,
    ) -> UpnpMessage {
        let Operation::Request { target, .. } = &request.operation else {
            return UpnpMessage::response(400, "Bad Request");
        };

        let Some(subscription) = self.lookup(target) else {
            debug!(path = %target, "notify for unknown callback path");
            return UpnpMessage::response(412, "Precondition Failed");
        };

        let headers = &request.headers;
        if headers.first(&HeaderName::Nt) != Some("upnp:event")
            || headers.first(&HeaderName::Nts) != Some("upnp:propchange")
        {
            debug!(path = %target, "notify without event NT/NTS");
            return UpnpMessage::response(400, "Bad Request");
        }

        let Some(SidHeader(sid)) = headers.typed::<SidHeader>() else {
            return UpnpMessage::response(412, "Precondition Failed");
        };
        if subscription.sid().as_deref() != Some(sid.as_str()) {
            debug!(path = %target, sid = %sid, "notify with foreign SID");
            return UpnpMessage::response(412, "Precondition Failed");
        }

        let Some(SeqHeader(sequence)) = headers.typed::<SeqHeader>() else {
            return UpnpMessage::response(400, "Bad Request");
        };

        let Some(body) = request.body.as_text() else {
            return UpnpMessage::response(400, "Bad Request");
        };
        let changes = match processor.read_body(body) {
            Ok(changes) => changes,
            Err(e) => {
                debug!(path = %target, error = %e, "unreadable event body");
                return UpnpMessage::response(400, "Bad Request");
            }
        };

        subscription.receive_event(sequence, &changes);
        UpnpMessage::ok()
    }

    fn lock_routes(&self) -> MutexGuard<'_, HashMap<String, Arc<RemoteSubscription>>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::DEFAULT_SUBSCRIPTION_SECONDS;
    use crate::testing::{
        router_with_stream_client, CannedStreamClient, CollectingSubscriptionListener,
        LineBodyProcessor,
    };
    use upnp_message::{Body, Method};

    async fn established_route() -> (
        CallbackRoutes,
        Arc<RemoteSubscription>,
        Arc<CollectingSubscriptionListener>,
    ) {
        let mut response = UpnpMessage::ok();
        response.headers.add(HeaderName::Sid, "uuid:sub-1");
        response.headers.add(HeaderName::Timeout, "Second-300");
        let router = router_with_stream_client(CannedStreamClient::answering(response));
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let subscription = RemoteSubscription::new(
            router,
            url::Url::parse("http://192.168.1.50:1400/event").unwrap(),
            listener.clone(),
            DEFAULT_SUBSCRIPTION_SECONDS,
        );
        subscription.subscribe().await.unwrap();

        let routes = CallbackRoutes::new();
        routes.register(subscription.clone());
        (routes, subscription, listener)
    }

    fn notify(path: &str, sid: &str, seq: u32, body: &str) -> UpnpMessage {
        let mut message = UpnpMessage::request(Method::Notify, path);
        message.headers.add(HeaderName::Nt, "upnp:event");
        message.headers.add(HeaderName::Nts, "upnp:propchange");
        message.headers.add(HeaderName::Sid, sid);
        message.headers.add(HeaderName::Seq, seq.to_string());
        message.body = Body::Text(body.to_string());
        message
    }

    #[tokio::test]
    async fn test_notify_is_routed_and_acknowledged() {
        let (routes, subscription, listener) = established_route().await;
        let path = subscription.callback_path().to_string();

        let response = routes.handle(
            &notify(&path, "uuid:sub-1", 0, "Volume=11\n"),
            &LineBodyProcessor,
        );

        assert_eq!(response.operation.status(), Some(200));
        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 0);
        assert_eq!(events[0].1[0].name, "Volume");
    }

    #[tokio::test]
    async fn test_unknown_path_precondition_fails() {
        let (routes, _subscription, listener) = established_route().await;

        let response = routes.handle(
            &notify("/events/nobody-home", "uuid:sub-1", 0, "Volume=11\n"),
            &LineBodyProcessor,
        );

        assert_eq!(response.operation.status(), Some(412));
        assert!(listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_sid_precondition_fails() {
        let (routes, subscription, listener) = established_route().await;
        let path = subscription.callback_path().to_string();

        let response = routes.handle(
            &notify(&path, "uuid:someone-else", 0, "Volume=11\n"),
            &LineBodyProcessor,
        );

        assert_eq!(response.operation.status(), Some(412));
        assert!(listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_event_headers_bad_request() {
        let (routes, subscription, _listener) = established_route().await;
        let path = subscription.callback_path().to_string();

        let mut message = notify(&path, "uuid:sub-1", 0, "Volume=11\n");
        message.headers.remove(&HeaderName::Nts);
        let response = routes.handle(&message, &LineBodyProcessor);
        assert_eq!(response.operation.status(), Some(400));

        let mut message = notify(&path, "uuid:sub-1", 0, "Volume=11\n");
        message.headers.remove(&HeaderName::Seq);
        let response = routes.handle(&message, &LineBodyProcessor);
        assert_eq!(response.operation.status(), Some(400));
    }

    #[tokio::test]
    async fn test_unreadable_body_bad_request() {
        let (routes, subscription, listener) = established_route().await;
        let path = subscription.callback_path().to_string();

        let response = routes.handle(
            &notify(&path, "uuid:sub-1", 0, "no equals sign here"),
            &LineBodyProcessor,
        );

        assert_eq!(response.operation.status(), Some(400));
        assert!(listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_stops_routing() {
        let (routes, subscription, _listener) = established_route().await;
        let path = subscription.callback_path().to_string();
        routes.unregister(&path);

        let response = routes.handle(
            &notify(&path, "uuid:sub-1", 0, "Volume=11\n"),
            &LineBodyProcessor,
        );
        assert_eq!(response.operation.status(), Some(412));
        assert!(routes.is_empty());
    }
}
