//! Owner-facing subscription handle, local or remote.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use upnp_model::LocalService;
use upnp_router::Router;
use url::Url;

use crate::error::Result;
use crate::local::LocalSubscription;
use crate::remote::RemoteSubscription;
use crate::routes::CallbackRoutes;
use crate::subscription::{CancelReason, SubscriptionListener, DEFAULT_SUBSCRIPTION_SECONDS};

/// What a callback subscribes to.
pub enum SubscriptionTarget {
    /// A service living in this process; no network traffic involved.
    Local(Arc<LocalService>),
    /// A remote service's event endpoint.
    Remote(Url),
}

enum ActiveSubscription {
    Local(Arc<LocalSubscription>),
    Remote(Arc<RemoteSubscription>),
}

/// One owner-held subscription, dispatching to the local or remote
/// engine depending on where the target service lives. The owner hears
/// about everything through its [`SubscriptionListener`].
pub struct SubscriptionCallback {
    target: SubscriptionTarget,
    listener: Arc<dyn SubscriptionListener>,
    requested_seconds: u32,
    active: Mutex<Option<ActiveSubscription>>,
}

impl SubscriptionCallback {
    pub fn new(target: SubscriptionTarget, listener: Arc<dyn SubscriptionListener>) -> Self {
        Self::with_duration(target, listener, DEFAULT_SUBSCRIPTION_SECONDS)
    }

    pub fn with_duration(
        target: SubscriptionTarget,
        listener: Arc<dyn SubscriptionListener>,
        requested_seconds: u32,
    ) -> Self {
        Self {
            target,
            listener,
            requested_seconds,
            active: Mutex::new(None),
        }
    }

    /// Establish the subscription. Remote targets are registered for
    /// callback routing before the SUBSCRIBE goes out, so an eager
    /// device's first NOTIFY finds its route.
    pub async fn run(&self, router: &Arc<Router>, routes: &CallbackRoutes) -> Result<()> {
        match &self.target {
            SubscriptionTarget::Local(service) => {
                let subscription = LocalSubscription::establish(
                    Arc::clone(service),
                    Arc::clone(&self.listener),
                )?;
                *self.lock_active() = Some(ActiveSubscription::Local(subscription));
                Ok(())
            }
            SubscriptionTarget::Remote(event_url) => {
                let subscription = RemoteSubscription::new(
                    Arc::clone(router),
                    event_url.clone(),
                    Arc::clone(&self.listener),
                    self.requested_seconds,
                );
                routes.register(Arc::clone(&subscription));
                match subscription.subscribe().await {
                    Ok(()) => {
                        *self.lock_active() = Some(ActiveSubscription::Remote(subscription));
                        Ok(())
                    }
                    Err(e) => {
                        routes.unregister(subscription.callback_path());
                        Err(e)
                    }
                }
            }
        }
    }

    /// Renew a remote subscription. A no-op for local targets, which do
    /// not expire.
    pub async fn renew(&self) -> Result<()> {
        let subscription = {
            match &*self.lock_active() {
                Some(ActiveSubscription::Remote(subscription)) => Some(Arc::clone(subscription)),
                _ => None,
            }
        };
        match subscription {
            Some(subscription) => subscription.renew().await,
            None => Ok(()),
        }
    }

    /// End the subscription, releasing its callback route. Idempotent.
    pub fn end(&self, routes: &CallbackRoutes) {
        let Some(active) = self.lock_active().take() else {
            debug!("end on inactive subscription callback, ignoring");
            return;
        };
        match active {
            ActiveSubscription::Local(subscription) => subscription.end(None),
            ActiveSubscription::Remote(subscription) => {
                routes.unregister(subscription.callback_path());
                subscription.end(None);
            }
        }
    }

    /// End with an engine-supplied reason (expiry, device removal).
    pub fn cancel(&self, routes: &CallbackRoutes, reason: CancelReason) {
        let Some(active) = self.lock_active().take() else {
            return;
        };
        match active {
            ActiveSubscription::Local(subscription) => subscription.end(Some(reason)),
            ActiveSubscription::Remote(subscription) => {
                routes.unregister(subscription.callback_path());
                subscription.end(Some(reason));
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSubscription>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        router_with_stream_client, CannedStreamClient, CollectingSubscriptionListener,
    };
    use upnp_message::{HeaderName, ServiceType, UpnpMessage};
    use upnp_model::{StateValue, StateVariable};

    fn local_service() -> Arc<LocalService> {
        Arc::new(LocalService::new(
            ServiceType::upnp_org("SwitchPower", 1),
            "urn:upnp-org:serviceId:SwitchPower",
            vec![StateVariable::boolean("Status")],
        ))
    }

    #[tokio::test]
    async fn test_local_target_subscribes_without_network() {
        let client = CannedStreamClient::silent();
        let router = router_with_stream_client(client.clone());
        let routes = CallbackRoutes::new();
        let listener = Arc::new(CollectingSubscriptionListener::default());
        let service = local_service();

        let callback = SubscriptionCallback::new(
            SubscriptionTarget::Local(service.clone()),
            listener.clone(),
        );
        callback.run(&router, &routes).await.unwrap();

        assert!(callback.is_active());
        assert_eq!(listener.established_sids().len(), 1);
        assert!(client.requests().is_empty());

        service.set_value("Status", StateValue::Bool(true)).unwrap();
        assert_eq!(listener.events().len(), 2);

        callback.end(&routes);
        assert!(!callback.is_active());
        assert_eq!(listener.ended_count(), 1);

        // ending twice changes nothing
        callback.end(&routes);
        assert_eq!(listener.ended_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_target_registers_route_then_subscribes() {
        let mut response = UpnpMessage::ok();
        response.headers.add(HeaderName::Sid, "uuid:sub-9");
        response.headers.add(HeaderName::Timeout, "Second-300");
        let client = CannedStreamClient::answering(response);
        let router = router_with_stream_client(client.clone());
        let routes = CallbackRoutes::new();
        let listener = Arc::new(CollectingSubscriptionListener::default());

        let callback = SubscriptionCallback::new(
            SubscriptionTarget::Remote(
                url::Url::parse("http://192.168.1.50:1400/event").unwrap(),
            ),
            listener.clone(),
        );
        callback.run(&router, &routes).await.unwrap();

        assert!(callback.is_active());
        assert_eq!(routes.len(), 1);
        assert_eq!(listener.established_sids(), vec!["uuid:sub-9".to_string()]);

        callback.end(&routes);
        assert!(routes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_remote_subscribe_releases_route() {
        let client = CannedStreamClient::silent();
        let router = router_with_stream_client(client);
        let routes = CallbackRoutes::new();
        let listener = Arc::new(CollectingSubscriptionListener::default());

        let callback = SubscriptionCallback::new(
            SubscriptionTarget::Remote(
                url::Url::parse("http://192.168.1.50:1400/event").unwrap(),
            ),
            listener.clone(),
        );

        assert!(callback.run(&router, &routes).await.is_err());
        assert!(!callback.is_active());
        assert!(routes.is_empty());
        assert_eq!(listener.failures().len(), 1);
    }
}
