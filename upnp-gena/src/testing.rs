//! Shared test doubles for the eventing tests.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use upnp_message::{
    IncomingDatagram, StreamRequest, StreamResponse, UpnpMessage,
};
use upnp_model::{StateValue, StateVariableValue};
use upnp_network::{BoundAddress, NetworkAddressFactory, NetworkConfig};
use upnp_router::{ProtocolHandler, Router, RouterConfig, StreamClient, StreamJob};

use crate::body::{BodyError, EventBodyProcessor};
use crate::error::EstablishFailure;
use crate::subscription::{CancelReason, SubscriptionListener};

/// Records every listener notification, in order.
#[derive(Default)]
pub struct CollectingSubscriptionListener {
    established: Mutex<Vec<String>>,
    ended: Mutex<Vec<(String, Option<CancelReason>)>>,
    events: Mutex<Vec<(u32, Vec<StateVariableValue>)>>,
    values: Mutex<Vec<StateVariableValue>>,
    missed: Mutex<Vec<u32>>,
    failures: Mutex<Vec<EstablishFailure>>,
}

impl CollectingSubscriptionListener {
    pub fn established_sids(&self) -> Vec<String> {
        self.established.lock().unwrap().clone()
    }

    pub fn ended_count(&self) -> usize {
        self.ended.lock().unwrap().len()
    }

    pub fn ended_reasons(&self) -> Vec<Option<CancelReason>> {
        self.ended.lock().unwrap().iter().map(|(_, r)| *r).collect()
    }

    pub fn events(&self) -> Vec<(u32, Vec<StateVariableValue>)> {
        self.events.lock().unwrap().clone()
    }

    pub fn value_changes(&self) -> Vec<StateVariableValue> {
        self.values.lock().unwrap().clone()
    }

    pub fn missed(&self) -> Vec<u32> {
        self.missed.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<EstablishFailure> {
        self.failures.lock().unwrap().clone()
    }
}

impl SubscriptionListener for CollectingSubscriptionListener {
    fn established(&self, sid: &str) {
        self.established.lock().unwrap().push(sid.to_string());
    }

    fn ended(&self, sid: &str, reason: Option<CancelReason>, _response: Option<&StreamResponse>) {
        self.ended.lock().unwrap().push((sid.to_string(), reason));
    }

    fn event_received(&self, _sid: &str, sequence: u32, changes: &[StateVariableValue]) {
        self.events.lock().unwrap().push((sequence, changes.to_vec()));
    }

    fn value_changed(&self, _sid: &str, change: &StateVariableValue) {
        self.values.lock().unwrap().push(change.clone());
    }

    fn events_missed(&self, _sid: &str, missed: u32) {
        self.missed.lock().unwrap().push(missed);
    }

    fn establish_failed(&self, failure: &EstablishFailure) {
        self.failures.lock().unwrap().push(failure.clone());
    }
}

/// Answers every exchange with a canned response and records requests.
pub struct CannedStreamClient {
    response: Mutex<Option<UpnpMessage>>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl CannedStreamClient {
    pub fn answering(response: UpnpMessage) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(response)),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A client where the device never answers.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_response(&self, response: Option<UpnpMessage>) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl StreamClient for CannedStreamClient {
    async fn send_request(&self, request: StreamRequest) -> Option<StreamResponse> {
        self.requests.lock().unwrap().push(request);
        self.response
            .lock()
            .unwrap()
            .clone()
            .map(|message| StreamResponse { message })
    }
}

struct NoopHandler;

#[async_trait]
impl ProtocolHandler for NoopHandler {
    async fn handle_datagram(&self, _datagram: IncomingDatagram) {}

    async fn handle_stream(&self, job: StreamJob) {
        job.respond(UpnpMessage::ok());
    }
}

/// A router bound to 192.168.1.10 whose stream client is the given mock.
pub fn router_with_stream_client(client: Arc<CannedStreamClient>) -> Arc<Router> {
    let network = Arc::new(
        NetworkAddressFactory::with_addresses(
            NetworkConfig::default(),
            vec![BoundAddress {
                interface: "test0".to_string(),
                address: Ipv4Addr::new(192, 168, 1, 10),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                broadcast: None,
                hardware: None,
            }],
        )
        .unwrap(),
    );
    Router::new(
        RouterConfig::default(),
        network,
        vec![],
        Some(client),
        Arc::new(NoopHandler),
    )
}

/// `name=value` lines, one per variable. Enough structure to test the
/// engine without dragging XML in.
pub struct LineBodyProcessor;

impl EventBodyProcessor for LineBodyProcessor {
    fn write_body(&self, changes: &[StateVariableValue]) -> String {
        let mut out = String::new();
        for change in changes {
            out.push_str(&change.name);
            out.push('=');
            out.push_str(&change.value.to_string());
            out.push('\n');
        }
        out
    }

    fn read_body(&self, body: &str) -> Result<Vec<StateVariableValue>, BodyError> {
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.split_once('=')
                    .map(|(name, value)| {
                        StateVariableValue::new(name, StateValue::Text(value.to_string()))
                    })
                    .ok_or_else(|| BodyError(line.to_string()))
            })
            .collect()
    }
}
