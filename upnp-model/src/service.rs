//! Local services: evented value store and synchronous change delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;
use upnp_message::ServiceType;

use crate::error::{ModelError, Result};
use crate::state::{StateValue, StateVariable, StateVariableValue, VariableKind};

/// Receiver of state-change batches from a [`LocalService`].
pub trait ChangeListener: Send + Sync {
    fn state_changed(&self, changes: &[StateVariableValue]);
}

/// Handle returned by [`ChangeRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Explicit listener registry with synchronous, same-call notification.
///
/// Listeners run on the caller's thread inside `notify`, so a listener
/// reading the service snapshot sees state consistent with the change it
/// was told about. The listener list is cloned out of the lock before
/// invocation, so a listener may unregister itself (or another) from
/// within its callback without deadlocking.
#[derive(Default)]
pub struct ChangeRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ChangeListener>)>>,
}

impl std::fmt::Debug for ChangeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ChangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn ChangeListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, listener));
        id
    }

    pub fn unregister(&self, id: ListenerId) {
        self.lock_listeners().retain(|(lid, _)| *lid != id);
    }

    /// Deliver one batch to every registered listener, synchronously.
    pub fn notify(&self, changes: &[StateVariableValue]) {
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.state_changed(changes);
        }
    }

    pub fn len(&self) -> usize {
        self.lock_listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn ChangeListener>)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An in-process UPnP service: variable declarations, current values,
/// and the change registry local subscriptions attach to.
#[derive(Debug)]
pub struct LocalService {
    service_type: ServiceType,
    service_id: String,
    variables: Vec<StateVariable>,
    values: Mutex<HashMap<String, StateValue>>,
    changes: ChangeRegistry,
}

impl LocalService {
    /// Create a service with all variables at their kind's default value
    /// (empty text, zero, false).
    pub fn new(
        service_type: ServiceType,
        service_id: impl Into<String>,
        variables: Vec<StateVariable>,
    ) -> Self {
        let values = variables
            .iter()
            .map(|var| {
                let initial = match var.kind {
                    VariableKind::Text => StateValue::Text(String::new()),
                    VariableKind::Number => StateValue::Number(0),
                    VariableKind::Bool => StateValue::Bool(false),
                };
                (var.name.clone(), initial)
            })
            .collect();
        Self {
            service_type,
            service_id: service_id.into(),
            variables,
            values: Mutex::new(values),
            changes: ChangeRegistry::new(),
        }
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn variables(&self) -> &[StateVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&StateVariable> {
        self.variables.iter().find(|var| var.name == name)
    }

    pub fn changes(&self) -> &ChangeRegistry {
        &self.changes
    }

    /// Snapshot of every evented variable's current value, in
    /// declaration order.
    pub fn current_evented_values(&self) -> Result<Vec<StateVariableValue>> {
        let values = self.lock_values();
        self.variables
            .iter()
            .filter(|var| var.sends_events)
            .map(|var| {
                values
                    .get(&var.name)
                    .cloned()
                    .map(|value| StateVariableValue::new(var.name.clone(), value))
                    .ok_or_else(|| ModelError::SnapshotFailed(var.name.clone()))
            })
            .collect()
    }

    /// Apply a batch of value changes, then notify listeners with the
    /// evented subset on the calling thread.
    pub fn set_values(&self, changes: Vec<StateVariableValue>) -> Result<()> {
        let mut evented = Vec::new();
        {
            let mut values = self.lock_values();
            for change in &changes {
                let var = self
                    .variable(&change.name)
                    .ok_or_else(|| ModelError::UnknownVariable(change.name.clone()))?;
                if change.value.kind() != var.kind {
                    return Err(ModelError::KindMismatch {
                        variable: var.name.clone(),
                        expected: match var.kind {
                            VariableKind::Text => "text",
                            VariableKind::Number => "a number",
                            VariableKind::Bool => "a boolean",
                        },
                    });
                }
                values.insert(change.name.clone(), change.value.clone());
                if var.sends_events {
                    evented.push(change.clone());
                }
            }
        }

        if !evented.is_empty() {
            debug!(
                service = %self.service_type,
                changed = evented.len(),
                "notifying state change"
            );
            self.changes.notify(&evented);
        }
        Ok(())
    }

    /// Convenience for single-variable updates.
    pub fn set_value(&self, name: impl Into<String>, value: StateValue) -> Result<()> {
        self.set_values(vec![StateVariableValue::new(name, value)])
    }

    fn lock_values(&self) -> std::sync::MutexGuard<'_, HashMap<String, StateValue>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}
