//! State variable declarations and values.

use std::fmt;
use std::time::Duration;

/// The value space of a state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Text,
    Number,
    Bool,
}

/// Declaration of one service state variable.
///
/// `max_rate` and `min_delta` drive event moderation: a variable with a
/// rate is sent at most once per interval, and a numeric variable with a
/// delta is only sent when it moved by at least that much since the last
/// sent value. Variables with neither are always sent.
#[derive(Debug, Clone)]
pub struct StateVariable {
    pub name: String,
    pub kind: VariableKind,
    /// Whether changes to this variable are evented at all
    pub sends_events: bool,
    /// Minimum interval between sent events for this variable
    pub max_rate: Option<Duration>,
    /// Minimum absolute change since the last sent numeric value
    pub min_delta: Option<i64>,
}

impl StateVariable {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Text,
            sends_events: true,
            max_rate: None,
            min_delta: None,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Number,
            sends_events: true,
            max_rate: None,
            min_delta: None,
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Bool,
            sends_events: true,
            max_rate: None,
            min_delta: None,
        }
    }

    pub fn not_evented(mut self) -> Self {
        self.sends_events = false;
        self
    }

    pub fn with_max_rate(mut self, rate: Duration) -> Self {
        self.max_rate = Some(rate);
        self
    }

    pub fn with_min_delta(mut self, delta: i64) -> Self {
        self.min_delta = Some(delta);
        self
    }

    /// Whether any moderation rule applies to this variable.
    pub fn is_moderated(&self) -> bool {
        self.max_rate.is_some() || self.min_delta.is_some()
    }
}

/// A concrete value of a state variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Text(String),
    Number(i64),
    Bool(bool),
}

impl StateValue {
    pub fn kind(&self) -> VariableKind {
        match self {
            StateValue::Text(_) => VariableKind::Text,
            StateValue::Number(_) => VariableKind::Number,
            StateValue::Bool(_) => VariableKind::Bool,
        }
    }

    /// The numeric value, for delta moderation. `None` for non-numbers.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Text(s) => f.write_str(s),
            StateValue::Number(n) => write!(f, "{n}"),
            StateValue::Bool(b) => write!(f, "{}", if *b { "1" } else { "0" }),
        }
    }
}

/// A named value, the unit of event delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariableValue {
    pub name: String,
    pub value: StateValue,
}

impl StateVariableValue {
    pub fn new(name: impl Into<String>, value: StateValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
