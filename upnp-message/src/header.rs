//! Ordered multi-value header collection and the typed-header contract.

use std::fmt;

use crate::error::MessageError;

/// Known UPnP header names with their exact wire casing.
///
/// Unrecognized names are preserved verbatim in `Other` so messages
/// survive a parse/format round trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeaderName {
    Host,
    CacheControl,
    Location,
    Nt,
    Nts,
    Server,
    Usn,
    St,
    Man,
    Mx,
    Ext,
    Date,
    Callback,
    Sid,
    Timeout,
    Seq,
    ContentType,
    HardwareAddress,
    Other(String),
}

impl HeaderName {
    /// The exact casing used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Host => "HOST",
            HeaderName::CacheControl => "CACHE-CONTROL",
            HeaderName::Location => "LOCATION",
            HeaderName::Nt => "NT",
            HeaderName::Nts => "NTS",
            HeaderName::Server => "SERVER",
            HeaderName::Usn => "USN",
            HeaderName::St => "ST",
            HeaderName::Man => "MAN",
            HeaderName::Mx => "MX",
            HeaderName::Ext => "EXT",
            HeaderName::Date => "DATE",
            HeaderName::Callback => "CALLBACK",
            HeaderName::Sid => "SID",
            HeaderName::Timeout => "TIMEOUT",
            HeaderName::Seq => "SEQ",
            HeaderName::ContentType => "CONTENT-TYPE",
            HeaderName::HardwareAddress => "X-HWADDR",
            HeaderName::Other(s) => s,
        }
    }

    /// Case-insensitive lookup from wire text.
    pub fn from_wire(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "HOST" => HeaderName::Host,
            "CACHE-CONTROL" => HeaderName::CacheControl,
            "LOCATION" => HeaderName::Location,
            "NT" => HeaderName::Nt,
            "NTS" => HeaderName::Nts,
            "SERVER" => HeaderName::Server,
            "USN" => HeaderName::Usn,
            "ST" => HeaderName::St,
            "MAN" => HeaderName::Man,
            "MX" => HeaderName::Mx,
            "EXT" => HeaderName::Ext,
            "DATE" => HeaderName::Date,
            "CALLBACK" => HeaderName::Callback,
            "SID" => HeaderName::Sid,
            "TIMEOUT" => HeaderName::Timeout,
            "SEQ" => HeaderName::Seq,
            "CONTENT-TYPE" => HeaderName::ContentType,
            "X-HWADDR" => HeaderName::HardwareAddress,
            // Unknown names keep their original casing
            _ => HeaderName::Other(s.to_string()),
        }
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A header value with a dedicated in-memory representation.
///
/// Where the original design probed reflective header candidates, each
/// typed header here is a concrete type with one `parse` and one `format`;
/// values with several wire shapes (e.g. search targets) try their
/// sub-parsers in a fixed declaration order.
pub trait TypedHeader: Sized {
    /// The header name this type binds to.
    fn name() -> HeaderName;

    /// Parse the raw wire value.
    fn parse(raw: &str) -> Result<Self, MessageError>;

    /// Produce the exact wire value.
    fn format(&self) -> String;
}

/// Ordered multi-value header collection.
///
/// Keys may repeat; insertion order is preserved both globally and per
/// name. Values are stored as raw wire text and interpreted on demand
/// through [`TypedHeader`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(HeaderName, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw value, keeping any existing values for the same name.
    pub fn add(&mut self, name: HeaderName, value: impl Into<String>) {
        self.entries.push((name, value.into()));
    }

    /// Replace all values for a name with a single value.
    pub fn set(&mut self, name: HeaderName, value: impl Into<String>) {
        self.remove(&name);
        self.add(name, value);
    }

    pub fn remove(&mut self, name: &HeaderName) {
        self.entries.retain(|(n, _)| n != name);
    }

    /// First raw value for a name, if present.
    pub fn first(&self, name: &HeaderName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All raw values for a name, in insertion order.
    pub fn all<'a>(&'a self, name: &'a HeaderName) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }

    /// Parse the first value of `H`'s name, `None` if absent or malformed.
    ///
    /// Malformed values are treated the same as missing ones; protocol
    /// code drops such messages rather than erroring (best-effort input).
    pub fn typed<H: TypedHeader>(&self) -> Option<H> {
        self.first(&H::name()).and_then(|raw| H::parse(raw).ok())
    }

    /// Append a typed header in its wire form.
    pub fn add_typed<H: TypedHeader>(&mut self, header: &H) {
        self.add(H::name(), header.format());
    }

    /// Replace any existing values of `H`'s name with this one.
    pub fn set_typed<H: TypedHeader>(&mut self, header: &H) {
        self.set(H::name(), header.format());
    }

    /// Write all entries as `NAME: value\r\n` lines.
    pub fn write_wire(&self, out: &mut String) {
        for (name, value) in &self.entries {
            out.push_str(name.as_str());
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
    }

    /// Parse one `NAME: value` line, silently skipping malformed input.
    ///
    /// Headers with an empty value (e.g. `EXT:`) are kept.
    pub fn parse_wire_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match line.find(':') {
            Some(colon) => {
                let (name, rest) = line.split_at(colon);
                let name = name.trim();
                if name.is_empty() {
                    return;
                }
                self.add(HeaderName::from_wire(name), rest[1..].trim().to_string());
            }
            None => {}
        }
    }
}

/// Encode an ordered list into the `<v1>,<v2>` wire form.
///
/// Embedded backslashes and commas are escaped with a backslash so the
/// list survives a round trip through [`parse_list`].
pub fn encode_list<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        for c in value.as_ref().chars() {
            if c == '\\' || c == ',' {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// Split a comma-separated list, honoring backslash escapes.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in raw.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            values.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() || !values.is_empty() {
        values.push(current);
    }
    values
}
