//! SSDP timing and repetition parameters.

use std::time::Duration;

/// Times an M-SEARCH is repeated per execution.
pub const SEARCH_REPEAT: u32 = 2;
/// Pause between M-SEARCH repetitions.
pub const SEARCH_INTERVAL: Duration = Duration::from_millis(100);
/// Times an alive/byebye bulk is repeated per execution.
pub const NOTIFY_REPEAT: u32 = 3;
/// Pause between notification bulk repetitions.
pub const NOTIFY_INTERVAL: Duration = Duration::from_millis(150);
/// MX used when a search carries none, or an out-of-range one.
pub const DEFAULT_MX_SECONDS: u32 = 3;
/// Largest MX honored; anything above falls back to the default.
pub const MAX_MX_SECONDS: u32 = 120;
/// Advertised validity of our presence announcements.
pub const DEFAULT_MAX_AGE_SECONDS: u32 = 1800;

/// Tunable SSDP behavior, defaulting to the constants above.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    pub search_repeat: u32,
    pub search_interval: Duration,
    pub notify_repeat: u32,
    pub notify_interval: Duration,
    pub default_mx_seconds: u32,
    pub max_mx_seconds: u32,
    pub max_age_seconds: u32,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            search_repeat: SEARCH_REPEAT,
            search_interval: SEARCH_INTERVAL,
            notify_repeat: NOTIFY_REPEAT,
            notify_interval: NOTIFY_INTERVAL,
            default_mx_seconds: DEFAULT_MX_SECONDS,
            max_mx_seconds: MAX_MX_SECONDS,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
        }
    }
}
