//! Transport limits resolution.
//!
//! # Responsibilities
//! - Turn optional, user-supplied limit values into concrete transport
//!   limits, in one place
//! - Apply documented defaults and floors
//! - Scale connection ceilings by core count when configured
//!
//! # Design Decisions
//! - Every tunable arrives as an `Option`; this module is the only place
//!   defaults are resolved, so the default policy is testable in isolation
//! - Connection ceilings have no default: absent or zero is a
//!   configuration error, not a guess
//! - Resolution runs once at listener-construction time, never per
//!   connection; the result is immutable

use std::time::Duration;

use crate::error::ConfigError;

/// Default keep-alive timeout when unset or below the floor.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default request-headers timeout when unset or below the floor.
pub const DEFAULT_REQUEST_HEADERS_TIMEOUT: Duration = Duration::from_secs(60);
/// Default HTTP/2 stream cap per connection when unset or below the floor.
pub const DEFAULT_MAX_STREAMS_PER_CONNECTION: u32 = 100;

const TIMEOUT_FLOOR: Duration = Duration::from_secs(1);
const STREAMS_FLOOR: u32 = 1;

/// Declarative, optional limit inputs from the configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitsConfig {
    /// Multiply the connection ceilings by the available core count.
    pub scale_by_core_count: Option<bool>,
    /// Ceiling on concurrent connections. Required, non-zero.
    pub max_concurrent_connections: Option<u32>,
    /// Ceiling on concurrent connections upgraded to HTTP/2 service.
    /// Required, non-zero.
    pub max_concurrent_upgraded_connections: Option<u32>,
    pub keep_alive_timeout: Option<Duration>,
    pub request_headers_timeout: Option<Duration>,
    pub max_streams_per_connection: Option<u32>,
}

/// Effective transport limits, applied to exactly one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    pub max_concurrent_connections: usize,
    pub max_concurrent_upgraded_connections: usize,
    pub keep_alive_timeout: Duration,
    pub request_headers_timeout: Duration,
    pub max_streams_per_connection: u32,
}

impl TransportLimits {
    /// Resolve effective limits from the configuration snapshot.
    ///
    /// `core_count` is the multiplier used when core scaling is enabled;
    /// pass [`available_core_count`] in production code.
    pub fn resolve(config: &LimitsConfig, core_count: usize) -> Result<Self, ConfigError> {
        let scale = config.scale_by_core_count.unwrap_or(false);

        let connections = resolve_ceiling(
            config.max_concurrent_connections,
            scale,
            core_count,
            "max_concurrent_connections",
        )?;
        let upgraded = resolve_ceiling(
            config.max_concurrent_upgraded_connections,
            scale,
            core_count,
            "max_concurrent_upgraded_connections",
        )?;

        Ok(Self {
            max_concurrent_connections: connections,
            max_concurrent_upgraded_connections: upgraded,
            keep_alive_timeout: resolve_timeout(
                config.keep_alive_timeout,
                DEFAULT_KEEP_ALIVE_TIMEOUT,
            ),
            request_headers_timeout: resolve_timeout(
                config.request_headers_timeout,
                DEFAULT_REQUEST_HEADERS_TIMEOUT,
            ),
            max_streams_per_connection: match config.max_streams_per_connection {
                Some(streams) if streams >= STREAMS_FLOOR => streams,
                _ => DEFAULT_MAX_STREAMS_PER_CONNECTION,
            },
        })
    }
}

fn resolve_ceiling(
    configured: Option<u32>,
    scale: bool,
    core_count: usize,
    field: &'static str,
) -> Result<usize, ConfigError> {
    match configured {
        None | Some(0) => Err(ConfigError::MissingConnectionLimit { field }),
        Some(value) => {
            let value = value as usize;
            Ok(if scale {
                value.saturating_mul(core_count.max(1))
            } else {
                value
            })
        }
    }
}

fn resolve_timeout(configured: Option<Duration>, default: Duration) -> Duration {
    match configured {
        Some(timeout) if timeout >= TIMEOUT_FLOOR => timeout,
        _ => default,
    }
}

/// Number of cores available to this process, at least 1.
pub fn available_core_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}
