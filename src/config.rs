// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

/// Maximum time to wait for a response frame after a request has been written.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between two requests on the line.
pub const QUEUE_TIMEOUT: Duration = Duration::from_millis(50);

/// Number of attempts of retried requests.
pub const DEFAULT_RETRY_COUNT: usize = 3;

/// Master configuration.
///
/// With the `serde` feature it reads from the keys `responseTimeout` and
/// `queueTimeout` (milliseconds), `debug` and `defaultRetryCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
pub struct Config {
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub response_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub queue_timeout: Duration,
    /// Trace written requests and received responses.
    pub debug: bool,
    pub default_retry_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
            queue_timeout: QUEUE_TIMEOUT,
            debug: false,
            default_retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub const fn with_default_retry_count(mut self, count: usize) -> Self {
        self.default_retry_count = count;
        self
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
