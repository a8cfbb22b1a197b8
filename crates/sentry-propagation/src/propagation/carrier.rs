// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carrier traits for reading and writing propagation headers.
//!
//! Carriers abstract over the transport holding the `sentry-trace` and
//! `baggage` headers: an HTTP header map, a message queue's metadata object,
//! a JSON payload.
//!
//! # Case Insensitivity
//!
//! All carrier implementations lowercase keys, so `Sentry-Trace` and
//! `sentry-trace` are the same header.
//!
//! # Inspired By
//!
//! Code inspired and adapted from the OpenTelemetry Rust project:
//! <https://github.com/open-telemetry/opentelemetry-rust/blob/main/opentelemetry/src/propagation/mod.rs>

use std::collections::HashMap;

use serde_json::Value;

/// Prefix CGI/WSGI style environments put in front of HTTP header names.
const HTTP_ENVIRON_PREFIX: &str = "http_";

/// Writes propagation headers into a carrier.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use sentry_propagation::propagation::carrier::Injector;
///
/// let mut headers: HashMap<String, String> = HashMap::new();
/// headers.set("Sentry-Trace", "abc".to_string());
///
/// assert_eq!(headers.get("sentry-trace"), Some(&"abc".to_string()));
/// ```
pub trait Injector {
    /// Sets a key-value pair in the carrier. Keys are lowercased.
    fn set(&mut self, key: &str, value: String);
}

/// Reads propagation headers from a carrier.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use sentry_propagation::propagation::carrier::{Extractor, Injector};
///
/// let mut headers: HashMap<String, String> = HashMap::new();
/// headers.set("Baggage", "sentry-sample_rate=0.5".to_string());
///
/// assert_eq!(Extractor::get(&headers, "BAGGAGE"), Some("sentry-sample_rate=0.5"));
/// ```
pub trait Extractor {
    /// Gets a value from the carrier by key (case-insensitive).
    fn get(&self, key: &str) -> Option<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        // Maps built with `Injector::set` or `normalize_incoming_data` are
        // already lowercase; fall back to a scan for maps built by hand.
        let lowered = key.to_lowercase();
        if let Some(value) = self.get(&lowered) {
            return Some(value.as_str());
        }
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&lowered))
            .map(|(_, v)| v.as_str())
    }
}

/// Only `Value::Object` carriers are written to; anything else is ignored.
impl Injector for Value {
    fn set(&mut self, key: &str, value: String) {
        if let Value::Object(map) = self {
            map.insert(key.to_lowercase(), Value::String(value));
        }
    }
}

/// Only string members of a `Value::Object` are readable.
impl Extractor for Value {
    fn get(&self, key: &str) -> Option<&str> {
        if let Value::Object(map) = self {
            let lowered = key.to_lowercase();
            map.get(&lowered)
                .or_else(|| {
                    map.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&lowered))
                        .map(|(_, v)| v)
                })
                .and_then(Value::as_str)
        } else {
            None
        }
    }
}

/// Normalizes incoming header names so they can be looked up as
/// `sentry-trace` and `baggage`.
///
/// Keys are lowercased, a leading `HTTP_` is dropped and `_` becomes `-`, which
/// turns a CGI/WSGI environ key like `HTTP_SENTRY_TRACE` into `sentry-trace`.
/// Later duplicates overwrite earlier ones.
///
/// # Example
///
/// ```
/// use sentry_propagation::propagation::carrier::{normalize_incoming_data, Extractor};
///
/// let headers = normalize_incoming_data([("HTTP_SENTRY_TRACE", "abc"), ("Baggage", "x=y")]);
///
/// assert_eq!(Extractor::get(&headers, "sentry-trace"), Some("abc"));
/// assert_eq!(Extractor::get(&headers, "baggage"), Some("x=y"));
/// ```
pub fn normalize_incoming_data<'a, I>(incoming: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    incoming
        .into_iter()
        .map(|(key, value)| {
            let mut key = key.to_lowercase();
            if let Some(stripped) = key.strip_prefix(HTTP_ENVIRON_PREFIX) {
                key = stripped.to_string();
            }
            (key.replace('_', "-"), value.to_string())
        })
        .collect()
}
