// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The `baggage` header and the dynamic sampling context it carries.
//!
//! # Format
//!
//! A comma-separated list of `key=value` members with percent-encoded values:
//!
//! ```text
//! baggage: sentry-trace_id=771a43a4192642f0b136d5159a501700,sentry-sample_rate=0.5,other-vendor=abc
//! ```
//!
//! Members prefixed with `sentry-` form the dynamic sampling context and are
//! stored without the prefix. Every other member belongs to a third party and
//! is forwarded untouched.
//!
//! # Mutability
//!
//! Baggage received with Sentry members is frozen: the head of the trace
//! already decided its sampling context and downstream services must forward
//! it as is. Baggage without Sentry members may be populated once from the
//! local transaction.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::error::Error;
use crate::propagation::id::TraceId;
use crate::sampling::{format_sample_rand_trimmed, format_sample_rate};

/// HTTP header carrying the baggage list.
pub const BAGGAGE_HEADER: &str = "baggage";

/// Prefix marking a baggage member as part of the dynamic sampling context.
pub const SENTRY_PREFIX: &str = "sentry-";

pub const TRACE_ID_KEY: &str = "trace_id";
pub const SAMPLE_RATE_KEY: &str = "sample_rate";
pub const SAMPLE_RAND_KEY: &str = "sample_rand";
pub const SAMPLED_KEY: &str = "sampled";

/// Characters left as is when encoding: alphanumerics and `-_.~/`.
const BAGGAGE_VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Sampling state of a local transaction, used to fill mutable baggage.
pub trait TransactionSampling {
    fn trace_id(&self) -> &TraceId;
    fn sample_rate(&self) -> Option<f64>;
    fn sampled(&self) -> Option<bool>;
    fn sample_rand(&self) -> f64;
}

/// Parsed `baggage` header.
#[derive(Clone, Debug, PartialEq)]
pub struct Baggage {
    sentry_items: BTreeMap<String, String>,
    third_party_items: String,
    mutable: bool,
}

impl Default for Baggage {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl Baggage {
    /// Creates mutable baggage holding only the given Sentry items.
    #[must_use]
    pub fn new(sentry_items: BTreeMap<String, String>) -> Self {
        Self {
            sentry_items,
            third_party_items: String::new(),
            mutable: true,
        }
    }

    /// Parses an incoming `baggage` header.
    ///
    /// Members that cannot be decoded are logged and skipped; the rest of the
    /// header is still used.
    #[must_use]
    pub fn from_incoming_header(header: &str) -> Self {
        let mut baggage = Self::default();

        for item in header.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if let Err(e) = baggage.parse_item(item) {
                debug!("{e}");
            }
        }

        baggage
    }

    fn parse_item(&mut self, item: &str) -> Result<(), Error> {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| Error::invalid_baggage_entry(item, "missing `=`"))?;
        let key = key.trim();

        let Some(sentry_key) = key.strip_prefix(SENTRY_PREFIX) else {
            if key.is_empty() {
                return Err(Error::invalid_baggage_entry(item, "empty key"));
            }
            if !self.third_party_items.is_empty() {
                self.third_party_items.push(',');
            }
            self.third_party_items.push_str(item);
            return Ok(());
        };

        let sentry_key = decode(sentry_key)
            .ok_or_else(|| Error::invalid_baggage_entry(item, "key is not valid UTF-8"))?;
        if sentry_key.is_empty() {
            return Err(Error::invalid_baggage_entry(item, "empty key"));
        }
        let value = decode(value.trim())
            .ok_or_else(|| Error::invalid_baggage_entry(item, "value is not valid UTF-8"))?;

        self.sentry_items.insert(sentry_key, value);
        self.mutable = false;
        Ok(())
    }

    /// Serializes the Sentry items, optionally followed by third-party members.
    #[must_use]
    pub fn serialize(&self, include_third_party: bool) -> String {
        let mut items: Vec<String> = self
            .sentry_items
            .iter()
            .map(|(key, value)| format!("{SENTRY_PREFIX}{}={}", encode(key), encode(value)))
            .collect();

        if include_third_party && !self.third_party_items.is_empty() {
            items.push(self.third_party_items.clone());
        }

        items.join(",")
    }

    /// Fills in the local transaction's sampling state.
    ///
    /// Only keys not already present are written, so an inherited
    /// `sample_rand` or `sample_rate` survives. Frozen baggage is left alone.
    pub fn populate_from_transaction(&mut self, transaction: &dyn TransactionSampling) {
        if !self.mutable {
            return;
        }

        self.sentry_items
            .entry(TRACE_ID_KEY.to_string())
            .or_insert_with(|| transaction.trace_id().to_string());
        if let Some(sample_rate) = transaction.sample_rate() {
            self.sentry_items
                .entry(SAMPLE_RATE_KEY.to_string())
                .or_insert_with(|| format_sample_rate(sample_rate));
        }
        if let Some(sampled) = transaction.sampled() {
            self.sentry_items
                .entry(SAMPLED_KEY.to_string())
                .or_insert_with(|| sampled.to_string());
        }
        self.sentry_items
            .entry(SAMPLE_RAND_KEY.to_string())
            .or_insert_with(|| format_sample_rand_trimmed(transaction.sample_rand()));
    }

    /// The Sentry items as a dynamic sampling context.
    #[must_use]
    pub fn dynamic_sampling_context(&self) -> BTreeMap<String, String> {
        self.sentry_items.clone()
    }

    #[must_use]
    pub fn sentry_items(&self) -> &BTreeMap<String, String> {
        &self.sentry_items
    }

    pub fn sentry_items_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.sentry_items
    }

    #[must_use]
    pub fn third_party_items(&self) -> &str {
        &self.third_party_items
    }

    /// Replaces the third-party members (raw, already encoded).
    pub fn set_third_party_items(&mut self, items: impl Into<String>) {
        self.third_party_items = items.into();
    }

    /// `sample_rand` if present and within `[0, 1)`.
    #[must_use]
    pub fn sample_rand(&self) -> Option<f64> {
        self.parse_float(SAMPLE_RAND_KEY)
            .filter(|value| (0.0..1.0).contains(value))
    }

    /// `sample_rate` if present and within `[0, 1]`.
    #[must_use]
    pub fn sample_rate(&self) -> Option<f64> {
        self.parse_float(SAMPLE_RATE_KEY)
            .filter(|value| (0.0..=1.0).contains(value))
    }

    fn parse_float(&self, key: &str) -> Option<f64> {
        self.sentry_items
            .get(key)
            .and_then(|value| value.trim().parse::<f64>().ok())
    }

    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn freeze(&mut self) {
        self.mutable = false;
    }
}

fn decode(value: &str) -> Option<String> {
    percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, BAGGAGE_VALUE_ENCODE_SET).to_string()
}
