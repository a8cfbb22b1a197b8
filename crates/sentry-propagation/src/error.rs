// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for trace propagation and sampling.
//!
//! None of these errors are fatal. Every caller inside this crate recovers
//! locally and logs the error:
//! - **Malformed `sentry-trace` header**: the trace starts fresh (no parent)
//! - **Invalid baggage entry**: the entry is skipped, the rest is kept
//! - **Empty `sample_rand` range**: no `sample_rand` is backfilled
//!
//! Configuration errors are reported separately by [`ConfigError`] since they
//! are surfaced to the host at startup.

use thiserror::Error;

/// Error while decoding propagated trace data or deriving a sampling value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A header (or an identifier inside it) does not match its grammar.
    ///
    /// Example: `"Cannot decode `sentry-trace` header: expected 32 hex trace id"`
    #[error("Cannot decode `{header}` header: {message}")]
    MalformedHeader {
        /// Name of the header or field being decoded.
        header: &'static str,
        /// What was wrong with it.
        message: &'static str,
    },

    /// A single `baggage` list member could not be decoded.
    #[error("Cannot decode baggage entry `{entry}`: {message}")]
    InvalidBaggageEntry {
        /// The raw list member, as received.
        entry: String,
        /// What was wrong with it.
        message: &'static str,
    },

    /// `sample_rand` cannot be drawn from an empty interval, which happens when
    /// the parent was sampled with a rate of `0.0` (or not sampled with `1.0`).
    #[error("Cannot generate sample_rand in empty interval [{lower}, {upper})")]
    EmptySampleRandRange { lower: f64, upper: f64 },
}

impl Error {
    #[must_use]
    pub fn malformed_header(header: &'static str, message: &'static str) -> Self {
        Self::MalformedHeader { header, message }
    }

    #[must_use]
    pub fn invalid_baggage_entry(entry: &str, message: &'static str) -> Self {
        Self::InvalidBaggageEntry {
            entry: entry.to_string(),
            message,
        }
    }
}

/// Errors raised while loading or validating [`crate::config::Config`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid traces sample rate {0}: must be between 0.0 and 1.0")]
    InvalidSampleRate(f64),

    #[error("Invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}
