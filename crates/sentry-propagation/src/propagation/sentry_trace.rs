// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The compact `sentry-trace` header.
//!
//! # Format
//!
//! ```text
//! sentry-trace: {trace_id:32 hex}-{span_id:16 hex}[-{sampled}]
//! ```
//!
//! `sampled` is `1` (sampled), `0` (not sampled) or omitted (no decision yet).
//!
//! # Example
//!
//! ```text
//! sentry-trace: 771a43a4192642f0b136d5159a501700-b4f3b0e4e9a2a1c7-1
//! ```

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;
use crate::propagation::id::{SpanId, TraceId};

/// HTTP header carrying the trace id, parent span id and sampling flag.
pub const SENTRY_TRACE_HEADER: &str = "sentry-trace";

lazy_static! {
    /// Regex for parsing the `sentry-trace` header.
    ///
    /// - Trace ID: 32 lowercase hex digits
    /// - Span ID: 16 lowercase hex digits
    /// - Sampled: optional `0` or `1`
    static ref SENTRY_TRACE_REGEX: Regex =
        Regex::new(r"^[ \t]*([0-9a-f]{32})-([0-9a-f]{16})(?:-([01]))?[ \t]*$")
            .expect("failed creating regex");
}

/// Decoded `sentry-trace` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentryTrace {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: Option<bool>,
}

impl SentryTrace {
    #[must_use]
    pub fn new(trace_id: TraceId, span_id: SpanId, sampled: Option<bool>) -> Self {
        Self {
            trace_id,
            span_id,
            sampled,
        }
    }
}

impl fmt::Display for SentryTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trace_id, self.span_id)?;
        if let Some(sampled) = self.sampled {
            write!(f, "-{}", if sampled { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl FromStr for SentryTrace {
    type Err = Error;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let captures = SENTRY_TRACE_REGEX.captures(header).ok_or_else(|| {
            Error::malformed_header(
                SENTRY_TRACE_HEADER,
                "expected `{32 hex}-{16 hex}[-{0|1}]`",
            )
        })?;

        let trace_id = TraceId::from(&captures[1]);
        let span_id = SpanId::from(&captures[2]);
        let sampled = captures.get(3).map(|m| m.as_str() == "1");

        Ok(Self {
            trace_id,
            span_id,
            sampled,
        })
    }
}
