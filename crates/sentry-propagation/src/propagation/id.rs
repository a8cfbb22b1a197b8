// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace and span identifiers.
//!
//! Identifiers travel on the wire as fixed-width lowercase hex:
//! - **Trace ID**: 128 bits, 32 characters
//! - **Span ID**: 64 bits, 16 characters
//!
//! Identifiers assigned through `From` are stored as given. Only
//! [`TraceId::parse`] and [`SpanId::parse`] validate, which is what the
//! header codec uses for data coming off the wire.

use std::fmt;

use crate::error::Error;

pub const TRACE_ID_LENGTH: usize = 32;
pub const SPAN_ID_LENGTH: usize = 16;

fn is_hex_of_length(value: &str, length: usize) -> bool {
    value.len() == length && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Identifier shared by every span of a trace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(String);

impl TraceId {
    /// Generates a random 128-bit trace id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{:032x}", fastrand::u128(..)))
    }

    /// Parses a trace id received from another service.
    pub fn parse(value: &str) -> Result<Self, Error> {
        if is_hex_of_length(value, TRACE_ID_LENGTH) {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::malformed_header(
                "trace_id",
                "expected 32 hexadecimal characters",
            ))
        }
    }

    /// Whether this id has the wire shape (32 hex characters).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_hex_of_length(&self.0, TRACE_ID_LENGTH)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a single span within a trace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(String);

impl SpanId {
    /// Generates a random 64-bit span id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{:016x}", fastrand::u64(..)))
    }

    /// Parses a span id received from another service.
    pub fn parse(value: &str) -> Result<Self, Error> {
        if is_hex_of_length(value, SPAN_ID_LENGTH) {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::malformed_header(
                "span_id",
                "expected 16 hexadecimal characters",
            ))
        }
    }

    /// Whether this id has the wire shape (16 hex characters).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_hex_of_length(&self.0, SPAN_ID_LENGTH)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_id_conversions {
    ($id:ty) => {
        impl From<String> for $id {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $id {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $id {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $id {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $id {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

impl_id_conversions!(TraceId);
impl_id_conversions!(SpanId);
