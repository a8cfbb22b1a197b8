// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Sentry Propagation
//!
//! Distributed trace propagation and deterministic sampling for Sentry-style
//! traces.
//!
//! ## Overview
//!
//! When a request crosses a service boundary, two headers carry its trace:
//! `sentry-trace` (trace id, parent span, sampling decision) and `baggage`
//! (the dynamic sampling context). This crate decodes and encodes both, keeps
//! them in a [`PropagationContext`], and makes sampling decisions that every
//! service in the trace agrees on, using a `sample_rand` value derived
//! deterministically from the trace id.
//!
//! ## Architecture
//!
//! - [`propagation`]: identifiers, header codecs, carriers and the context
//! - [`sampling`]: `sample_rand` backfilling and the sampling predicate
//! - [`transaction`]: starting and continuing transactions
//! - [`config`]: configuration from the environment or serde
//! - [`logger`]: optional log formatter and subscriber setup
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//!
//! use sentry_propagation::config::Config;
//! use sentry_propagation::transaction::TracingClient;
//!
//! let client = TracingClient::new(Config {
//!     traces_sample_rate: Some(0.5),
//!     ..Default::default()
//! });
//! let headers = HashMap::from([
//!     (
//!         "sentry-trace".to_string(),
//!         "00000000000000000000000000000000-0000000000000000".to_string(),
//!     ),
//!     (
//!         "baggage".to_string(),
//!         "sentry-sample_rand=0.1,sentry-sample_rate=0.5".to_string(),
//!     ),
//! ]);
//!
//! let transaction = client.continue_trace(&headers, "GET /checkout");
//! assert!(transaction.sampled());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Configuration from the environment and serde sources
pub mod config;

/// Error types for propagation and configuration
pub mod error;

/// Log formatting and subscriber setup
pub mod logger;

/// Header codecs, carriers and the propagation context
pub mod propagation;

/// Sampling decisions and `sample_rand` backfilling
pub mod sampling;

/// Transactions and the client that starts them
pub mod transaction;

pub use config::Config;
pub use error::{ConfigError, Error};
pub use propagation::baggage::Baggage;
pub use propagation::context::PropagationContext;
pub use propagation::id::{SpanId, TraceId};
pub use propagation::sentry_trace::SentryTrace;
pub use propagation::{Propagator, SentryPropagator};
pub use transaction::{Transaction, TracingClient};
