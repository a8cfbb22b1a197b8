// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace context propagation across service boundaries.
//!
//! Two headers carry a trace from one service to the next:
//! - **`sentry-trace`**: trace id, parent span id and the parent's sampling
//!   decision ([`sentry_trace`])
//! - **`baggage`**: the dynamic sampling context, including the trace-wide
//!   `sample_rand` ([`baggage`])
//!
//! # Trace Context Flow
//!
//! ```text
//! Incoming Request Headers
//!   ↓
//! Extract (PropagationContext::from_incoming_data)
//!   ↓
//! PropagationContext (trace id, parent span, decision, sampling context)
//!   ↓
//! Process Request (start transaction, decide with sample_rand)
//!   ↓
//! Inject (write sentry-trace and baggage)
//!   ↓
//! Outgoing Request Headers
//! ```
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use sentry_propagation::config::Config;
//! use sentry_propagation::propagation::{Propagator, SentryPropagator};
//!
//! let propagator = SentryPropagator::new(Arc::new(Config::default()));
//! let incoming = HashMap::from([(
//!     "sentry-trace".to_string(),
//!     "771a43a4192642f0b136d5159a501700-b4f3b0e4e9a2a1c7-1".to_string(),
//! )]);
//!
//! let context = propagator.extract(&incoming);
//! assert_eq!(context.parent_sampled(), Some(true));
//!
//! let mut outgoing: HashMap<String, String> = HashMap::new();
//! propagator.inject(&context, &mut outgoing);
//! assert!(outgoing["sentry-trace"].starts_with("771a43a4192642f0b136d5159a501700-"));
//! ```

use std::sync::Arc;

use crate::config::Config;
use baggage::BAGGAGE_HEADER;
use carrier::{Extractor, Injector};
use context::PropagationContext;
use sentry_trace::SENTRY_TRACE_HEADER;

pub mod baggage;
pub mod carrier;
pub mod context;
pub mod id;
pub mod random;
pub mod sentry_trace;

/// Reads trace context from incoming carriers and writes it to outgoing ones.
pub trait Propagator {
    /// Extracts the trace context from a carrier. Missing or malformed headers
    /// yield a fresh context, never an error.
    fn extract(&self, carrier: &dyn Extractor) -> PropagationContext;

    /// Writes the trace context into a carrier.
    fn inject(&self, context: &PropagationContext, carrier: &mut dyn Injector);
}

/// Propagator for the `sentry-trace` and `baggage` headers.
pub struct SentryPropagator {
    config: Arc<Config>,
}

impl SentryPropagator {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl Propagator for SentryPropagator {
    fn extract(&self, carrier: &dyn Extractor) -> PropagationContext {
        PropagationContext::from_incoming_data(carrier)
    }

    /// Writes `sentry-trace`, plus `baggage` when the sampling context has
    /// entries. Nothing is written when trace propagation is disabled.
    fn inject(&self, context: &PropagationContext, carrier: &mut dyn Injector) {
        if !self.config.propagate_traces {
            return;
        }

        carrier.set(SENTRY_TRACE_HEADER, context.to_sentry_trace().to_string());

        let baggage = context.to_baggage().serialize(true);
        if !baggage.is_empty() {
            carrier.set(BAGGAGE_HEADER, baggage);
        }
    }
}
