// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The propagation context: everything a service needs to continue a trace.
//!
//! A context is either built from incoming headers
//! ([`PropagationContext::from_incoming_data`]) or started fresh. Trace and
//! span ids that were not received are generated on first access and cached
//! for the lifetime of the context.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};
use tracing::debug;

use crate::propagation::baggage::{Baggage, BAGGAGE_HEADER};
use crate::propagation::carrier::Extractor;
use crate::propagation::id::{SpanId, TraceId};
use crate::propagation::sentry_trace::{SentryTrace, SENTRY_TRACE_HEADER};
use crate::sampling::fill_sample_rand;

const UPDATE_TRACE_ID: &str = "trace_id";
const UPDATE_PARENT_SPAN_ID: &str = "parent_span_id";
const UPDATE_PARENT_SAMPLED: &str = "parent_sampled";

/// Trace state carried across a service boundary.
#[derive(Clone, Debug, Default)]
pub struct PropagationContext {
    trace_id: OnceLock<TraceId>,
    span_id: OnceLock<SpanId>,
    parent_span_id: Option<SpanId>,
    parent_sampled: Option<bool>,
    dynamic_sampling_context: Option<BTreeMap<String, String>>,
}

impl PropagationContext {
    /// A context with nothing set; ids are generated on first access.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.set_trace_id(trace_id);
        self
    }

    #[must_use]
    pub fn with_span_id(mut self, span_id: impl Into<SpanId>) -> Self {
        self.set_span_id(span_id);
        self
    }

    #[must_use]
    pub fn with_parent_span_id(mut self, parent_span_id: impl Into<SpanId>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    #[must_use]
    pub fn with_parent_sampled(mut self, parent_sampled: bool) -> Self {
        self.parent_sampled = Some(parent_sampled);
        self
    }

    #[must_use]
    pub fn with_dynamic_sampling_context(
        mut self,
        dynamic_sampling_context: BTreeMap<String, String>,
    ) -> Self {
        self.dynamic_sampling_context = Some(dynamic_sampling_context);
        self
    }

    /// Builds a context from incoming headers.
    ///
    /// A `baggage` header, even one without Sentry members, gives the context a
    /// dynamic sampling context. A valid `sentry-trace` header supplies the
    /// trace id, parent span id and parent decision; a malformed one is logged
    /// and ignored. When a dynamic sampling context exists, a missing or
    /// invalid `sample_rand` is backfilled from the trace id.
    #[must_use]
    pub fn from_incoming_data(carrier: &dyn Extractor) -> Self {
        let mut context = Self::new();

        if let Some(header) = carrier.get(BAGGAGE_HEADER) {
            context.dynamic_sampling_context =
                Some(Baggage::from_incoming_header(header).dynamic_sampling_context());
        }

        if let Some(header) = carrier.get(SENTRY_TRACE_HEADER) {
            match header.parse::<SentryTrace>() {
                Ok(sentry_trace) => {
                    context.set_trace_id(sentry_trace.trace_id);
                    context.parent_span_id = Some(sentry_trace.span_id);
                    context.parent_sampled = sentry_trace.sampled;
                }
                Err(e) => debug!("Ignoring incoming trace: {e}"),
            }
        }

        context.fill_sample_rand();
        context
    }

    fn fill_sample_rand(&mut self) {
        let trace_id = self.trace_id().clone();
        let parent_sampled = self.parent_sampled;
        if let Some(dsc) = self.dynamic_sampling_context.as_mut() {
            fill_sample_rand(trace_id.as_str(), parent_sampled, dsc);
        }
    }

    /// The trace id, generated and cached on first access.
    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        self.trace_id.get_or_init(TraceId::generate)
    }

    /// The span id, generated and cached on first access.
    #[must_use]
    pub fn span_id(&self) -> &SpanId {
        self.span_id.get_or_init(SpanId::generate)
    }

    /// Replaces the trace id. The value is not validated.
    pub fn set_trace_id(&mut self, trace_id: impl Into<TraceId>) {
        self.trace_id = OnceLock::from(trace_id.into());
    }

    /// Replaces the span id. The value is not validated.
    pub fn set_span_id(&mut self, span_id: impl Into<SpanId>) {
        self.span_id = OnceLock::from(span_id.into());
    }

    #[must_use]
    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    #[must_use]
    pub fn parent_sampled(&self) -> Option<bool> {
        self.parent_sampled
    }

    #[must_use]
    pub fn dynamic_sampling_context(&self) -> Option<&BTreeMap<String, String>> {
        self.dynamic_sampling_context.as_ref()
    }

    /// Applies `trace_id`, `parent_span_id` and `parent_sampled` from `other`.
    ///
    /// `null` clears the parent fields. Values of the wrong type and keys
    /// outside those three are ignored. A new trace id drops the cached span
    /// id so a fresh one is generated for the new trace.
    pub fn update(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            match (key.as_str(), value) {
                (UPDATE_TRACE_ID, Value::String(trace_id)) => {
                    if self.trace_id.get().map(TraceId::as_str) != Some(trace_id.as_str()) {
                        self.set_trace_id(trace_id.as_str());
                        self.span_id = OnceLock::new();
                    }
                }
                (UPDATE_PARENT_SPAN_ID, Value::String(span_id)) => {
                    self.parent_span_id = Some(SpanId::from(span_id.as_str()));
                }
                (UPDATE_PARENT_SPAN_ID, Value::Null) => self.parent_span_id = None,
                (UPDATE_PARENT_SAMPLED, Value::Bool(sampled)) => {
                    self.parent_sampled = Some(*sampled);
                }
                (UPDATE_PARENT_SAMPLED, Value::Null) => self.parent_sampled = None,
                _ => debug!("Ignoring propagation context update for `{key}`"),
            }
        }
    }

    /// The outgoing `sentry-trace` header for this context.
    #[must_use]
    pub fn to_sentry_trace(&self) -> SentryTrace {
        SentryTrace::new(
            self.trace_id().clone(),
            self.span_id().clone(),
            self.parent_sampled,
        )
    }

    /// The outgoing baggage, frozen since the sampling context is settled.
    #[must_use]
    pub fn to_baggage(&self) -> Baggage {
        let mut baggage = Baggage::new(self.dynamic_sampling_context.clone().unwrap_or_default());
        baggage.freeze();
        baggage
    }
}
