// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transactions: the unit of work whose sampling decision travels downstream.
//!
//! A [`TracingClient`] starts a transaction either at the head of a trace
//! ([`TracingClient::start_transaction`]) or by continuing one received from
//! another service ([`TracingClient::continue_trace`]). The sampling decision
//! is made once, when the transaction starts:
//!
//! 1. **Rate**: the traces sampler if configured, else the `sample_rate`
//!    propagated next to an incoming `sample_rand`, else the parent's decision
//!    (`1.0` or `0.0`) when known, else `traces_sample_rate`
//! 2. **Random value**: the incoming baggage's `sample_rand`, else one derived
//!    from the trace id and truncated to the six decimals written to baggage
//! 3. **Decision**: `sample_rand < rate`
//!
//! Every service applying the same rate to the same trace therefore reaches
//! the same decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::propagation::baggage::{Baggage, TransactionSampling, BAGGAGE_HEADER};
use crate::propagation::carrier::Extractor;
use crate::propagation::context::PropagationContext;
use crate::propagation::id::{SpanId, TraceId};
use crate::propagation::random;
use crate::propagation::sentry_trace::{SentryTrace, SENTRY_TRACE_HEADER};
use crate::sampling::{quantize_sample_rand, should_sample};

/// Input of a traces sampler.
#[derive(Clone, Copy, Debug)]
pub struct SamplingContext<'a> {
    pub name: &'a str,
    pub trace_id: &'a TraceId,
    pub parent_sampled: Option<bool>,
    /// `sample_rate` propagated by the head of the trace, if any.
    pub parent_sample_rate: Option<f64>,
}

/// Custom sample rate for each transaction, overriding inheritance and the
/// configured rate.
pub type TracesSampler = dyn Fn(&SamplingContext<'_>) -> f64 + Send + Sync;

/// Inspects or rewrites a finished transaction before it is handed over.
/// Returning `None` drops the event.
pub trait EventProcessor: Send + Sync {
    fn process(&self, event: TransactionEvent) -> Option<TransactionEvent>;
}

impl<F> EventProcessor for F
where
    F: Fn(TransactionEvent) -> Option<TransactionEvent> + Send + Sync,
{
    fn process(&self, event: TransactionEvent) -> Option<TransactionEvent> {
        self(event)
    }
}

/// A finished, sampled transaction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionEvent {
    pub transaction: String,
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    pub sample_rand: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_sampling_context: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// How to start a transaction. Everything but the name is optional.
#[derive(Clone, Debug, Default)]
pub struct TransactionOptions {
    pub name: String,
    pub trace_id: Option<TraceId>,
    pub parent_span_id: Option<SpanId>,
    pub parent_sampled: Option<bool>,
    pub baggage: Option<Baggage>,
}

impl TransactionOptions {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Starts transactions and owns the sampling configuration.
pub struct TracingClient {
    config: Arc<Config>,
    traces_sampler: Option<Arc<TracesSampler>>,
    event_processors: Vec<Arc<dyn EventProcessor>>,
}

impl TracingClient {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            traces_sampler: None,
            event_processors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_traces_sampler<F>(mut self, sampler: F) -> Self
    where
        F: Fn(&SamplingContext<'_>) -> f64 + Send + Sync + 'static,
    {
        self.traces_sampler = Some(Arc::new(sampler));
        self
    }

    /// Registers a processor run, in registration order, on every finished
    /// sampled transaction.
    pub fn add_event_processor(&mut self, processor: impl EventProcessor + 'static) {
        self.event_processors.push(Arc::new(processor));
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a transaction continuing the trace found in `carrier`.
    ///
    /// Incoming third-party baggage is kept for forwarding. When a valid
    /// `sentry-trace` header was received, the baggage is frozen even if it
    /// had no Sentry members: this service is not the head of the trace.
    #[must_use]
    pub fn continue_trace(&self, carrier: &dyn Extractor, name: impl Into<String>) -> Transaction {
        let context = PropagationContext::from_incoming_data(carrier);

        let mut baggage = carrier
            .get(BAGGAGE_HEADER)
            .map(Baggage::from_incoming_header)
            .unwrap_or_default();
        if let Some(dsc) = context.dynamic_sampling_context() {
            baggage.sentry_items_mut().clone_from(dsc);
        }
        if context.parent_span_id().is_some() {
            baggage.freeze();
        }

        self.start_transaction(TransactionOptions {
            name: name.into(),
            trace_id: Some(context.trace_id().clone()),
            parent_span_id: context.parent_span_id().cloned(),
            parent_sampled: context.parent_sampled(),
            baggage: Some(baggage),
        })
    }

    /// Starts a transaction and makes its sampling decision.
    #[must_use]
    pub fn start_transaction(&self, options: TransactionOptions) -> Transaction {
        let trace_id = options.trace_id.unwrap_or_else(TraceId::generate);
        let incoming_sample_rand = options.baggage.as_ref().and_then(Baggage::sample_rand);
        let sample_rand = incoming_sample_rand
            .unwrap_or_else(|| quantize_sample_rand(random::derive(trace_id.as_str())));

        let sampling_context = SamplingContext {
            name: &options.name,
            trace_id: &trace_id,
            parent_sampled: options.parent_sampled,
            parent_sample_rate: options.baggage.as_ref().and_then(Baggage::sample_rate),
        };
        let sample_rate = self.sample_rate(&sampling_context, incoming_sample_rand.is_some());
        let sampled = sample_rate.is_some_and(|rate| should_sample(sample_rand, rate));
        debug!(
            "Transaction `{}` sampled={sampled} sample_rate={sample_rate:?} sample_rand={sample_rand}",
            options.name
        );

        Transaction {
            name: options.name,
            trace_id,
            span_id: SpanId::generate(),
            parent_span_id: options.parent_span_id,
            sampled,
            sample_rate,
            sample_rand,
            baggage: options.baggage,
            extra: BTreeMap::new(),
            propagate_traces: self.config.propagate_traces,
            event_processors: self.event_processors.clone(),
        }
    }

    /// Resolves the rate for a new transaction; `None` means unsampled.
    ///
    /// A `sample_rate` travelling with an incoming `sample_rand` takes
    /// precedence over the parent flag.
    fn sample_rate(
        &self,
        context: &SamplingContext<'_>,
        has_incoming_sample_rand: bool,
    ) -> Option<f64> {
        let rate = if let Some(sampler) = &self.traces_sampler {
            sampler(context)
        } else if let Some(rate) = context
            .parent_sample_rate
            .filter(|_| has_incoming_sample_rand)
        {
            rate
        } else if let Some(parent_sampled) = context.parent_sampled {
            if parent_sampled {
                1.0
            } else {
                0.0
            }
        } else {
            self.config.traces_sample_rate?
        };

        if (0.0..=1.0).contains(&rate) {
            Some(rate)
        } else {
            warn!("Ignoring invalid sample rate {rate} for `{}`", context.name);
            None
        }
    }
}

/// A started transaction.
pub struct Transaction {
    name: String,
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    sampled: bool,
    sample_rate: Option<f64>,
    sample_rand: f64,
    baggage: Option<Baggage>,
    extra: BTreeMap<String, Value>,
    propagate_traces: bool,
    event_processors: Vec<Arc<dyn EventProcessor>>,
}

impl Transaction {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    #[must_use]
    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    #[must_use]
    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    #[must_use]
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    #[must_use]
    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    #[must_use]
    pub fn sample_rand(&self) -> f64 {
        self.sample_rand
    }

    /// The baggage to propagate. A transaction at the head of its trace fills
    /// the baggage with its own sampling state on first access; after that
    /// the baggage is frozen.
    pub fn get_baggage(&mut self) -> &Baggage {
        let mut baggage = self.baggage.take().unwrap_or_default();
        if baggage.is_mutable() {
            baggage.populate_from_transaction(self);
            baggage.freeze();
        }
        self.baggage.insert(baggage)
    }

    /// Outgoing propagation headers, empty when propagation is disabled.
    pub fn iter_headers(&mut self) -> impl Iterator<Item = (&'static str, String)> {
        let mut headers = Vec::new();
        if self.propagate_traces {
            let sentry_trace =
                SentryTrace::new(self.trace_id.clone(), self.span_id.clone(), Some(self.sampled));
            headers.push((SENTRY_TRACE_HEADER, sentry_trace.to_string()));

            let baggage = self.get_baggage().serialize(true);
            if !baggage.is_empty() {
                headers.push((BAGGAGE_HEADER, baggage));
            }
        }
        headers.into_iter()
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    /// Finishes the transaction. Unsampled transactions, and those dropped by
    /// an event processor, produce no event.
    pub fn finish(mut self) -> Option<TransactionEvent> {
        if !self.sampled {
            debug!("Discarding unsampled transaction `{}`", self.name);
            return None;
        }

        let dynamic_sampling_context = self.get_baggage().dynamic_sampling_context();
        let mut event = TransactionEvent {
            transaction: self.name,
            trace_id: self.trace_id.to_string(),
            span_id: self.span_id.to_string(),
            parent_span_id: self.parent_span_id.map(|id| id.to_string()),
            sample_rate: self.sample_rate,
            sample_rand: self.sample_rand,
            dynamic_sampling_context,
            extra: self.extra,
        };

        for processor in &self.event_processors {
            let transaction = event.transaction.clone();
            let Some(processed) = processor.process(event) else {
                debug!("Transaction `{transaction}` dropped by event processor");
                return None;
            };
            event = processed;
        }

        Some(event)
    }
}

impl TransactionSampling for Transaction {
    fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    fn sampled(&self) -> Option<bool> {
        Some(self.sampled)
    }

    fn sample_rand(&self) -> f64 {
        self.sample_rand
    }
}
