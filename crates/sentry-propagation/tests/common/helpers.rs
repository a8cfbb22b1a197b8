// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use std::collections::HashMap;

use sentry_propagation::transaction::TracingClient;
use sentry_propagation::Config;

pub const ZERO_TRACE_ID: &str = "00000000000000000000000000000000";
pub const ZERO_SPAN_ID: &str = "0000000000000000";

/// Incoming headers as an HTTP server would hand them over.
pub fn incoming_headers(sentry_trace: Option<&str>, baggage: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(sentry_trace) = sentry_trace {
        headers.insert("sentry-trace".to_string(), sentry_trace.to_string());
    }
    if let Some(baggage) = baggage {
        headers.insert("baggage".to_string(), baggage.to_string());
    }
    headers
}

/// Flag appended to the `sentry-trace` header for a parent decision.
pub fn sampled_flag(sampled: Option<bool>) -> &'static str {
    match sampled {
        None => "",
        Some(false) => "-0",
        Some(true) => "-1",
    }
}

pub fn zero_sentry_trace(sampled: Option<bool>) -> String {
    format!("{ZERO_TRACE_ID}-{ZERO_SPAN_ID}{}", sampled_flag(sampled))
}

pub fn client(traces_sample_rate: Option<f64>) -> TracingClient {
    TracingClient::new(Config {
        traces_sample_rate,
        ..Default::default()
    })
}
