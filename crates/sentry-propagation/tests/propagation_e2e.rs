// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::collections::HashMap;

use common::helpers::{client, incoming_headers, zero_sentry_trace, ZERO_TRACE_ID};
use duplicate::duplicate_item;
use sentry_propagation::propagation::carrier::normalize_incoming_data;
use sentry_propagation::propagation::random::derive;
use sentry_propagation::sampling::{quantize_sample_rand, should_sample};
use sentry_propagation::transaction::TransactionOptions;
use sentry_propagation::{PropagationContext, SentryTrace, TraceId};

#[test]
fn test_continue_trace_with_sample_rand() {
    let headers = incoming_headers(
        Some(&zero_sentry_trace(Some(false))),
        Some("sentry-sample_rand=0.1,sentry-sample_rate=0.5"),
    );

    let mut transaction = client(Some(0.5)).continue_trace(&headers, "GET /");
    assert!(transaction.sampled());
    assert_eq!(transaction.sample_rate(), Some(0.5));

    let baggage = transaction.get_baggage();
    assert_eq!(baggage.sentry_items().get("sample_rand").unwrap(), "0.1");

    let sample_rand = baggage.sample_rand().unwrap();
    let sample_rate = baggage.sample_rate().unwrap();
    assert!(should_sample(sample_rand, sample_rate));
}

#[duplicate_item(
    test_name                               parent_sampled  sample_rate   expected;
    [test_missing_sample_rand_unknown]      [None]          ["None"]      ["0.876638"];
    [test_missing_sample_rand_unknown_05]   [None]          ["0.5"]       ["0.876638"];
    [test_missing_sample_rand_unsampled]    [Some(false)]   ["None"]      ["0.876638"];
    [test_missing_sample_rand_sampled]      [Some(true)]    ["None"]      ["0.876638"];
    [test_missing_sample_rand_unsampled_0]  [Some(false)]   ["0.0"]       ["0.876638"];
    [test_missing_sample_rand_unsampled_001] [Some(false)]   ["0.01"]      ["0.877871"];
    [test_missing_sample_rand_sampled_001]  [Some(true)]    ["0.01"]      ["0.008766"];
    [test_missing_sample_rand_unsampled_01] [Some(false)]   ["0.1"]       ["0.888974"];
    [test_missing_sample_rand_sampled_01]   [Some(true)]    ["0.1"]       ["0.087663"];
    [test_missing_sample_rand_unsampled_05] [Some(false)]   ["0.5"]       ["0.938319"];
    [test_missing_sample_rand_sampled_05]   [Some(true)]    ["0.5"]       ["0.438319"];
    [test_missing_sample_rand_sampled_1]    [Some(true)]    ["1.0"]       ["0.876638"];
)]
#[test]
fn test_name() {
    let headers = incoming_headers(
        Some(&zero_sentry_trace(parent_sampled)),
        Some(&format!("sentry-sample_rate={}", sample_rate)),
    );

    let mut transaction = client(None).continue_trace(&headers, "GET /");
    assert_eq!(
        transaction.get_baggage().sentry_items().get("sample_rand").unwrap(),
        expected
    );
}

#[test]
fn test_backfilled_sample_rand_agrees_with_parent_decision() {
    for (parent_sampled, sample_rate) in [(true, 0.1), (false, 0.1), (true, 0.5), (false, 0.5)] {
        let headers = incoming_headers(
            Some(&zero_sentry_trace(Some(parent_sampled))),
            Some(&format!("sentry-sample_rate={sample_rate}")),
        );

        let context = PropagationContext::from_incoming_data(&headers);
        let sample_rand: f64 = context.dynamic_sampling_context().unwrap()["sample_rand"]
            .parse()
            .unwrap();
        assert_eq!(should_sample(sample_rand, sample_rate), parent_sampled);
    }
}

#[test]
fn test_root_transactions_are_deterministic() {
    let client = client(Some(0.5));

    for _ in 0..50 {
        let trace_id = TraceId::generate();
        let options = TransactionOptions {
            trace_id: Some(trace_id.clone()),
            ..TransactionOptions::new("root")
        };

        let mut first = client.start_transaction(options.clone());
        let second = client.start_transaction(options);
        assert_eq!(first.sampled(), second.sampled());
        let sample_rand = quantize_sample_rand(derive(trace_id.as_str()));
        assert_eq!(first.sampled(), should_sample(sample_rand, 0.5));
        assert_eq!(first.sample_rand().to_bits(), sample_rand.to_bits());

        let baggage = first.get_baggage();
        assert_eq!(
            baggage.sentry_items().get("trace_id").unwrap(),
            trace_id.as_str()
        );
        assert!(baggage.sample_rand().is_some());
    }
}

#[test]
fn test_incoming_sample_rand_decides_downstream() {
    let client = client(None).with_traces_sampler(|context| context.parent_sample_rate.unwrap_or(0.0));

    for (sample_rand, sampled) in [("0.1", true), ("0.49", true), ("0.5", false), ("0.9", false)] {
        let headers = incoming_headers(
            Some(&format!("{ZERO_TRACE_ID}-0000000000000000")),
            Some(&format!("sentry-sample_rand={sample_rand},sentry-sample_rate=0.5")),
        );

        let transaction = client.continue_trace(&headers, "GET /");
        assert_eq!(transaction.sampled(), sampled, "sample_rand={sample_rand}");
        assert_eq!(
            transaction.sample_rand(),
            sample_rand.parse::<f64>().unwrap()
        );
    }
}

#[test]
fn test_service_to_service_round_trip() {
    let upstream = client(Some(1.0));
    let mut head = upstream.start_transaction(TransactionOptions::new("upstream"));
    let outgoing: HashMap<String, String> = head
        .iter_headers()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    let downstream = client(Some(0.0));
    let mut continued = downstream.continue_trace(&outgoing, "downstream");

    assert_eq!(continued.trace_id(), head.trace_id());
    assert_eq!(continued.parent_span_id(), Some(head.span_id()));
    assert!(continued.sampled());
    assert_eq!(continued.sample_rand().to_bits(), head.sample_rand().to_bits());
    assert_eq!(
        continued.get_baggage().sentry_items(),
        head.get_baggage().sentry_items()
    );

    let sentry_trace: SentryTrace = continued
        .iter_headers()
        .find(|(key, _)| *key == "sentry-trace")
        .map(|(_, value)| value)
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(&sentry_trace.trace_id, head.trace_id());
    assert_eq!(&sentry_trace.span_id, continued.span_id());
}

#[test]
fn test_environ_style_headers() {
    let environ = normalize_incoming_data([
        ("HTTP_SENTRY_TRACE", "771a43a4192642f0b136d5159a501700-b4f3b0e4e9a2a1c7-1"),
        ("HTTP_BAGGAGE", "sentry-sample_rand=0.25,other=1"),
        ("REQUEST_METHOD", "GET"),
    ]);

    let mut transaction = client(None).continue_trace(&environ, "GET /");
    assert_eq!(transaction.trace_id(), "771a43a4192642f0b136d5159a501700");
    assert!(transaction.sampled());
    assert_eq!(transaction.get_baggage().third_party_items(), "other=1");
}

#[test]
fn test_malformed_headers_are_tolerated() {
    let headers = incoming_headers(
        Some("771a43a4192642f0b136d5159a501700-b4f3b0e4e9a2a1c7-x"),
        Some("sentry-sample_rand=0.25,sentry-garbage,sentry-sample_rate=0.5"),
    );

    let context = PropagationContext::from_incoming_data(&headers);
    assert_eq!(context.parent_span_id(), None);
    assert_ne!(context.trace_id(), "771a43a4192642f0b136d5159a501700");

    let dsc = context.dynamic_sampling_context().unwrap();
    assert_eq!(dsc.len(), 2);
    assert_eq!(dsc["sample_rand"], "0.25");
    assert_eq!(dsc["sample_rate"], "0.5");
}
