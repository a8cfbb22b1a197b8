// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling decisions driven by `sample_rand`.
//!
//! `sample_rand` is a value in `[0, 1)` fixed at the head of a trace and
//! propagated in baggage. Every service that sees the trace compares it with
//! its sample rate, so services sampling at the same rate agree on the
//! decision:
//!
//! ```text
//! sampled = sample_rand < sample_rate
//! ```
//!
//! When a continued trace arrives without `sample_rand`, one is backfilled
//! from the trace id. If the parent's decision and rate are known, the value is
//! drawn from the sub-range consistent with that decision:
//! - **parent sampled**: `[0, sample_rate)`
//! - **parent not sampled**: `[sample_rate, 1)`
//! - **otherwise**: `[0, 1)`

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Error;
use crate::propagation::baggage::{SAMPLE_RAND_KEY, SAMPLE_RATE_KEY};
use crate::propagation::random::DeterministicRandom;

/// Decimal digits kept when `sample_rand` is written to baggage.
const SAMPLE_RAND_PRECISION: usize = 6;

/// Enough digits to write any `f64` in `[1e-6, 1)` exactly.
const EXACT_DECIMAL_DIGITS: usize = 80;

/// The sampling predicate, shared by root and continued traces.
#[must_use]
pub fn should_sample(sample_rand: f64, sample_rate: f64) -> bool {
    sample_rand < sample_rate
}

/// Interval a backfilled `sample_rand` must fall in, given the parent decision.
#[must_use]
pub fn sample_rand_range(parent_sampled: Option<bool>, sample_rate: Option<f64>) -> (f64, f64) {
    match (parent_sampled, sample_rate) {
        (Some(true), Some(rate)) => (0.0, rate),
        (Some(false), Some(rate)) => (rate, 1.0),
        _ => (0.0, 1.0),
    }
}

/// Derives `sample_rand` for `trace_id` and maps it into `[lower, upper)`.
///
/// Scaling can round up onto `upper`; such a draw is replaced by the next
/// value of the same deterministic stream.
pub fn generate_sample_rand(trace_id: &str, (lower, upper): (f64, f64)) -> Result<f64, Error> {
    if lower.is_nan() || upper.is_nan() || lower >= upper {
        return Err(Error::EmptySampleRandRange { lower, upper });
    }

    let mut rng = DeterministicRandom::from_trace_id(trace_id);
    loop {
        let sample_rand = lower + (upper - lower) * rng.next_f64();
        if sample_rand < upper {
            return Ok(sample_rand);
        }
    }
}

/// Ensures `dynamic_sampling_context` carries a usable `sample_rand`.
///
/// A valid incoming value is never replaced. A non-numeric or out of range
/// one is discarded and regenerated. A non-numeric `sample_rate` counts as
/// absent. Returns the `sample_rand` now in the context, if any.
pub fn fill_sample_rand(
    trace_id: &str,
    parent_sampled: Option<bool>,
    dynamic_sampling_context: &mut BTreeMap<String, String>,
) -> Option<String> {
    if let Some(existing) = dynamic_sampling_context.get(SAMPLE_RAND_KEY) {
        match parse_unit_float(existing) {
            Some(value) if value < 1.0 => return Some(existing.clone()),
            _ => debug!("Discarding invalid sample_rand value `{existing}`"),
        }
    }

    let sample_rate = dynamic_sampling_context
        .get(SAMPLE_RATE_KEY)
        .and_then(|rate| parse_unit_float(rate));

    let interval = sample_rand_range(parent_sampled, sample_rate);
    match generate_sample_rand(trace_id, interval) {
        Ok(sample_rand) => {
            let formatted = format_sample_rand(sample_rand);
            dynamic_sampling_context.insert(SAMPLE_RAND_KEY.to_string(), formatted.clone());
            Some(formatted)
        }
        Err(e) => {
            debug!(
                "Could not backfill sample_rand, parent_sampled={parent_sampled:?} sample_rate={sample_rate:?}: {e}"
            );
            dynamic_sampling_context.remove(SAMPLE_RAND_KEY);
            None
        }
    }
}

/// Parses a float in `[0, 1]`, anything else is treated as absent.
fn parse_unit_float(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| (0.0..=1.0).contains(v))
}

/// Formats `sample_rand` with six fixed decimals, truncating extra digits.
///
/// Truncation works on the exact decimal expansion of the float, so `0.3`
/// (stored as `0.29999999999999998...`) becomes `0.299999`. The written value
/// therefore never exceeds the value the decision was made with.
#[must_use]
pub fn format_sample_rand(sample_rand: f64) -> String {
    if sample_rand.is_nan() || sample_rand <= 0.0 {
        return format!("0.{:0width$}", 0, width = SAMPLE_RAND_PRECISION);
    }
    if sample_rand >= 1.0 {
        return format!("0.{}", "9".repeat(SAMPLE_RAND_PRECISION));
    }

    let exact = format!("{sample_rand:.EXACT_DECIMAL_DIGITS$}");
    match exact.split_once('.') {
        Some((integer, fraction)) => {
            format!("{integer}.{}", &fraction[..SAMPLE_RAND_PRECISION])
        }
        None => exact,
    }
}

/// Truncates `sample_rand` to the value that is written to baggage.
///
/// Deciding with this value rather than the raw one keeps the local decision
/// identical to the one every downstream service makes from the header.
#[must_use]
pub fn quantize_sample_rand(sample_rand: f64) -> f64 {
    format_sample_rand(sample_rand)
        .parse()
        .unwrap_or_default()
}

/// Formats `sample_rand` with trailing zeros removed, keeping at least one
/// decimal (`0.25`, `0.0`).
///
/// A value already on the six decimal grid, such as the result of
/// [`quantize_sample_rand`], is written back unchanged. Anything else is
/// truncated like [`format_sample_rand`].
#[must_use]
pub fn format_sample_rand_trimmed(sample_rand: f64) -> String {
    let rounded = format!("{sample_rand:.SAMPLE_RAND_PRECISION$}");
    let on_grid = (0.0..1.0).contains(&sample_rand) && rounded.parse::<f64>() == Ok(sample_rand);
    let fixed = if on_grid {
        rounded
    } else {
        format_sample_rand(sample_rand)
    };
    trim_decimal(&fixed)
}

/// Formats a sample rate as a plain decimal (`0.5`, `1.0`, `0.0000001`).
#[must_use]
pub fn format_sample_rate(sample_rate: f64) -> String {
    let mut formatted = sample_rate.to_string();
    if sample_rate.is_finite() && !formatted.contains('.') {
        formatted.push_str(".0");
    }
    formatted
}

fn trim_decimal(fixed: &str) -> String {
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use duplicate::duplicate_item;
    use proptest::prelude::*;

    const ZERO_TRACE_ID: &str = "00000000000000000000000000000000";

    fn dsc(sample_rate: Option<&str>) -> BTreeMap<String, String> {
        let mut dsc = BTreeMap::new();
        if let Some(rate) = sample_rate {
            dsc.insert(SAMPLE_RATE_KEY.to_string(), rate.to_string());
        }
        dsc
    }

    #[duplicate_item(
        test_name                          parent_sampled    sample_rate       expected;
        [test_fill_unknown_parent_no_rate] [None]            [None]            ["0.876638"];
        [test_fill_unknown_parent_rate]    [None]            [Some("0.5")]     ["0.876638"];
        [test_fill_unsampled_no_rate]      [Some(false)]     [None]            ["0.876638"];
        [test_fill_sampled_no_rate]        [Some(true)]      [None]            ["0.876638"];
        [test_fill_unsampled_rate_0]       [Some(false)]     [Some("0.0")]     ["0.876638"];
        [test_fill_unsampled_rate_001]     [Some(false)]     [Some("0.01")]    ["0.877871"];
        [test_fill_sampled_rate_001]       [Some(true)]      [Some("0.01")]    ["0.008766"];
        [test_fill_unsampled_rate_01]      [Some(false)]     [Some("0.1")]     ["0.888974"];
        [test_fill_sampled_rate_01]        [Some(true)]      [Some("0.1")]     ["0.087663"];
        [test_fill_unsampled_rate_05]      [Some(false)]     [Some("0.5")]     ["0.938319"];
        [test_fill_sampled_rate_05]        [Some(true)]      [Some("0.5")]     ["0.438319"];
        [test_fill_sampled_rate_1]         [Some(true)]      [Some("1.0")]     ["0.876638"];
        [test_fill_non_numeric_rate]       [Some(true)]      [Some("None")]    ["0.876638"];
    )]
    #[test]
    fn test_name() {
        let mut context = dsc(sample_rate);
        let filled = fill_sample_rand(ZERO_TRACE_ID, parent_sampled, &mut context);

        assert_eq!(filled.as_deref(), Some(expected));
        assert_eq!(context.get(SAMPLE_RAND_KEY).unwrap(), expected);
    }

    #[test]
    fn test_existing_sample_rand_is_kept() {
        let mut context = dsc(Some("0.5"));
        context.insert(SAMPLE_RAND_KEY.to_string(), "0.1".to_string());

        for parent_sampled in [None, Some(true), Some(false)] {
            let filled = fill_sample_rand(ZERO_TRACE_ID, parent_sampled, &mut context);
            assert_eq!(filled.as_deref(), Some("0.1"));
        }
    }

    #[test]
    fn test_invalid_sample_rand_is_regenerated() {
        for invalid in ["abc", "1.0", "-0.1", "NaN"] {
            let mut context = dsc(None);
            context.insert(SAMPLE_RAND_KEY.to_string(), invalid.to_string());

            let filled = fill_sample_rand(ZERO_TRACE_ID, None, &mut context);
            assert_eq!(filled.as_deref(), Some("0.876638"), "for {invalid}");
        }
    }

    #[test]
    fn test_empty_interval_is_not_filled() {
        let mut context = dsc(Some("0.0"));
        let filled = fill_sample_rand(ZERO_TRACE_ID, Some(true), &mut context);

        assert_eq!(filled, None);
        assert!(!context.contains_key(SAMPLE_RAND_KEY));
    }

    #[test]
    fn test_generate_rejects_empty_interval() {
        assert_eq!(
            generate_sample_rand(ZERO_TRACE_ID, (1.0, 1.0)),
            Err(Error::EmptySampleRandRange {
                lower: 1.0,
                upper: 1.0
            })
        );
    }

    #[test]
    fn test_should_sample() {
        assert!(should_sample(0.1, 0.5));
        assert!(!should_sample(0.5, 0.5));
        assert!(!should_sample(0.0, 0.0));
        assert!(should_sample(0.999_999, 1.0));
    }

    #[duplicate_item(
        test_name                  value                expected_fixed   expected_trimmed;
        [test_format_zero]         [0.0]                ["0.000000"]     ["0.0"];
        [test_format_tenth]        [0.1]                ["0.100000"]     ["0.1"];
        [test_format_truncates]    [0.876_638_171_3]    ["0.876638"]     ["0.876638"];
        [test_format_near_one]     [0.999_999_99]       ["0.999999"]     ["0.999999"];
        [test_format_exact_point_3] [0.3]               ["0.299999"]     ["0.3"];
        [test_format_one]          [1.0]                ["0.999999"]     ["0.999999"];
    )]
    #[test]
    fn test_name() {
        assert_eq!(format_sample_rand(value), expected_fixed);
        assert_eq!(format_sample_rand_trimmed(value), expected_trimmed);
    }

    #[test]
    fn test_format_uses_exact_expansion() {
        // 0.1 + 0.2 is 0.30000000000000004440...
        assert_eq!(format_sample_rand(0.1 + 0.2), "0.300000");
        assert_eq!(format_sample_rand(0.000_000_9), "0.000000");
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_quantize_is_stable() {
        let quantized = quantize_sample_rand(0.933_886_195_766_922_3);
        assert_eq!(quantized, 0.933_886);
        assert_eq!(format_sample_rand_trimmed(quantized), "0.933886");
        assert_eq!(quantize_sample_rand(0.3), 0.299_999);
    }

    #[duplicate_item(
        test_name                 rate           expected;
        [test_rate_half]          [0.5]          ["0.5"];
        [test_rate_one]           [1.0]          ["1.0"];
        [test_rate_zero]          [0.0]          ["0.0"];
        [test_rate_tiny]          [0.000_000_1]  ["0.0000001"];
    )]
    #[test]
    fn test_name() {
        assert_eq!(format_sample_rate(rate), expected);
    }

    proptest! {
        #[test]
        fn generated_value_stays_in_interval(
            trace in any::<u128>(),
            parent_sampled in proptest::option::of(any::<bool>()),
            rate in 0.001f64..0.999,
        ) {
            let trace_id = format!("{trace:032x}");
            let (lower, upper) = sample_rand_range(parent_sampled, Some(rate));
            let value = generate_sample_rand(&trace_id, (lower, upper)).unwrap();
            prop_assert!(value >= lower && value < upper);
            if let Some(parent_sampled) = parent_sampled {
                prop_assert_eq!(should_sample(value, rate), parent_sampled);
            }
        }

        #[test]
        fn quantized_value_never_exceeds_input(value in 0.0f64..1.0) {
            let quantized = quantize_sample_rand(value);
            prop_assert!(quantized <= value);
            prop_assert!(value - quantized <= 1e-6 + f64::EPSILON);
            prop_assert_eq!(format_sample_rand(quantized).len(), 8);
        }
    }
}
