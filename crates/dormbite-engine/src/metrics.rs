// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Recorded through the metrics-rs facade; without an installed recorder
//! every call is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Register all Dormbite metric descriptions.
pub fn register_metrics() {
    describe_counter!("dormbite_orders_created_total", "Orders placed by customers");
    describe_counter!("dormbite_orders_claimed_total", "Orders claimed by a deliverer");
    describe_counter!(
        "dormbite_claim_conflicts_total",
        "Claim attempts lost to another deliverer"
    );
    describe_counter!("dormbite_orders_completed_total", "Orders completed");
    describe_counter!(
        "dormbite_arrivals_detected_total",
        "Arrival notifications fired"
    );
    describe_counter!(
        "dormbite_relay_forwards_total",
        "Live-location forwards to the counterparty"
    );
    describe_counter!(
        "dormbite_unauthorized_total",
        "Rejected actions from the wrong chat or identity"
    );
    describe_gauge!("dormbite_active_sessions", "Orders with a live session");
}

pub fn record_order_created(order_type: &str) {
    metrics::counter!("dormbite_orders_created_total", "type" => order_type.to_string())
        .increment(1);
}

pub fn record_claim(won: bool) {
    if won {
        metrics::counter!("dormbite_orders_claimed_total").increment(1);
    } else {
        metrics::counter!("dormbite_claim_conflicts_total").increment(1);
    }
}

pub fn record_completed(order_type: &str) {
    metrics::counter!("dormbite_orders_completed_total", "type" => order_type.to_string())
        .increment(1);
}

/// `trigger` is "proximity" or "manual".
pub fn record_arrival(trigger: &'static str) {
    metrics::counter!("dormbite_arrivals_detected_total", "trigger" => trigger).increment(1);
}

pub fn record_relay_forward() {
    metrics::counter!("dormbite_relay_forwards_total").increment(1);
}

/// `kind` is a callback tag or "command", never anything order-specific.
pub fn record_unauthorized(kind: &'static str) {
    metrics::counter!("dormbite_unauthorized_total", "action" => kind).increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("dormbite_active_sessions").set(count as f64);
}
