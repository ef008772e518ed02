//! Gateway metrics
//!
//! Thin helpers over the `metrics` facade; an exporter (if any) is wired
//! up by the embedding process, not here.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(
        "meshgate_inbound_total",
        "Inbound messages by admission result"
    );
    describe_counter!(
        "meshgate_outbound_total",
        "Outbound delivery attempts by outcome"
    );
    describe_counter!(
        "meshgate_identity_loads_total",
        "Identity load operations by outcome"
    );
    describe_gauge!(
        "meshgate_identities_loaded",
        "Identities currently registered"
    );
}

pub fn record_inbound_accepted() {
    counter!("meshgate_inbound_total", "result" => "accepted").increment(1);
}

pub fn record_inbound_rejected(reason: &'static str) {
    counter!("meshgate_inbound_total", "result" => "rejected", "reason" => reason).increment(1);
}

pub fn record_outbound_delivered() {
    counter!("meshgate_outbound_total", "result" => "delivered").increment(1);
}

pub fn record_outbound_failed() {
    counter!("meshgate_outbound_total", "result" => "failed").increment(1);
}

pub fn record_identity_loaded(count: usize) {
    counter!("meshgate_identity_loads_total", "result" => "loaded").increment(1);
    gauge!("meshgate_identities_loaded").set(count as f64);
}

pub fn record_identity_unloaded(count: usize) {
    gauge!("meshgate_identities_loaded").set(count as f64);
}
