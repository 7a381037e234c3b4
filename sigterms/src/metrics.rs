//! Reduce and transport metrics
//!
//! Thin wrappers over the `metrics` facade. Nothing is exported unless the
//! host process installs a recorder.

use std::time::Duration;

/// Record a completed reduce
pub fn record_reduce(phase: &'static str, inputs: usize, buckets: usize, duration: Duration) {
    metrics::counter!(
        "sigterms_reduce_total",
        "phase" => phase,
        "status" => "ok",
    )
    .increment(1);

    metrics::histogram!("sigterms_reduce_inputs", "phase" => phase).record(inputs as f64);
    metrics::histogram!("sigterms_reduce_buckets", "phase" => phase).record(buckets as f64);
    metrics::histogram!("sigterms_reduce_duration_seconds", "phase" => phase)
        .record(duration.as_secs_f64());
}

/// Record a failed reduce
pub fn record_reduce_error(phase: &'static str, error_type: &'static str) {
    metrics::counter!(
        "sigterms_reduce_total",
        "phase" => phase,
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "sigterms_reduce_errors_total",
        "error_type" => error_type,
    )
    .increment(1);
}

/// Record a rejected wire payload
pub fn record_decode_error(field: &'static str) {
    metrics::counter!("sigterms_decode_errors_total", "field" => field).increment(1);
}

/// Record a partial result that could not be encoded
pub fn record_encode_error(field: &'static str) {
    metrics::counter!("sigterms_encode_errors_total", "field" => field).increment(1);
}

/// Record an encoded payload
pub fn record_encode(bytes: usize) {
    metrics::histogram!("sigterms_encoded_bytes").record(bytes as f64);
}

/// Record buckets dropped by `min_doc_count` at render time
pub fn record_render(emitted: usize, filtered: usize) {
    metrics::counter!("sigterms_rendered_buckets_total").increment(emitted as u64);
    metrics::counter!("sigterms_filtered_buckets_total").increment(filtered as u64);
}
