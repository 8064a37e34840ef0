//! Metrics module
//!
//! Prometheus metrics for streamed uploads.

pub mod server;

use crate::upload::UploadErrorKind;
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Histogram, HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "stream_uploadr_uploads_total",
        "Total number of streamed uploads by terminal status",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "stream_uploadr_upload_bytes_total",
        "Total bytes assembled into completed objects"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "stream_uploadr_upload_duration_seconds",
        "Upload session duration in seconds",
        &["bucket", "outcome"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "stream_uploadr_multipart_parts",
        "Number of parts per completed multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0]
    ).unwrap();

    pub static ref MULTIPART_ABORTS: CounterVec = register_counter_vec!(
        "stream_uploadr_multipart_aborts_total",
        "Abort attempts after a failed upload",
        &["result"]
    ).unwrap();
}

/// Record a completed upload
pub fn record_upload_success(bucket: &str, bytes: u64, parts_count: usize) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
    MULTIPART_PARTS.observe(parts_count as f64);
}

/// Record a failed upload, labelled by failure kind
pub fn record_upload_failure(bucket: &str, kind: UploadErrorKind) {
    UPLOADS_TOTAL.with_label_values(&[bucket, kind.as_str()]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, outcome: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket, outcome])
        .observe(duration_secs);
}

/// Record an abort attempt
pub fn record_abort(success: bool) {
    let result = if success { "success" } else { "failure" };
    MULTIPART_ABORTS.with_label_values(&[result]).inc();
}
