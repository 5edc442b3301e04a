use prometheus::{Encoder, TextEncoder};

use crate::metrics::REGISTRY;

/// Encode every registered metric in the Prometheus text exposition format.
///
/// Hosts mount the result on whatever HTTP surface they already run.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Content type to serve [`render`] output with.
pub fn content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}
