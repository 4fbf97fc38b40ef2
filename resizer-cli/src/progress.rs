use std::sync::Arc;

use indicatif::ProgressStyle;
use pipeline_common::{ProgressCallback, ProgressEvent};
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Create the span whose progress bar tracks a run of `expected` units.
pub fn progress_span(expected: u64) -> Span {
    let span = info_span!("resize");
    let style = ProgressStyle::with_template(
        "{span_child_prefix}{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|style| style.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    span.pb_set_style(&style);
    span.pb_set_length(expected);
    span.pb_set_message("resizing");
    span
}

/// Progress callback moving the bar of `span` to the completed count.
pub fn bar_callback(span: Span) -> ProgressCallback {
    Arc::new(move |event: ProgressEvent| span.pb_set_position(event.completed))
}
