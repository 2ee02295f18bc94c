use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("ebook_studio.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("ebook_studio.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("ebook_studio.client.request_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("ebook_studio.stream.bytes");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("ebook_studio.stream.fragments");
pub(crate) static STREAM_DECODE_ERRORS: Counter =
    Counter::new("ebook_studio.stream.decode_errors");
pub(crate) static STREAM_DURATION: Moments =
    Moments::new("ebook_studio.stream.duration_seconds");

pub(crate) static SESSION_SENDS: Counter = Counter::new("ebook_studio.session.sends");
pub(crate) static SESSION_DROPPED_SENDS: Counter =
    Counter::new("ebook_studio.session.dropped_sends");
pub(crate) static SESSION_FAILURES: Counter = Counter::new("ebook_studio.session.failures");
pub(crate) static SESSION_SAVE_ERRORS: Counter =
    Counter::new("ebook_studio.session.save_errors");

pub(crate) static DASHBOARD_LOAD_ERRORS: Counter =
    Counter::new("ebook_studio.dashboard.load_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_DECODE_ERRORS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_SENDS);
    collector.register_counter(&SESSION_DROPPED_SENDS);
    collector.register_counter(&SESSION_FAILURES);
    collector.register_counter(&SESSION_SAVE_ERRORS);

    collector.register_counter(&DASHBOARD_LOAD_ERRORS);
}
