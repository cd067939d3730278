use std::sync::Once;

static INIT: Once = Once::new();

/// Route backend logs to the test harness once per binary
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}
