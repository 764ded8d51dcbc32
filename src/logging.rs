/*!
 * Test-only tracing initialization.
 *
 * Library code only emits `tracing` events; it never installs a global
 * subscriber itself (that is a host decision). The one exception is test
 * code, which wants events visible under `cargo test -- --nocapture` via
 * a `with_test_writer` layer.
 */

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("driftwood=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
