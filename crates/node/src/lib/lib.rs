use std::sync::Arc;

use jam_stf_core::config::ProtocolConfig;
use jam_stf_trace_runner::env::LOG_FORMAT;
use jam_stf_trace_runner::tracing::{setup_logger, LogFormat, LoggingConfig};

use common::AppState;

mod common;
mod server;

pub async fn node_main() {
    setup_logger(LoggingConfig::default().use_format(LOG_FORMAT.default("plain".to_string()).value.parse().unwrap_or(LogFormat::Plain)));

    let full_config = std::env::var("NODE_FULL_CONFIG").map(|v| v == "1").unwrap_or(false);
    let real_pvm = std::env::var("NODE_REAL_PVM").map(|v| v == "1").unwrap_or(false);
    let config = if full_config { ProtocolConfig::full() } else { ProtocolConfig::tiny() };

    let state = AppState::new(config, real_pvm);
    state.metrics.app_build_info.with_label_values(&[env!("CARGO_PKG_VERSION")]).set(1.0);

    let main_span = tracing::info_span!("main", real_pvm = real_pvm);
    let server_span = main_span.clone();
    let _entered = main_span.entered();

    let shared_state = Arc::new(state);
    let server_thread = server::launch(Arc::clone(&shared_state), server_span);
    server_thread.join().unwrap();
    _entered.exit();
}
