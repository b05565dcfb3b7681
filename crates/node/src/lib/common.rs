use jam_stf_core::accumulate::{NoopPvm, PvmEngine};
use jam_stf_core::config::ProtocolConfig;
use jam_stf_core::crypto::{BandersnatchVerifier, MockBandersnatch};
use jam_stf_core::state::components::JamState;
use jam_stf_core::types::{Hash, ZERO_HASH};
use jam_stf_pvm::Interpreter13;
use tokio::sync::Mutex;

pub struct AppState {
    pub registry: prometheus::Registry,
    pub metrics: prometheus_metrics::Metrics,
    pub config: ProtocolConfig,
    pub vrf: Box<dyn BandersnatchVerifier>,
    pub pvm: Box<dyn PvmEngine>,
    pub chain: Mutex<ChainHead>,
}

/// The node's only mutable runtime state: the tip it has imported up to and the state that tip
/// committed.
pub struct ChainHead {
    pub tip_hash: Hash,
    pub state: JamState,
}

impl Default for ChainHead {
    fn default() -> Self {
        Self {
            tip_hash: ZERO_HASH,
            state: JamState::default(),
        }
    }
}

impl AppState {
    pub fn new(config: ProtocolConfig, use_real_pvm: bool) -> Self {
        let (registry, metrics) = prometheus_metrics::setup_prometheus("jam_stf");
        let pvm: Box<dyn PvmEngine> = if use_real_pvm { Box::new(Interpreter13) } else { Box::new(NoopPvm) };
        Self {
            registry,
            metrics,
            config,
            vrf: Box::new(MockBandersnatch),
            pvm,
            chain: Mutex::new(ChainHead::default()),
        }
    }

    pub fn report_metrics(&self) -> Result<(Vec<u8>, String), prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok((buffer, encoder.format_type().to_string()))
    }
}

pub mod prometheus_metrics {
    use prometheus::{GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry};

    pub struct Metrics {
        pub app_build_info: GaugeVec,
        pub import_block_total: IntCounter,
        pub import_block_failed_total: IntCounter,
        pub import_duration_seconds: Histogram,
        pub tip_slot: prometheus::Gauge,
    }

    fn register_int_counter(registry: &Registry, namespace: &str, name: &str, help: &str) -> IntCounter {
        let opts = Opts::new(name, help).namespace(namespace.to_string());
        let counter = IntCounter::with_opts(opts).unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter
    }

    fn register_gauge(registry: &Registry, namespace: &str, name: &str, help: &str) -> prometheus::Gauge {
        let opts = Opts::new(name, help).namespace(namespace.to_string());
        let gauge = prometheus::Gauge::with_opts(opts).unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge
    }

    fn register_gauge_vec(registry: &Registry, namespace: &str, name: &str, help: &str, labels: &[&str]) -> GaugeVec {
        let opts = Opts::new(name, help).namespace(namespace.to_string());
        let gauge = GaugeVec::new(opts, labels).unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge
    }

    fn register_histogram(registry: &Registry, namespace: &str, name: &str, help: &str) -> Histogram {
        let opts = HistogramOpts::new(name, help).namespace(namespace.to_string());
        let histogram = Histogram::with_opts(opts).unwrap();
        registry.register(Box::new(histogram.clone())).unwrap();
        histogram
    }

    pub fn setup_prometheus(namespace: &str) -> (Registry, Metrics) {
        let registry = Registry::new();
        let metrics = Metrics {
            app_build_info: register_gauge_vec(&registry, namespace, "app_build_info", "Application build info", &["version"]),
            import_block_total: register_int_counter(&registry, namespace, "import_block_total", "Blocks imported successfully"),
            import_block_failed_total: register_int_counter(&registry, namespace, "import_block_failed_total", "Blocks rejected by the importer"),
            import_duration_seconds: register_histogram(&registry, namespace, "import_duration_seconds", "Time spent importing one block"),
            tip_slot: register_gauge(&registry, namespace, "tip_slot", "Slot of the most recently imported block"),
        };
        (registry, metrics)
    }
}
