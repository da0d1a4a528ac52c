use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Inference ====
    pub static ref PLATE_INFERENCES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "plate_inference_total",
                "Plate detector invocations by outcome",
            ),
            &["engine", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref PLATE_INFERENCE_DURATION: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "plate_inference_duration_seconds",
                "Time spent inside the plate detector",
            )
            .buckets(vec![0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0]),
            &["engine", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref VEHICLE_DETECTIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "vehicle_detection_total",
                "Vehicle detector passes over whole images",
            ),
            &["engine", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref TRACKED_VEHICLES: IntGauge = {
        let metric = IntGauge::new("tracked_vehicles", "Vehicle entities held by the pipeline")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Image cache ====
    pub static ref CACHE_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "image_cache_requests_total",
                "Image cache lookups by level and result",
            ),
            &["cache", "level", "result"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CACHE_EVICTIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "image_cache_evictions_total",
                "Entries evicted to honour a cache bound",
            ),
            &["cache", "level"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Text exposition of every registered metric
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
