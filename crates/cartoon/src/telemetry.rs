use {
    crate::*,
    base::{Level, Logger},
    inference::Model,
    std::{panic::Location, sync::Arc, time::Duration},
};

fn millis(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64() * 1000.0)
}

/// Lifecycle and timing events of the cartoonizer.
///
/// Goes to the global `base` logger unless a sink is injected. Emitting never
/// fails and never blocks on anything but the sink itself.
#[derive(Clone, Default)]
pub struct Telemetry {
    sink: Option<Arc<dyn Logger>>,
}

impl Telemetry {
    pub fn global() -> Self {
        Self { sink: None }
    }

    pub fn with_logger(sink: Arc<dyn Logger>) -> Self {
        Self { sink: Some(sink) }
    }

    #[track_caller]
    fn emit(&self, level: Level, message: &str) {
        let location = Location::caller();
        match &self.sink {
            Some(sink) => sink.log(level, location.file(), location.line() as usize, message),
            None => base::dispatch(level, location.file(), location.line() as usize, message),
        }
    }

    #[track_caller]
    pub fn model_loaded(&self, model: &Model) {
        self.emit(
            Level::Info,
            &format!(
                "model: {} ({}, input {})",
                model.uri(),
                model.network_name(),
                model.input_size()
            ),
        );
    }

    #[track_caller]
    pub fn warmup(&self, latency: Duration) {
        self.emit(Level::Info, &format!("warmup: {} ms", millis(latency)));
    }

    #[track_caller]
    pub fn camera_started(&self) {
        self.emit(Level::Info, "start camera...");
    }

    #[track_caller]
    pub fn paused(&self) {
        self.emit(Level::Info, "pause...");
    }

    #[track_caller]
    pub fn resumed(&self) {
        self.emit(Level::Info, "play...");
    }

    #[track_caller]
    pub fn predict(&self, latency: Duration) {
        self.emit(Level::Info, &format!("predict: {} ms", millis(latency)));
    }

    #[track_caller]
    pub fn stage(&self, role: BufferRole, dims: &[usize]) {
        self.emit(Level::Debug, &format!("{}: {:?}", role, dims));
    }

    #[track_caller]
    pub fn buffers(&self, ledger: &BufferLedger) {
        self.emit(
            Level::Info,
            &format!(
                "buffers: {} allocated, {} released, {} live, peak {}",
                ledger.allocated(),
                ledger.released(),
                ledger.live(),
                ledger.peak()
            ),
        );
    }

    #[track_caller]
    pub fn invocation_failed(&self, error: &InvocationError) {
        self.emit(Level::Warn, &format!("invocation failed: {}", error));
    }

    #[track_caller]
    pub fn stopped(&self, summary: &RunSummary) {
        self.emit(
            Level::Info,
            &format!(
                "stop: {} rendered, {} failed, {} skipped",
                summary.rendered, summary.failed, summary.skipped
            ),
        );
    }
}
