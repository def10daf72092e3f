use {
    crate::*,
    inference::{Backend, BackendConfig, Model, WarmedModel},
    video::VideoIn,
};

pub fn init_backend(config: BackendConfig) -> Result<Backend, StartupError> {
    Backend::init(config).map_err(StartupError::Backend)
}

pub fn load_model(
    backend: &Backend,
    config: &ModelConfig,
    telemetry: &Telemetry,
) -> Result<Model, StartupError> {
    let model = backend
        .load(&config.model_uri, config.input_size)
        .map_err(StartupError::ModelLoad)?;
    telemetry.model_loaded(&model);
    Ok(model)
}

pub fn warm_model(model: Model, telemetry: &Telemetry) -> Result<WarmedModel, StartupError> {
    let warmed = model.warmup().map_err(StartupError::Warmup)?;
    telemetry.warmup(warmed.warmup_latency());
    Ok(warmed)
}

/// Warmed model wrapped in a pipeline; shape logging follows production mode.
///
/// Reports the buffer ledger once, so the baseline is in the log before the
/// first frame.
pub fn build_pipeline(
    backend: &Backend,
    model: WarmedModel,
    telemetry: &Telemetry,
) -> FramePipeline {
    let pipeline = FramePipeline::new(model, telemetry.clone())
        .with_debug_shapes(!backend.config().production());
    telemetry.buffers(pipeline.ledger());
    pipeline
}

/// Backend, model and warmup, in that order. Nothing here is retried.
pub fn prepare_pipeline(
    config: &AppConfig,
    telemetry: &Telemetry,
) -> Result<FramePipeline, StartupError> {
    let backend = init_backend(config.backend.clone())?;
    let model = load_model(&backend, &config.model, telemetry)?;
    let model = warm_model(model, telemetry)?;
    Ok(build_pipeline(&backend, model, telemetry))
}

pub async fn start_camera(config: &CaptureConfig) -> Result<VideoIn, StartupError> {
    let video_config = config.video_config()?;
    VideoIn::open(video_config)
        .await
        .map_err(|e| StartupError::Capture(CaptureError::from(e)))
}
