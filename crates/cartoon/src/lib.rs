pub mod arena;
pub mod capture;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod startup;
pub mod surface;
pub mod telemetry;

pub use arena::{BufferArena, BufferLedger, BufferRole, FrameBuffer};
pub use capture::CaptureSource;
pub use config::{AppConfig, CaptureConfig, ModelConfig, ModelPreset};
pub use error::{
    CaptureError, InvocationError, InvocationErrorKind, RenderError, Stage, StartupError,
};
pub use pipeline::FramePipeline;
pub use scheduler::{
    ErrorPolicy, IntervalPacer, Pacer, PipelineState, PlaybackControl, RunSummary, Scheduler,
    TickOutcome,
};
pub use surface::RenderSurface;
pub use telemetry::Telemetry;
