use {
    image::ImageError,
    inference::InferError,
    std::fmt,
    video::VideoError,
};

/// Pipeline stage an invocation failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Resize,
    Cast,
    Normalize,
    Batch,
    Infer,
    Unbatch,
    Denormalize,
    Clip,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Capture => "capture",
            Stage::Resize => "resize",
            Stage::Cast => "cast",
            Stage::Normalize => "normalize",
            Stage::Batch => "batch",
            Stage::Infer => "infer",
            Stage::Unbatch => "unbatch",
            Stage::Denormalize => "denormalize",
            Stage::Clip => "clip",
            Stage::Render => "render",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    Video(VideoError),
    Image(ImageError),
    Closed,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Video(err) => write!(f, "video error: {err}"),
            CaptureError::Image(err) => write!(f, "image error: {err}"),
            CaptureError::Closed => write!(f, "capture source closed"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<VideoError> for CaptureError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::Channel(_) | VideoError::EndOfStream => CaptureError::Closed,
            err => CaptureError::Video(err),
        }
    }
}

impl From<ImageError> for CaptureError {
    fn from(err: ImageError) -> Self {
        CaptureError::Image(err)
    }
}

#[derive(Debug)]
pub enum RenderError {
    Closed,
    Size(String),
    Surface(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Closed => write!(f, "render surface closed"),
            RenderError::Size(msg) => write!(f, "size error: {msg}"),
            RenderError::Surface(msg) => write!(f, "surface error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

#[derive(Debug)]
pub enum InvocationErrorKind {
    Capture(CaptureError),
    Shape(String),
    Backend(String),
    Render(String),
}

/// A single failed pipeline invocation.
#[derive(Debug)]
pub struct InvocationError {
    pub stage: Stage,
    pub kind: InvocationErrorKind,
}

impl InvocationError {
    pub fn capture(err: CaptureError) -> Self {
        Self {
            stage: Stage::Capture,
            kind: InvocationErrorKind::Capture(err),
        }
    }

    pub fn shape(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: InvocationErrorKind::Shape(message.into()),
        }
    }

    pub fn backend(stage: Stage, err: impl fmt::Display) -> Self {
        Self {
            stage,
            kind: InvocationErrorKind::Backend(err.to_string()),
        }
    }

    pub fn render(err: RenderError) -> Self {
        Self {
            stage: Stage::Render,
            kind: InvocationErrorKind::Render(err.to_string()),
        }
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InvocationErrorKind::Capture(err) => write!(f, "{} failed: {}", self.stage, err),
            InvocationErrorKind::Shape(msg) => write!(f, "{} failed: shape: {}", self.stage, msg),
            InvocationErrorKind::Backend(msg) => {
                write!(f, "{} failed: backend: {}", self.stage, msg)
            }
            InvocationErrorKind::Render(msg) => write!(f, "{} failed: {}", self.stage, msg),
        }
    }
}

impl std::error::Error for InvocationError {}

/// Anything that stops the application before the first frame.
#[derive(Debug)]
pub enum StartupError {
    Backend(InferError),
    ModelLoad(InferError),
    Warmup(InferError),
    Capture(CaptureError),
    Config(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Backend(err) => write!(f, "backend initialization failed: {err}"),
            StartupError::ModelLoad(err) => write!(f, "model load failed: {err}"),
            StartupError::Warmup(err) => write!(f, "model warmup failed: {err}"),
            StartupError::Capture(err) => write!(f, "camera start failed: {err}"),
            StartupError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<CaptureError> for StartupError {
    fn from(err: CaptureError) -> Self {
        StartupError::Capture(err)
    }
}
