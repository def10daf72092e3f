#![allow(dead_code)]

use {
    base::{Level, Logger, Vec2},
    candle_core::{Device, Tensor},
    cartoon::{CaptureError, CaptureSource, RenderError, RenderSurface, Telemetry},
    image::Image,
    inference::{InferError, InputSize, Model, Network, WarmedModel},
    std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    },
};

#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.messages()
            .iter()
            .filter(|message| message.starts_with(prefix))
            .count()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.messages()
            .iter()
            .position(|message| message.starts_with(prefix))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, _file: &str, _line: usize, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

pub fn telemetry(logger: &Arc<RecordingLogger>) -> Telemetry {
    Telemetry::with_logger(Arc::clone(logger) as Arc<dyn Logger>)
}

/// Returns its input unchanged.
pub struct IdentityNetwork;

impl Network for IdentityNetwork {
    fn name(&self) -> &str {
        "identity"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, InferError> {
        Ok(input.clone())
    }
}

/// Ignores its input and cycles through -1, 0, 1, 2, 3.
pub struct RangeNetwork;

impl Network for RangeNetwork {
    fn name(&self) -> &str {
        "range"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, InferError> {
        let values: Vec<f32> = (0..input.elem_count())
            .map(|i| (i % 5) as f32 - 1.0)
            .collect();
        Ok(Tensor::from_vec(values, input.dims(), input.device())?)
    }
}

/// Succeeds for the first `ok_calls` passes, fails afterwards.
pub struct FailingNetwork {
    ok_calls: usize,
    calls: AtomicUsize,
}

impl FailingNetwork {
    pub fn after(ok_calls: usize) -> Self {
        Self {
            ok_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Network for FailingNetwork {
    fn name(&self) -> &str {
        "failing"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, InferError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.ok_calls {
            Ok(input.clone())
        } else {
            Err(InferError::Runtime("forced failure".to_string()))
        }
    }
}

/// Drops the batch axis, which the pipeline must reject.
pub struct SqueezingNetwork {
    calls: AtomicUsize,
}

impl SqueezingNetwork {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Network for SqueezingNetwork {
    fn name(&self) -> &str {
        "squeezing"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, InferError> {
        // the warmup pass must still see a well formed output
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(input.clone());
        }
        Ok(input.squeeze(0)?)
    }
}

pub fn model(network: impl Network + 'static, width: usize, height: usize) -> Model {
    Model::from_network(
        "memory://test",
        InputSize::new(width, height),
        Device::Cpu,
        Box::new(network),
    )
}

pub fn warmed(network: impl Network + 'static, width: usize, height: usize) -> WarmedModel {
    model(network, width, height).warmup().unwrap()
}

pub fn solid(width: usize, height: usize, value: u8) -> Image {
    Image::rgb8(
        Vec2::new(width, height),
        vec![value; width * height * 3],
    )
    .unwrap()
}

#[derive(Default)]
pub struct RecordingSurface {
    pub frames: Vec<Vec<f32>>,
    pub dims: Vec<Vec<usize>>,
    pub fail: bool,
}

impl RecordingSurface {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl RenderSurface for RecordingSurface {
    fn present(&mut self, frame: &Tensor) -> Result<(), RenderError> {
        if self.fail {
            return Err(RenderError::Surface("forced failure".to_string()));
        }
        self.dims.push(frame.dims().to_vec());
        self.frames
            .push(frame.flatten_all().unwrap().to_vec1::<f32>().unwrap());
        Ok(())
    }
}

/// Hands out queued frames, then reports the source closed.
pub struct ScriptedCapture {
    frames: VecDeque<Result<Image, CaptureError>>,
    pub captures: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    pub fn new(frames: impl IntoIterator<Item = Result<Image, CaptureError>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn repeat(image: Image, count: usize) -> Self {
        Self::new((0..count).map(|_| Ok(image.clone())))
    }
}

impl CaptureSource for ScriptedCapture {
    async fn capture(&mut self) -> Result<Image, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.frames.pop_front().unwrap_or(Err(CaptureError::Closed))
    }
}

/// A camera that never delivers a frame.
pub struct SilentCapture;

impl CaptureSource for SilentCapture {
    async fn capture(&mut self) -> Result<Image, CaptureError> {
        std::future::pending().await
    }
}
