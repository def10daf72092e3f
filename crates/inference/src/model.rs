use {
    crate::*,
    candle_core::{DType, Device, Tensor},
    serde::{Deserialize, Serialize},
    std::{
        fmt,
        path::PathBuf,
        time::{Duration, Instant, SystemTime},
    },
};

/// Spatial input size the model expects. Channels are always 3 (RGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
    pub width: usize,
    pub height: usize,
}

impl InputSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// `[1, height, width, 3]`
    pub fn batched_shape(&self) -> [usize; 4] {
        [1, self.height, self.width, 3]
    }
}

impl fmt::Display for InputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Anything that maps a `[1, h, w, 3]` f32 tensor to a tensor of the same shape.
pub trait Network: Send + Sync {
    fn name(&self) -> &str;
    fn forward(&self, input: &Tensor) -> Result<Tensor, InferError>;
}

/// Resolve a model reference to a local `.onnx` file.
///
/// Accepts `file://<path>` and plain paths. Any other scheme, a missing
/// `.onnx` extension or a file that does not exist fails with `ModelLoad`.
pub fn resolve_model_uri(uri: &str) -> Result<PathBuf, InferError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(InferError::ModelLoad("empty model uri".to_string()));
    }
    let path = match uri.strip_prefix("file://") {
        Some(path) => path,
        None if uri.contains("://") => {
            return Err(InferError::ModelLoad(format!(
                "unsupported model uri scheme: {}",
                uri
            )));
        }
        None => uri,
    };
    if path.is_empty() {
        return Err(InferError::ModelLoad(format!("malformed model uri: {}", uri)));
    }
    let path = PathBuf::from(path);
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("onnx") => {}
        _ => {
            return Err(InferError::ModelLoad(format!(
                "expected an .onnx artifact: {}",
                path.display()
            )));
        }
    }
    if !path.is_file() {
        return Err(InferError::ModelLoad(format!(
            "model artifact not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// A loaded, not yet warmed model.
pub struct Model {
    uri: String,
    input_size: InputSize,
    loaded_at: SystemTime,
    device: Device,
    network: Box<dyn Network>,
}

impl Model {
    pub fn from_network(
        uri: impl Into<String>,
        input_size: InputSize,
        device: Device,
        network: Box<dyn Network>,
    ) -> Self {
        Self {
            uri: uri.into(),
            input_size,
            loaded_at: SystemTime::now(),
            device,
            network,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn network_name(&self) -> &str {
        self.network.name()
    }

    /// Run one forward pass on an all-zero input and hand back the warmed model.
    ///
    /// The output must have the input's shape; anything else means the
    /// artifact does not fit the pipeline.
    pub fn warmup(self) -> Result<WarmedModel, InferError> {
        let shape = self.input_size.batched_shape();
        let start = Instant::now();
        {
            let input = Tensor::zeros(shape.to_vec(), DType::F32, &self.device)?;
            let output = self.network.forward(&input)?;
            if output.dims() != shape {
                return Err(InferError::Shape(format!(
                    "warmup output {:?} does not match input {:?}",
                    output.dims(),
                    shape
                )));
            }
        }
        let latency = start.elapsed();
        Ok(WarmedModel {
            model: self,
            warmup_latency: latency,
        })
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("uri", &self.uri)
            .field("input_size", &self.input_size)
            .field("network", &self.network.name())
            .finish()
    }
}

/// A model that went through its single warmup pass. Only these are run on
/// captured frames.
#[derive(Debug)]
pub struct WarmedModel {
    model: Model,
    warmup_latency: Duration,
}

impl WarmedModel {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn input_size(&self) -> InputSize {
        self.model.input_size
    }

    pub fn device(&self) -> &Device {
        &self.model.device
    }

    pub fn warmup_latency(&self) -> Duration {
        self.warmup_latency
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor, InferError> {
        self.model.network.forward(input)
    }
}
