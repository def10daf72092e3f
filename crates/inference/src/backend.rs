use {
    crate::*,
    candle_core::{DType, Device, Tensor},
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

/// Compute device the pipeline and the model run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda {
        ordinal: usize,
    },
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda { ordinal } => write!(f, "cuda:{}", ordinal),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    /// Accepts `cpu`, `cuda` and `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "cuda" | "gpu" => Ok(DeviceKind::Cuda { ordinal: 0 }),
            _ => match s.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse::<usize>()
                    .map(|ordinal| DeviceKind::Cuda { ordinal })
                    .map_err(|_| format!("invalid cuda ordinal: {}", ordinal)),
                None => Err(format!("unknown device: {}", s)),
            },
        }
    }
}

/// Graph optimisation level handed to the ONNX runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Disable,
    Basic,
    Extended,
    #[default]
    All,
}

impl From<OptimizationLevel> for ort::session::builder::GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        use ort::session::builder::GraphOptimizationLevel as Level;
        match level {
            OptimizationLevel::Disable => Level::Disable,
            OptimizationLevel::Basic => Level::Level1,
            OptimizationLevel::Extended => Level::Level2,
            OptimizationLevel::All => Level::Level3,
        }
    }
}

/// Tuning flags, applied once when the backend comes up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    device: DeviceKind,
    optimization_level: OptimizationLevel,
    intra_threads: Option<usize>,
    inter_threads: Option<usize>,
    memory_pattern: bool,
    parallel_execution: bool,
    production: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            device: DeviceKind::Cpu,
            optimization_level: OptimizationLevel::All,
            intra_threads: None,
            inter_threads: None,
            memory_pattern: true,
            parallel_execution: false,
            production: !cfg!(debug_assertions),
        }
    }
}

impl BackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.device = device;
        self
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    pub fn with_memory_pattern(mut self, enabled: bool) -> Self {
        self.memory_pattern = enabled;
        self
    }

    pub fn with_parallel_execution(mut self, enabled: bool) -> Self {
        self.parallel_execution = enabled;
        self
    }

    /// Production mode turns off per-stage debug output.
    pub fn with_production(mut self, enabled: bool) -> Self {
        self.production = enabled;
        self
    }

    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn optimization_level(&self) -> OptimizationLevel {
        self.optimization_level
    }

    pub fn intra_threads(&self) -> Option<usize> {
        self.intra_threads
    }

    pub fn inter_threads(&self) -> Option<usize> {
        self.inter_threads
    }

    pub fn memory_pattern(&self) -> bool {
        self.memory_pattern
    }

    pub fn parallel_execution(&self) -> bool {
        self.parallel_execution
    }

    pub fn production(&self) -> bool {
        self.production
    }
}

/// An initialised compute backend. Models are loaded through it.
#[derive(Debug, Clone)]
pub struct Backend {
    config: BackendConfig,
    device: Device,
}

impl Backend {
    /// Bring up the configured device and wait until it answers.
    pub fn init(config: BackendConfig) -> Result<Self, InferError> {
        let device = match config.device() {
            DeviceKind::Cpu => Device::Cpu,
            #[cfg(feature = "cuda")]
            DeviceKind::Cuda { ordinal } => Device::new_cuda(ordinal)?,
            #[cfg(not(feature = "cuda"))]
            kind @ DeviceKind::Cuda { .. } => return Err(InferError::UnsupportedDevice(kind)),
        };

        // a tiny round trip through the device is the ready signal
        let probe = Tensor::zeros((1, 4), DType::F32, &device)?
            .sum_all()?
            .to_scalar::<f32>()?;
        if probe != 0.0 {
            return Err(InferError::Runtime(format!(
                "device {} failed the ready probe",
                config.device()
            )));
        }

        let backend = Self { config, device };
        base::log_info!(
            "backend: {} device: {}",
            backend.name(),
            backend.config.device()
        );
        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        "onnxruntime"
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Load an ONNX model artifact from `uri` (`file://...` or a plain path).
    pub fn load(&self, uri: &str, input_size: InputSize) -> Result<Model, InferError> {
        let path = resolve_model_uri(uri)?;
        let network = OnnxNetwork::load(&path, self)?;
        Ok(Model::from_network(
            uri,
            input_size,
            self.device.clone(),
            Box::new(network),
        ))
    }
}
