use {
    crate::*,
    candle_core::{DType, Device, Tensor},
    ndarray::{ArrayD, IxDyn},
    ort::{session::Session, value::TensorRef},
    std::{
        fmt::Display,
        path::Path,
        sync::{Mutex, OnceLock},
    },
};

static ORT_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// commit the global ort environment once per process
fn ensure_ort_init() -> Result<(), InferError> {
    ORT_INIT
        .get_or_init(|| {
            ort::init()
                .with_name("cartoon")
                .commit()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .clone()
        .map_err(InferError::Onnx)
}

fn onnx_error(error: impl Display) -> InferError {
    InferError::Onnx(error.to_string())
}

/// ONNX graph executed by onnxruntime, fed and read as candle tensors.
pub struct OnnxNetwork {
    name: String,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
    device: Device,
}

impl OnnxNetwork {
    pub fn load(path: &Path, backend: &Backend) -> Result<Self, InferError> {
        ensure_ort_init()?;
        let config = backend.config();

        let mut builder = Session::builder()
            .map_err(onnx_error)?
            .with_optimization_level(config.optimization_level().into())
            .map_err(onnx_error)?
            .with_memory_pattern(config.memory_pattern())
            .map_err(onnx_error)?
            .with_parallel_execution(config.parallel_execution())
            .map_err(onnx_error)?;
        if let Some(threads) = config.intra_threads() {
            builder = builder.with_intra_threads(threads).map_err(onnx_error)?;
        }
        if let Some(threads) = config.inter_threads() {
            builder = builder.with_inter_threads(threads).map_err(onnx_error)?;
        }
        #[cfg(feature = "cuda")]
        if let DeviceKind::Cuda { ordinal } = config.device() {
            use ort::execution_providers::CUDAExecutionProvider;
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(ordinal as i32)
                    .build()])
                .map_err(onnx_error)?;
        }

        let session = builder.commit_from_file(path).map_err(|e| {
            InferError::ModelLoad(format!("cannot load {}: {}", path.display(), e))
        })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| InferError::ModelLoad(format!("{} has no inputs", path.display())))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferError::ModelLoad(format!("{} has no outputs", path.display())))?;

        let name = path
            .parent()
            .and_then(|dir| dir.file_name())
            .or_else(|| path.file_stem())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        base::log_debug!(
            "onnx: {} input '{}' output '{}'",
            name,
            input_name,
            output_name
        );

        Ok(Self {
            name,
            input_name,
            output_name,
            session: Mutex::new(session),
            device: backend.device().clone(),
        })
    }
}

impl Network for OnnxNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, InferError> {
        let shape = input.dims().to_vec();
        let data = input.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        let array = ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| InferError::Shape(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferError::Runtime(format!("session lock poisoned: {}", e)))?;
        let feed = TensorRef::from_array_view(array.view()).map_err(onnx_error)?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => feed])
            .map_err(onnx_error)?;
        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(onnx_error)?;

        let output_shape = output.shape().to_vec();
        let output_data: Vec<f32> = output.iter().copied().collect();
        Ok(Tensor::from_vec(output_data, output_shape, &self.device)?)
    }
}
