use {
    crate::*,
    candle_core::{DType, Device, Tensor},
    image::{Image, PixelFormat},
    inference::WarmedModel,
    std::time::{Duration, Instant},
};

type Inspector = Box<dyn FnMut(BufferRole, &Tensor) + Send>;

// per-axis source indices and weights for TF-style bilinear resampling:
// src = dst * in / out, neighbours floor(src) and min(floor(src) + 1, in - 1)
fn axis_weights(in_len: usize, out_len: usize) -> (Vec<u32>, Vec<u32>, Vec<f32>) {
    let scale = in_len as f32 / out_len as f32;
    let mut lower = Vec::with_capacity(out_len);
    let mut upper = Vec::with_capacity(out_len);
    let mut weight = Vec::with_capacity(out_len);
    for dst in 0..out_len {
        let src = dst as f32 * scale;
        let lo = (src.floor() as usize).min(in_len - 1);
        let hi = (lo + 1).min(in_len - 1);
        lower.push(lo as u32);
        upper.push(hi as u32);
        weight.push(src - lo as f32);
    }
    (lower, upper, weight)
}

/// Bilinear resample of an `[h, w, c]` tensor to `[out_h, out_w, c]` f32.
///
/// No corner alignment and no half-pixel centres, matching TensorFlow's
/// default `resize_bilinear`.
pub fn resize_bilinear(
    image: &Tensor,
    out_h: usize,
    out_w: usize,
) -> candle_core::Result<Tensor> {
    let (in_h, in_w, _) = image.dims3()?;
    let image = image.to_dtype(DType::F32)?;
    if in_h == out_h && in_w == out_w {
        return Ok(image);
    }
    let device = image.device();

    let (y0, y1, wy) = axis_weights(in_h, out_h);
    let y0 = Tensor::from_vec(y0, out_h, device)?;
    let y1 = Tensor::from_vec(y1, out_h, device)?;
    let wy = Tensor::from_vec(wy, (out_h, 1, 1), device)?;
    let top = image.index_select(&y0, 0)?;
    let bottom = image.index_select(&y1, 0)?;
    let rows = (top.broadcast_mul(&wy.affine(-1.0, 1.0)?)? + bottom.broadcast_mul(&wy)?)?;

    let (x0, x1, wx) = axis_weights(in_w, out_w);
    let x0 = Tensor::from_vec(x0, out_w, device)?;
    let x1 = Tensor::from_vec(x1, out_w, device)?;
    let wx = Tensor::from_vec(wx, (1, out_w, 1), device)?;
    let left = rows.index_select(&x0, 1)?;
    let right = rows.index_select(&x1, 1)?;
    left.broadcast_mul(&wx.affine(-1.0, 1.0)?)? + right.broadcast_mul(&wx)?
}

/// The per-frame chain: pixels in, clipped [0, 1] image out to a surface.
///
/// Every intermediate buffer lives in a `BufferArena` scoped to one call of
/// `process_frame`.
pub struct FramePipeline {
    model: WarmedModel,
    ledger: BufferLedger,
    telemetry: Telemetry,
    debug_shapes: bool,
    invocations: u64,
    inspector: Option<Inspector>,
}

impl FramePipeline {
    pub fn new(model: WarmedModel, telemetry: Telemetry) -> Self {
        Self {
            model,
            ledger: BufferLedger::new(),
            telemetry,
            debug_shapes: false,
            invocations: 0,
            inspector: None,
        }
    }

    /// Log every stage's role and shape at debug level.
    pub fn with_debug_shapes(mut self, enabled: bool) -> Self {
        self.debug_shapes = enabled;
        self
    }

    pub fn with_ledger(mut self, ledger: BufferLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Observe each buffer as it is produced.
    pub fn with_inspector(
        mut self,
        inspector: impl FnMut(BufferRole, &Tensor) + Send + 'static,
    ) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    pub fn model(&self) -> &WarmedModel {
        &self.model
    }

    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Invocations attempted so far, failed ones included.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    fn record(&mut self, arena: &mut BufferArena, role: BufferRole, tensor: Tensor) {
        let buffer = arena.alloc(role, tensor);
        if self.debug_shapes {
            self.telemetry.stage(role, buffer.dims());
        }
        if let Some(inspector) = self.inspector.as_mut() {
            inspector(role, buffer.tensor());
        }
    }

    fn input(
        arena: &BufferArena,
        role: BufferRole,
        stage: Stage,
    ) -> Result<&Tensor, InvocationError> {
        arena
            .tensor(role)
            .ok_or_else(|| InvocationError::shape(stage, format!("no {} buffer", role)))
    }

    fn raw_pixels(frame: &Image, device: &Device) -> Result<Tensor, InvocationError> {
        if frame.format != PixelFormat::Rgb8 {
            return Err(InvocationError::shape(
                Stage::Capture,
                format!("expected RGB8 frame, got {:?}", frame.format),
            ));
        }
        if frame.size.is_empty() {
            return Err(InvocationError::shape(
                Stage::Capture,
                format!("empty frame {}", frame.size),
            ));
        }
        let expected = frame.size.area() * 3;
        if frame.data.len() != expected {
            return Err(InvocationError::shape(
                Stage::Capture,
                format!(
                    "{} frame needs {} bytes, got {}",
                    frame.size,
                    expected,
                    frame.data.len()
                ),
            ));
        }
        Tensor::from_vec(
            frame.data.clone(),
            (frame.size.y, frame.size.x, 3),
            device,
        )
        .map_err(|e| InvocationError::backend(Stage::Capture, e))
    }

    /// Run one frame through the chain and present it on `surface`.
    ///
    /// Returns the inference latency. On failure nothing is presented, and
    /// every buffer is released either way.
    pub fn process_frame<S: RenderSurface + ?Sized>(
        &mut self,
        frame: &Image,
        surface: &mut S,
    ) -> Result<Duration, InvocationError> {
        self.invocations += 1;
        let mut arena = BufferArena::new(self.ledger.clone());
        let input_size = self.model.input_size();
        let batched_shape = input_size.batched_shape();

        // capture
        let raw = Self::raw_pixels(frame, self.model.device())?;
        self.record(&mut arena, BufferRole::RawPixels, raw);

        // resize
        let raw = Self::input(&arena, BufferRole::RawPixels, Stage::Resize)?;
        let resized = resize_bilinear(raw, input_size.height, input_size.width)
            .map_err(|e| InvocationError::backend(Stage::Resize, e))?;
        self.record(&mut arena, BufferRole::Resized, resized);

        // cast
        let resized = Self::input(&arena, BufferRole::Resized, Stage::Cast)?;
        let cast = resized
            .to_dtype(DType::F32)
            .map_err(|e| InvocationError::backend(Stage::Cast, e))?;
        self.record(&mut arena, BufferRole::FloatCast, cast);

        // normalize
        let cast = Self::input(&arena, BufferRole::FloatCast, Stage::Normalize)?;
        let scaled = Tensor::new(255f32, cast.device())
            .and_then(|divisor| cast.broadcast_div(&divisor))
            .map_err(|e| InvocationError::backend(Stage::Normalize, e))?;
        self.record(&mut arena, BufferRole::Scaled, scaled);
        let scaled = Self::input(&arena, BufferRole::Scaled, Stage::Normalize)?;
        let centered = (scaled - 0.5).map_err(|e| InvocationError::backend(Stage::Normalize, e))?;
        self.record(&mut arena, BufferRole::Centered, centered);

        // batch
        let centered = Self::input(&arena, BufferRole::Centered, Stage::Batch)?;
        let batched = centered
            .unsqueeze(0)
            .map_err(|e| InvocationError::backend(Stage::Batch, e))?;
        if batched.dims() != batched_shape {
            return Err(InvocationError::shape(
                Stage::Batch,
                format!("batched {:?}, model wants {:?}", batched.dims(), batched_shape),
            ));
        }
        self.record(&mut arena, BufferRole::Batched, batched);

        // infer
        let batched = Self::input(&arena, BufferRole::Batched, Stage::Infer)?;
        let start = Instant::now();
        let inferred = self
            .model
            .forward(batched)
            .map_err(|e| InvocationError::backend(Stage::Infer, e))?;
        let latency = start.elapsed();
        if inferred.dims() != batched_shape {
            return Err(InvocationError::shape(
                Stage::Infer,
                format!("model returned {:?}, expected {:?}", inferred.dims(), batched_shape),
            ));
        }
        self.telemetry.predict(latency);
        self.record(&mut arena, BufferRole::Inferred, inferred);

        // unbatch
        let inferred = Self::input(&arena, BufferRole::Inferred, Stage::Unbatch)?;
        let unbatched = inferred
            .squeeze(0)
            .map_err(|e| InvocationError::backend(Stage::Unbatch, e))?;
        self.record(&mut arena, BufferRole::Unbatched, unbatched);

        // denormalize
        let unbatched = Self::input(&arena, BufferRole::Unbatched, Stage::Denormalize)?;
        let rescaled =
            (unbatched * 1.0).map_err(|e| InvocationError::backend(Stage::Denormalize, e))?;
        self.record(&mut arena, BufferRole::Rescaled, rescaled);
        let rescaled = Self::input(&arena, BufferRole::Rescaled, Stage::Denormalize)?;
        let shifted =
            (rescaled + 1.0).map_err(|e| InvocationError::backend(Stage::Denormalize, e))?;
        self.record(&mut arena, BufferRole::Shifted, shifted);

        // clip
        let shifted = Self::input(&arena, BufferRole::Shifted, Stage::Clip)?;
        let clipped = shifted
            .clamp(0f32, 1f32)
            .map_err(|e| InvocationError::backend(Stage::Clip, e))?;
        self.record(&mut arena, BufferRole::Clipped, clipped);

        // render
        let clipped = Self::input(&arena, BufferRole::Clipped, Stage::Render)?;
        surface.present(clipped).map_err(InvocationError::render)?;

        Ok(latency)
    }
}
