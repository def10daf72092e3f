use {crate::*, candle_core::Tensor};

/// Display target for finished frames.
///
/// `frame` is an `[h, w, 3]` f32 tensor with every sample in [0, 1]. The
/// surface copies what it needs; the tensor is released right after.
pub trait RenderSurface {
    fn present(&mut self, frame: &Tensor) -> Result<(), RenderError>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for &mut S {
    fn present(&mut self, frame: &Tensor) -> Result<(), RenderError> {
        (**self).present(frame)
    }
}

impl<S: RenderSurface + ?Sized> RenderSurface for Box<S> {
    fn present(&mut self, frame: &Tensor) -> Result<(), RenderError> {
        (**self).present(frame)
    }
}
