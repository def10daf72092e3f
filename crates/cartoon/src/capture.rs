use {crate::*, image::Image, video::VideoIn};

/// Live frame source. `capture` yields the newest frame available as RGB8;
/// older buffered frames are discarded.
#[allow(async_fn_in_trait)]
pub trait CaptureSource {
    async fn capture(&mut self) -> Result<Image, CaptureError>;
}

impl CaptureSource for VideoIn {
    async fn capture(&mut self) -> Result<Image, CaptureError> {
        let frame = VideoIn::capture(self).await?;
        Ok(frame.image.into_rgb8()?)
    }
}
