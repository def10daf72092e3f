use {image::Image, std::time::Instant};

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: Image,
    /// Monotonic capture counter, starting at 0 for each opened device.
    pub sequence: u64,
    pub captured_at: Instant,
}
