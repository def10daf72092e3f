use {
    crate::*,
    base::Vec2,
    image::Image,
    std::time::{Duration, Instant},
};

/// Synthetic camera: a scrolling RGB gradient, paced at `frame_rate`.
///
/// Handy when no camera is attached, and in tests. With `frames` set the
/// source ends after that many frames.
#[derive(Debug, Clone)]
pub struct TestPatternConfig {
    pub size: Vec2<usize>,
    pub frame_rate: f32,
    pub frames: Option<u64>,
}

impl Default for TestPatternConfig {
    fn default() -> Self {
        Self {
            size: Vec2::new(640, 480),
            frame_rate: 30.0,
            frames: None,
        }
    }
}

pub(crate) struct TestPattern {
    config: Option<TestPatternConfig>,
    produced: u64,
    last_frame: Option<Instant>,
}

impl TestPattern {
    pub fn new() -> Self {
        Self {
            config: None,
            produced: 0,
            last_frame: None,
        }
    }
}

/// Render frame `index` of the gradient.
pub fn test_pattern_frame(size: Vec2<usize>, index: u64) -> Image {
    let shift = (index % 256) as usize;
    let mut data = Vec::with_capacity(size.area() * 3);
    for y in 0..size.y {
        for x in 0..size.x {
            let r = ((x * 255) / size.x.max(1) + shift) % 256;
            let g = ((y * 255) / size.y.max(1)) % 256;
            let b = (255 - shift) % 256;
            data.extend_from_slice(&[r as u8, g as u8, b as u8]);
        }
    }
    Image::new(size, data, image::PixelFormat::Rgb8)
}

impl VideoInDevice for TestPattern {
    fn open(&mut self, config: &VideoInConfig) -> Result<VideoInConfig, VideoError> {
        #[allow(irrefutable_let_patterns)]
        let VideoInConfig::TestPattern(config) = config else {
            return Err(VideoError::Device(
                "TestPattern::open should be called with VideoInConfig::TestPattern".to_string(),
            ));
        };
        if config.size.is_empty() {
            return Err(VideoError::Device(format!(
                "test pattern size must be non-zero, got {}",
                config.size
            )));
        }
        if !(config.frame_rate > 0.0) {
            return Err(VideoError::Device(format!(
                "test pattern frame rate must be positive, got {}",
                config.frame_rate
            )));
        }
        self.config = Some(config.clone());
        self.last_frame = None;
        Ok(VideoInConfig::TestPattern(config.clone()))
    }

    fn close(&mut self) {
        self.config = None;
    }

    fn blocking_capture(&mut self) -> Result<Image, VideoError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| VideoError::Stream("No stream".to_string()))?;

        if let Some(frames) = config.frames {
            if self.produced >= frames {
                return Err(VideoError::EndOfStream);
            }
        }

        let period = Duration::from_secs_f32(1.0 / config.frame_rate);
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());

        let image = test_pattern_frame(config.size, self.produced);
        self.produced += 1;
        Ok(image)
    }
}
