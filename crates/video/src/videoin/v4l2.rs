use {
    crate::*,
    base::Vec2,
    image::{Image, PixelFormat},
    std::path::PathBuf,
    v4l::{
        Device, Format, FourCC, buffer::Type, io::mmap::Stream as MmapStream,
        io::traits::CaptureStream, video::Capture,
    },
};

// number of mmap buffers in the capture stream
const BUFFER_COUNT: u32 = 4;

#[derive(Debug, Clone, Default)]
pub struct V4l2Config {
    pub path: Option<PathBuf>,
    pub size: Option<Vec2<usize>>,
    pub format: Option<PixelFormat>,
    pub frame_rate: Option<f32>,
}

pub(crate) struct V4l2 {
    stream: Option<MmapStream<'static>>,
    size: Vec2<usize>,
    format: PixelFormat,
    frame_rate: f32,
}

impl V4l2 {
    pub fn new() -> Self {
        Self {
            stream: None,
            size: Vec2::new(0, 0),
            format: PixelFormat::Yuyv,
            frame_rate: 0.0,
        }
    }
}

fn to_fourcc(format: PixelFormat) -> FourCC {
    FourCC::new(&format.as_fourcc().to_le_bytes())
}

impl VideoInDevice for V4l2 {
    fn open(&mut self, config: &VideoInConfig) -> Result<VideoInConfig, VideoError> {
        self.stream.take();

        let VideoInConfig::V4l2(config) = config else {
            return Err(VideoError::Device(
                "V4l2::open should be called with VideoInConfig::V4l2".to_string(),
            ));
        };

        let device = match &config.path {
            Some(path) => Device::with_path(path)?,
            None => Device::new(0)?,
        };
        let device_format = Capture::format(&device)?;

        let desired_size = config.size.unwrap_or(Vec2::new(
            device_format.width as usize,
            device_format.height as usize,
        ));
        let desired_fourcc = match config.format {
            Some(format) => to_fourcc(format),
            None => device_format.fourcc,
        };

        // the driver picks the closest supported format
        let actual_format = Capture::set_format(
            &device,
            &Format::new(desired_size.x as u32, desired_size.y as u32, desired_fourcc),
        )?;
        self.size = Vec2::new(actual_format.width as usize, actual_format.height as usize);
        self.format = PixelFormat::from_fourcc(u32::from_le_bytes(actual_format.fourcc.repr))
            .map_err(|e| VideoError::Device(e.to_string()))?;

        let desired_frame_rate = match config.frame_rate {
            Some(frame_rate) => frame_rate,
            None => {
                let params = Capture::params(&device)?;
                params.interval.denominator as f32 / params.interval.numerator as f32
            }
        };
        let actual_params = Capture::set_params(
            &device,
            &v4l::video::capture::Parameters::with_fps(desired_frame_rate as u32),
        )?;
        self.frame_rate =
            actual_params.interval.denominator as f32 / actual_params.interval.numerator as f32;

        self.stream = Some(
            MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
                .map_err(|error| VideoError::Stream(error.to_string()))?,
        );

        Ok(VideoInConfig::V4l2(V4l2Config {
            path: config.path.clone(),
            size: Some(self.size),
            format: Some(self.format),
            frame_rate: Some(self.frame_rate),
        }))
    }

    fn close(&mut self) {
        self.stream.take();
    }

    fn blocking_capture(&mut self) -> Result<Image, VideoError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| VideoError::Stream("No stream".to_string()))?;
        let (frame_data, metadata) =
            CaptureStream::next(stream).map_err(|error| VideoError::Stream(error.to_string()))?;
        // MJPEG frames carry their real length in bytesused
        let used = match self.format {
            PixelFormat::Jpeg => (metadata.bytesused as usize).min(frame_data.len()),
            _ => frame_data.len(),
        };
        Ok(Image::new(self.size, frame_data[..used].to_vec(), self.format))
    }
}
