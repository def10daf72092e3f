use {
    crate::*,
    base::Vec2,
    image::{Image, PixelFormat},
    std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Instant,
    },
    tokio::{
        sync::{mpsc, oneshot},
        task::{JoinHandle, spawn_blocking},
    },
};

// capacity of the video input channel
const CHANNEL_CAPACITY: usize = 4;

// delay before reconnecting after failure
const WAIT_BEFORE_RECONNECT_MS: u64 = 100;

#[derive(Debug, Clone)]
pub enum VideoInConfig {
    TestPattern(testpattern::TestPatternConfig),
    #[cfg(feature = "v4l2")]
    V4l2(v4l2::V4l2Config),
}

pub(crate) trait VideoInDevice: Send {
    fn open(&mut self, config: &VideoInConfig) -> Result<VideoInConfig, VideoError>; // open the device, return config that was actually set
    fn close(&mut self); // close the device, if open
    fn blocking_capture(&mut self) -> Result<Image, VideoError>; // capture a frame
}

pub struct VideoIn {
    receiver: mpsc::Receiver<VideoFrame>,
    cancel: Arc<AtomicBool>,
    size: Vec2<usize>,
    format: PixelFormat,
    frame_rate: f32,
    dropped: u64,
    join_handle: Option<JoinHandle<()>>,
}

impl VideoIn {
    fn create_device(config: &VideoInConfig) -> Box<dyn VideoInDevice> {
        match config {
            VideoInConfig::TestPattern(_) => Box::new(testpattern::TestPattern::new()),
            #[cfg(feature = "v4l2")]
            VideoInConfig::V4l2(_) => Box::new(v4l2::V4l2::new()),
        }
    }

    async fn spawn_worker(
        sender: mpsc::Sender<VideoFrame>,
        config: VideoInConfig,
        cancel: Arc<AtomicBool>,
    ) -> Result<(JoinHandle<()>, VideoInConfig), VideoError> {
        let mut device = Self::create_device(&config);

        // device.open() runs on the same OS thread as blocking_capture(), the
        // resolved config comes back over a oneshot
        let (init_tx, init_rx) = oneshot::channel::<Result<VideoInConfig, VideoError>>();

        let join_handle = spawn_blocking(move || {
            let mut config = match device.open(&config) {
                Ok(config) => {
                    let _ = init_tx.send(Ok(config.clone()));
                    config
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            let mut sequence = 0u64;
            while !cancel.load(Ordering::Relaxed) {
                log::info!("video worker: starting capture loop");
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    match device.blocking_capture() {
                        Ok(image) => {
                            let frame = VideoFrame {
                                image,
                                sequence,
                                captured_at: Instant::now(),
                            };
                            sequence += 1;
                            if sender.blocking_send(frame).is_err() {
                                // receiver is gone, nobody wants frames anymore
                                device.close();
                                return;
                            }
                        }
                        Err(VideoError::EndOfStream) => {
                            log::info!("video worker: end of stream");
                            device.close();
                            return;
                        }
                        Err(e) => {
                            log::error!("video worker: capture failed: {}", e);
                            break;
                        }
                    }
                }

                // close, wait, and reopen the device
                while !cancel.load(Ordering::Relaxed) {
                    log::info!("video worker: reconnecting...");
                    device.close();
                    std::thread::sleep(std::time::Duration::from_millis(
                        WAIT_BEFORE_RECONNECT_MS,
                    ));
                    if let Ok(new_config) = device.open(&config) {
                        config = new_config;
                        break;
                    }
                }
            }
            device.close();
        });

        let config = init_rx
            .await
            .map_err(|_| VideoError::Device("Worker thread died during init".to_string()))??;

        Ok((join_handle, config))
    }

    fn decode_config(config: &VideoInConfig) -> (Vec2<usize>, PixelFormat, f32) {
        match config {
            VideoInConfig::TestPattern(config) => {
                (config.size, PixelFormat::Rgb8, config.frame_rate)
            }
            #[cfg(feature = "v4l2")]
            VideoInConfig::V4l2(config) => (
                config.size.unwrap_or_default(),
                config.format.unwrap_or(PixelFormat::Yuyv),
                config.frame_rate.unwrap_or(0.0),
            ),
        }
    }

    /// Start capturing. Returns once the device is open and streaming.
    pub async fn open(config: VideoInConfig) -> Result<Self, VideoError> {
        let (sender, receiver) = mpsc::channel::<VideoFrame>(CHANNEL_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));

        let (join_handle, config) = Self::spawn_worker(sender, config, Arc::clone(&cancel)).await?;
        let (size, format, frame_rate) = Self::decode_config(&config);
        log::info!(
            "video: opened {} {:?} at {:.1} fps",
            size,
            format,
            frame_rate
        );

        Ok(Self {
            receiver,
            cancel,
            size,
            format,
            frame_rate,
            dropped: 0,
            join_handle: Some(join_handle),
        })
    }

    pub fn size(&self) -> Vec2<usize> {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Frames discarded by `capture` because a newer one was already waiting.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Wait for a frame and return the newest one available.
    pub async fn capture(&mut self) -> Result<VideoFrame, VideoError> {
        let mut frame = self
            .receiver
            .recv()
            .await
            .ok_or_else(|| VideoError::Channel("Video input channel closed".to_string()))?;
        while let Ok(newer) = self.receiver.try_recv() {
            self.dropped += 1;
            frame = newer;
        }
        Ok(frame)
    }
}

impl Drop for VideoIn {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // the blocking worker notices the flag (or the closed channel) and exits
        self.join_handle.take();
    }
}

pub mod testpattern;
pub use testpattern::{TestPatternConfig, test_pattern_frame};

#[cfg(feature = "v4l2")]
pub mod v4l2;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Config;
