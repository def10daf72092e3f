use {
    crate::{
        scheduler::{MAX_RATE, MIN_RATE},
        *,
    },
    base::Vec2,
    inference::{BackendConfig, DeviceKind, InputSize},
    serde::{Deserialize, Serialize},
    std::{fmt, path::Path, path::PathBuf, str::FromStr},
    video::{TestPatternConfig, VideoInConfig},
};

const PRESET_INPUT_SIZE: usize = 256;

/// Bundled cartoonizer models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelPreset {
    Hayao,
    Hosoda,
    Shinkai,
    Paprika,
    PaprikaLight,
    #[default]
    ShinkaiLight,
}

impl ModelPreset {
    pub const ALL: [ModelPreset; 6] = [
        ModelPreset::Hayao,
        ModelPreset::Hosoda,
        ModelPreset::Shinkai,
        ModelPreset::Paprika,
        ModelPreset::PaprikaLight,
        ModelPreset::ShinkaiLight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelPreset::Hayao => "hayao",
            ModelPreset::Hosoda => "hosoda",
            ModelPreset::Shinkai => "shinkai",
            ModelPreset::Paprika => "paprika",
            ModelPreset::PaprikaLight => "paprika-light",
            ModelPreset::ShinkaiLight => "shinkai-light",
        }
    }

    pub fn model_uri(self) -> String {
        format!("models/{}/model.onnx", self.name())
    }

    pub fn config(self) -> ModelConfig {
        ModelConfig {
            model_uri: self.model_uri(),
            input_size: InputSize::new(PRESET_INPUT_SIZE, PRESET_INPUT_SIZE),
        }
    }
}

impl fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModelPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        ModelPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| format!("unknown model preset: {}", s))
    }
}

/// Which model to run and the input size it was trained for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_uri: String,
    pub input_size: InputSize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelPreset::default().config()
    }
}

impl ModelConfig {
    /// A preset name, or else a model path/URI with the preset input size.
    pub fn from_reference(reference: &str) -> Self {
        match reference.parse::<ModelPreset>() {
            Ok(preset) => preset.config(),
            Err(_) => Self {
                model_uri: reference.trim().to_string(),
                input_size: InputSize::new(PRESET_INPUT_SIZE, PRESET_INPUT_SIZE),
            },
        }
    }

    pub fn with_input_size(mut self, input_size: InputSize) -> Self {
        self.input_size = input_size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureDevice {
    #[default]
    Camera,
    TestPattern,
}

/// Camera settings. The size is a preference; the driver picks the closest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: CaptureDevice,
    pub path: Option<PathBuf>,
    pub width: usize,
    pub height: usize,
    pub frame_rate: Option<f32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: CaptureDevice::Camera,
            path: None,
            width: 640,
            height: 480,
            frame_rate: None,
        }
    }
}

impl CaptureConfig {
    pub fn size(&self) -> Vec2<usize> {
        Vec2::new(self.width, self.height)
    }

    pub fn video_config(&self) -> Result<VideoInConfig, StartupError> {
        if self.width == 0 || self.height == 0 {
            return Err(StartupError::Config(format!(
                "capture size must be non-zero, got {}",
                self.size()
            )));
        }
        match self.device {
            CaptureDevice::TestPattern => Ok(VideoInConfig::TestPattern(TestPatternConfig {
                size: self.size(),
                frame_rate: self.frame_rate.unwrap_or(30.0),
                frames: None,
            })),
            #[cfg(feature = "v4l2")]
            CaptureDevice::Camera => Ok(VideoInConfig::V4l2(video::V4l2Config {
                path: self.path.clone(),
                size: Some(self.size()),
                format: None,
                frame_rate: self.frame_rate,
            })),
            #[cfg(not(feature = "v4l2"))]
            CaptureDevice::Camera => Err(StartupError::Config(
                "camera capture needs the v4l2 feature, use the test pattern instead".to_string(),
            )),
        }
    }
}

/// Everything the application reads at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub backend: BackendConfig,
    pub capture: CaptureConfig,
    pub error_policy: ErrorPolicy,
    pub refresh_rate: f32,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            backend: BackendConfig::default(),
            capture: CaptureConfig::default(),
            error_policy: ErrorPolicy::default(),
            refresh_rate: 60.0,
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, StartupError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| StartupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if !self.refresh_rate.is_finite()
            || !(MIN_RATE..=MAX_RATE).contains(&self.refresh_rate)
        {
            return Err(StartupError::Config(format!(
                "refresh_rate must be between {} and {}, got {}",
                MIN_RATE, MAX_RATE, self.refresh_rate
            )));
        }
        if let Some(frame_rate) = self.capture.frame_rate {
            if !(frame_rate.is_finite() && frame_rate > 0.0) {
                return Err(StartupError::Config(format!(
                    "capture frame_rate must be positive, got {}",
                    frame_rate
                )));
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StartupError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, StartupError> {
        serde_json::to_string_pretty(self).map_err(|e| StartupError::Config(e.to_string()))
    }

    /// Apply `CARTOON_MODEL`, `CARTOON_DEVICE` and `CARTOON_LOG_DIR` style
    /// overrides, looked up through `var`.
    pub fn with_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StartupError> {
        if let Some(model) = var("CARTOON_MODEL") {
            let input_size = self.model.input_size;
            self.model = match model.parse::<ModelPreset>() {
                Ok(preset) => preset.config(),
                Err(_) => ModelConfig::from_reference(&model).with_input_size(input_size),
            };
        }
        if let Some(device) = var("CARTOON_DEVICE") {
            let device = device
                .parse::<DeviceKind>()
                .map_err(StartupError::Config)?;
            self.backend = self.backend.with_device(device);
        }
        if let Some(dir) = var("CARTOON_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        self.validate()?;
        Ok(self)
    }
}
