use {
    base::Vec2,
    candle_core::Tensor,
    cartoon::{RenderError, RenderSurface},
    image::unit_rgb_to_u32,
    minifb::{Key, KeyRepeat, MouseButton, Scale, Window, WindowOptions},
};

/// minifb window that keeps showing the last presented frame.
pub struct WindowSurface {
    window: Window,
    buffer: Vec<u32>,
    size: Vec2<usize>,
    mouse_was_down: bool,
}

impl WindowSurface {
    pub fn new(title: &str, size: Vec2<usize>) -> Result<Self, minifb::Error> {
        let window = Window::new(
            title,
            size.x,
            size.y,
            WindowOptions {
                scale: Scale::X2,
                ..WindowOptions::default()
            },
        )?;
        Ok(Self {
            window,
            buffer: vec![0xFF00_0000; size.area()],
            size,
            mouse_was_down: false,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// A click (on release) or the space bar.
    pub fn toggle_requested(&mut self) -> bool {
        let mouse_down = self.window.get_mouse_down(MouseButton::Left);
        let clicked = self.mouse_was_down && !mouse_down;
        self.mouse_was_down = mouse_down;
        clicked || self.window.is_key_pressed(Key::Space, KeyRepeat::No)
    }

    /// Handle window events and redisplay the current frame.
    pub fn pump(&mut self) -> Result<(), RenderError> {
        self.window
            .update_with_buffer(&self.buffer, self.size.x, self.size.y)
            .map_err(|e| RenderError::Surface(e.to_string()))
    }
}

impl RenderSurface for WindowSurface {
    fn present(&mut self, frame: &Tensor) -> Result<(), RenderError> {
        if !self.window.is_open() {
            return Err(RenderError::Closed);
        }
        let (height, width, channels) = frame
            .dims3()
            .map_err(|e| RenderError::Size(e.to_string()))?;
        if channels != 3 {
            return Err(RenderError::Size(format!("expected 3 channels, got {}", channels)));
        }
        let data = frame
            .flatten_all()
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| RenderError::Surface(e.to_string()))?;
        self.size = Vec2::new(width, height);
        self.buffer = unit_rgb_to_u32(self.size, &data);
        Ok(())
    }
}
