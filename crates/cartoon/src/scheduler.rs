use {
    crate::*,
    serde::{Deserialize, Serialize},
    std::{sync::Arc, time::Duration},
    tokio::{
        sync::watch,
        time::{Interval, MissedTickBehavior, interval},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Play,
    Pause,
    Stop,
}

/// Shared play/pause/stop switch. Clones control the same scheduler.
///
/// The scheduler only looks at it between ticks.
#[derive(Debug, Clone)]
pub struct PlaybackControl {
    sender: Arc<watch::Sender<Playback>>,
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackControl {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Playback::Play);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Flip between playing and paused. Has no effect once stopped.
    pub fn toggle(&self) {
        self.sender.send_modify(|playback| {
            *playback = match *playback {
                Playback::Play => Playback::Pause,
                Playback::Pause => Playback::Play,
                Playback::Stop => Playback::Stop,
            }
        });
    }

    pub fn pause(&self) {
        self.set(Playback::Pause);
    }

    pub fn resume(&self) {
        self.set(Playback::Play);
    }

    pub fn stop(&self) {
        self.sender.send_replace(Playback::Stop);
    }

    fn set(&self, target: Playback) {
        self.sender.send_if_modified(|playback| {
            if *playback == Playback::Stop || *playback == target {
                false
            } else {
                *playback = target;
                true
            }
        });
    }

    pub fn is_paused(&self) -> bool {
        *self.sender.borrow() == Playback::Pause
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow() == Playback::Stop
    }

    /// Resolve as soon as the control is no longer paused.
    pub async fn wait_while_paused(&self) {
        let mut receiver = self.sender.subscribe();
        while *receiver.borrow_and_update() == Playback::Pause {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

/// What to do when an invocation fails during `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log it and keep the last good frame on screen.
    #[default]
    Continue,
    /// Stop the loop and return the error.
    Halt,
}

#[derive(Debug)]
pub enum TickOutcome {
    Rendered { latency: Duration },
    Failed(InvocationError),
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub rendered: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// External pacing signal, e.g. the display refresh.
#[allow(async_fn_in_trait)]
pub trait Pacer {
    async fn next_tick(&mut self);
}

pub const MIN_RATE: f32 = 1.0;
pub const MAX_RATE: f32 = 1000.0;
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// `tokio::time::interval` pacing. Late ticks are delayed rather than
/// bunched, so a slow frame does not cause a burst of invocations.
pub struct IntervalPacer {
    interval: Interval,
}

impl IntervalPacer {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Pace at `rate` ticks per second, clamped to between 1 and 1000.
    pub fn from_rate(rate: f32) -> Self {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            MAX_RATE
        };
        Self::new(Duration::from_secs_f32(1.0 / rate).max(MIN_PERIOD))
    }
}

impl Pacer for IntervalPacer {
    async fn next_tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Drives the pipeline: one invocation per tick while playing.
pub struct Scheduler<C: CaptureSource, S: RenderSurface> {
    pipeline: FramePipeline,
    capture: C,
    surface: S,
    telemetry: Telemetry,
    policy: ErrorPolicy,
    control: PlaybackControl,
    state: PipelineState,
    summary: RunSummary,
}

impl<C: CaptureSource, S: RenderSurface> Scheduler<C, S> {
    pub fn new(pipeline: FramePipeline, capture: C, surface: S) -> Self {
        let telemetry = pipeline.telemetry().clone();
        Self {
            pipeline,
            capture,
            surface,
            telemetry,
            policy: ErrorPolicy::default(),
            control: PlaybackControl::new(),
            state: PipelineState::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_control(mut self, control: PlaybackControl) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> PlaybackControl {
        self.control.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Idle to Playing. Returns false if already started.
    pub fn start(&mut self) -> bool {
        if self.state != PipelineState::Idle {
            return false;
        }
        self.state = PipelineState::Playing;
        self.telemetry.camera_started();
        true
    }

    // adopt the control's play/pause setting, at tick boundaries only
    fn sync(&mut self) {
        if self.control.is_stopped() {
            return;
        }
        let paused = self.control.is_paused();
        match (self.state, paused) {
            (PipelineState::Playing, true) => {
                self.state = PipelineState::Paused;
                self.telemetry.paused();
            }
            (PipelineState::Paused, false) => {
                self.state = PipelineState::Playing;
                self.telemetry.resumed();
            }
            _ => {}
        }
    }

    /// One scheduling opportunity.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.control.is_stopped() {
            self.summary.skipped += 1;
            return TickOutcome::Skipped;
        }
        self.sync();
        if self.state != PipelineState::Playing {
            self.summary.skipped += 1;
            return TickOutcome::Skipped;
        }

        let outcome = match self.capture.capture().await {
            Ok(frame) => match self.pipeline.process_frame(&frame, &mut self.surface) {
                Ok(latency) => TickOutcome::Rendered { latency },
                Err(error) => TickOutcome::Failed(error),
            },
            Err(error) => TickOutcome::Failed(InvocationError::capture(error)),
        };
        match &outcome {
            TickOutcome::Rendered { .. } => self.summary.rendered += 1,
            TickOutcome::Failed(error) => {
                self.summary.failed += 1;
                self.telemetry.invocation_failed(error);
            }
            TickOutcome::Skipped => self.summary.skipped += 1,
        }
        outcome
    }

    /// One tick with the error policy applied.
    ///
    /// Returns `Ok(false)` once the capture source is closed, and the error
    /// itself under `ErrorPolicy::Halt`.
    pub async fn advance(&mut self) -> Result<bool, InvocationError> {
        match self.tick().await {
            TickOutcome::Failed(error) => {
                if let InvocationErrorKind::Capture(CaptureError::Closed) = error.kind {
                    return Ok(false);
                }
                match self.policy {
                    ErrorPolicy::Continue => Ok(true),
                    ErrorPolicy::Halt => Err(error),
                }
            }
            TickOutcome::Rendered { .. } | TickOutcome::Skipped => Ok(true),
        }
    }

    /// Stop the control and report buffer and frame totals.
    pub fn finish(&mut self) -> RunSummary {
        self.control.stop();
        self.telemetry.buffers(self.pipeline.ledger());
        self.telemetry.stopped(&self.summary);
        self.summary
    }

    /// Tick on every pacer signal until stopped.
    ///
    /// While paused this waits for the control to change instead of ticking.
    /// A closed capture source ends the run.
    pub async fn run<P: Pacer>(&mut self, pacer: &mut P) -> Result<RunSummary, InvocationError> {
        self.start();
        loop {
            if self.control.is_stopped() {
                break;
            }
            self.sync();
            if self.state == PipelineState::Paused {
                self.control.wait_while_paused().await;
                continue;
            }
            pacer.next_tick().await;
            if self.control.is_stopped() || !self.advance().await? {
                break;
            }
        }
        Ok(self.finish())
    }
}
