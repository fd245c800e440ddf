//! Deterministic frame simulation
//!
//! Runs the same driver, blink scheduler and activity source a session
//! runs, but single-threaded against a `ManualClock`. Every call to `step`
//! advances time by one frame period, ticks the activity source whenever
//! its period has elapsed, runs due blink work and offers the driver a
//! frame. Identical seeds give identical traces.

use std::time::Duration;

use mimic_asset::{AssetHandle, AttachOptions, LoadedAsset};
use mimic_core::{activity_channel, ActivityReader, AssetId, MediaTime, MimicResult};
use mimic_runtime::{
    AnimationDriver, BlinkConfig, BlinkEvent, BlinkScheduler, DriverConfig, HeadlessRenderer,
    RenderProbe, RenderTarget,
};
use mimic_scene::{add_default_lighting, Camera, MaterialSet, Scene, Viewport};
use mimic_time::{Clock, ManualClock};
use mimic_voice::{ActivityConfig, SpeechActivitySource};

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub viewport: Viewport,
    pub driver: DriverConfig,
    pub blink: BlinkConfig,
    pub activity: ActivityConfig,
    /// Simulated time per `step`
    pub frame_step: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            driver: DriverConfig::default(),
            blink: BlinkConfig {
                seed: Some(7),
                ..Default::default()
            },
            activity: ActivityConfig {
                seed: Some(7),
                ..Default::default()
            },
            frame_step: Duration::from_micros(16_667),
        }
    }
}

/// One executed-or-skipped frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub at: MediaTime,
    pub executed: bool,
    pub activity: f32,
    pub jaw_angle: Option<f32>,
    pub blink: Option<BlinkEvent>,
}

/// Single-threaded stand-in for a running session
pub struct FrameSimulator {
    config: SimulatorConfig,
    clock: ManualClock,
    scene: Scene,
    camera: Camera,
    driver: AnimationDriver,
    blink: BlinkScheduler,
    source: SpeechActivitySource,
    reader: ActivityReader,
    renderer: HeadlessRenderer,
    handle: Option<AssetHandle>,
    next_activity_tick: MediaTime,
    speak_until: Option<MediaTime>,
    trace: Vec<FrameSample>,
}

impl FrameSimulator {
    pub fn new(config: SimulatorConfig) -> MimicResult<Self> {
        let mut renderer = HeadlessRenderer::new();
        renderer.init(config.viewport)?;

        let mut scene = Scene::new();
        add_default_lighting(&mut scene)?;
        let (writer, reader) = activity_channel();

        Ok(Self {
            camera: Camera::for_viewport(config.viewport),
            driver: AnimationDriver::new(config.driver.clone()),
            blink: BlinkScheduler::new(config.blink.clone()),
            source: SpeechActivitySource::new(config.activity.clone(), writer),
            reader,
            renderer,
            scene,
            clock: ManualClock::new(),
            handle: None,
            next_activity_tick: MediaTime::ZERO,
            speak_until: None,
            trace: Vec::new(),
            config,
        })
    }

    /// Attach a loaded model, replacing the current one
    pub fn attach(&mut self, asset: LoadedAsset) -> MimicResult<AssetId> {
        let handle = asset.attach_with(&mut self.scene, &MaterialSet::default(), &AttachOptions::default())?;
        let id = handle.id();
        let root = handle.root();
        let targets = handle.targets().to_vec();
        let blink_targets = handle.blink_targets().to_vec();

        if let Some(mut previous) = self.handle.replace(handle) {
            previous.release(&mut self.scene);
        }
        self.blink.reset(&mut self.scene);
        self.blink.set_targets(blink_targets);
        self.driver.attach(&mut self.scene, root, &targets)?;
        Ok(id)
    }

    /// Open the mouth for `duration`, then let it decay
    pub fn speak(&mut self, duration: Duration) -> bool {
        if !self.source.start(None) {
            return false;
        }
        self.speak_until = Some(self.clock.now() + duration);
        true
    }

    /// Stop speaking now
    pub fn stop_speaking(&mut self) {
        self.speak_until = None;
        self.source.stop();
    }

    /// Advance one frame period
    pub fn step(&mut self) -> FrameSample {
        let now = self.clock.advance(self.config.frame_step);

        if self.speak_until.is_some_and(|until| now >= until) {
            self.speak_until = None;
            self.source.stop();
        }
        let tick = self.config.activity.tick_interval;
        while self.next_activity_tick <= now {
            self.source.tick(tick);
            self.next_activity_tick = self.next_activity_tick + tick;
        }

        let blink = self.blink.update(now, &mut self.scene);
        let activity = self.reader.snapshot();
        let mixer = self.handle.as_mut().and_then(|h| h.mixer_mut());
        let executed = self.driver.frame(
            now,
            activity,
            &self.blink,
            &mut self.scene,
            mixer,
            &self.camera,
            &mut self.renderer,
        );

        let sample = FrameSample {
            at: now,
            executed,
            activity: activity.value,
            jaw_angle: self.driver.jaw_angle(),
            blink,
        };
        self.trace.push(sample);
        sample
    }

    /// Step until `duration` of simulated time has passed
    pub fn run_for(&mut self, duration: Duration) -> Vec<FrameSample> {
        let end = self.clock.now() + duration;
        let mut samples = Vec::new();
        while self.clock.now() < end {
            samples.push(self.step());
        }
        samples
    }

    /// Release the model and stop the driver
    pub fn teardown(&mut self) {
        self.blink.reset(&mut self.scene);
        if let Some(mut handle) = self.handle.take() {
            handle.release(&mut self.scene);
        }
        self.driver.teardown(&mut self.scene);
    }

    pub fn now(&self) -> MediaTime {
        self.clock.now()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    pub fn blink(&self) -> &BlinkScheduler {
        &self.blink
    }

    pub fn handle(&self) -> Option<&AssetHandle> {
        self.handle.as_ref()
    }

    pub fn probe(&self) -> RenderProbe {
        self.renderer.probe()
    }

    pub fn is_speaking(&self) -> bool {
        self.source.is_speaking()
    }

    pub fn trace(&self) -> &[FrameSample] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }
}
