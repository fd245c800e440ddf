//! Avatar session - owns everything a running avatar needs
//!
//! Shared frame state (scene, camera, driver, blink, current asset, renderer)
//! sits behind one mutex. The frame loop and blink timer lock it briefly per
//! wake-up; asset fetching happens outside the lock and only the attach/swap
//! runs inside it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use mimic_asset::{
    load_materials, AssetHandle, AssetLoader, AssetSource, AttachOptions, Candidate,
    LoaderConfig, ProgressSink, TextureSpec,
};
use mimic_core::{ActivityReader, AssetId, MediaTime, MimicError, MimicResult, NodeId, SpeechActivity};
use mimic_scene::{add_default_lighting, Camera, MaterialSet, Scene, Viewport};
use mimic_time::{Clock, MonotonicClock, TimerHandle, TimerSet};
use mimic_voice::{ActivityConfig, SpeechBackend};

use crate::{
    AnimationDriver, AvatarFacade, BlinkConfig, BlinkScheduler, DriverConfig, DriverState,
    DriverStats, RenderTarget, SpeechController,
};

/// Blink timer wake-up when nothing is scheduled
const BLINK_POLL: Duration = Duration::from_millis(250);

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub viewport: Viewport,
    pub driver: DriverConfig,
    pub blink: BlinkConfig,
    pub activity: ActivityConfig,
    pub loader: LoaderConfig,
    pub attach: AttachOptions,
    /// Head/body textures applied with the first model
    pub textures: Vec<TextureSpec>,
}

impl SessionConfig {
    pub fn validate(&self) -> MimicResult<()> {
        self.driver.validate()?;
        self.blink.validate()?;
        self.activity.validate()?;
        self.loader.validate()?;
        Ok(())
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub driver: DriverState,
    pub asset: Option<AssetId>,
    pub model_path: Option<String>,
    pub targets: usize,
    pub blink_targets: usize,
    pub speaking: bool,
    pub mouth_openness: f32,
    pub blinking: bool,
    pub viewport: Viewport,
    pub stats: DriverStats,
    pub torn_down: bool,
}

struct FrameState {
    scene: Scene,
    camera: Camera,
    driver: AnimationDriver,
    blink: BlinkScheduler,
    handle: Option<AssetHandle>,
    renderer: Box<dyn RenderTarget>,
    lights: Vec<NodeId>,
}

impl FrameState {
    fn frame(&mut self, now: MediaTime, activity: SpeechActivity) {
        let FrameState {
            scene,
            camera,
            driver,
            blink,
            handle,
            renderer,
            ..
        } = self;
        let mixer = handle.as_mut().and_then(|h| h.mixer_mut());
        driver.frame(now, activity, blink, scene, mixer, camera, renderer.as_mut());
    }

    /// Run due blink work; returns how long to sleep
    fn blink(&mut self, now: MediaTime) -> Duration {
        if let Some(event) = self.blink.update(now, &mut self.scene) {
            tracing::trace!(?event, "blink");
        }
        self.blink
            .next_deadline()
            .map_or(BLINK_POLL, |deadline| deadline - now)
    }
}

/// A running avatar
pub struct AvatarSession<S> {
    config: SessionConfig,
    state: Arc<Mutex<FrameState>>,
    loader: AssetLoader<S>,
    speech: Arc<Mutex<SpeechController>>,
    reader: ActivityReader,
    timers: TimerSet,
    materials: Option<MaterialSet>,
    last_candidates: Vec<Candidate>,
    torn_down: bool,
}

impl<S: AssetSource + 'static> AvatarSession<S> {
    /// Initialize the scene and start the frame loop and blink timer.
    ///
    /// Must be called inside a tokio runtime. A renderer that fails to
    /// initialize yields `SceneInit` and nothing is spawned.
    pub fn start(
        config: SessionConfig,
        source: S,
        renderer: Box<dyn RenderTarget>,
        backend: Arc<dyn SpeechBackend>,
    ) -> MimicResult<Self> {
        Self::start_with_clock(config, source, renderer, backend, Arc::new(MonotonicClock::new()))
    }

    pub fn start_with_clock(
        config: SessionConfig,
        source: S,
        mut renderer: Box<dyn RenderTarget>,
        backend: Arc<dyn SpeechBackend>,
        clock: Arc<dyn Clock>,
    ) -> MimicResult<Self> {
        config.validate()?;

        renderer.init(config.viewport).map_err(|e| match e {
            MimicError::SceneInit(_) => e,
            other => MimicError::SceneInit(other.to_string()),
        })?;

        let mut scene = Scene::new();
        let lights = add_default_lighting(&mut scene)?;
        let state = Arc::new(Mutex::new(FrameState {
            scene,
            camera: Camera::for_viewport(config.viewport),
            driver: AnimationDriver::new(config.driver.clone()),
            blink: BlinkScheduler::new(config.blink.clone()),
            handle: None,
            renderer,
            lights,
        }));

        let speech = SpeechController::new(config.activity.clone(), backend);
        let reader = speech.reader();

        let mut timers = TimerSet::new();
        timers.push(spawn_frame_loop(
            Arc::clone(&state),
            reader.clone(),
            Arc::clone(&clock),
            config.driver.frame_interval,
        ));
        timers.push(spawn_blink_timer(Arc::clone(&state), clock));

        tracing::info!(
            width = config.viewport.width,
            height = config.viewport.height,
            backend = speech.backend_name(),
            "avatar session started"
        );

        Ok(Self {
            loader: AssetLoader::new(source, config.loader.clone()),
            config,
            state,
            speech: Arc::new(Mutex::new(speech)),
            reader,
            timers,
            materials: None,
            last_candidates: Vec::new(),
            torn_down: false,
        })
    }

    /// Load the first working candidate and make it the current model
    pub async fn load_model(&mut self, candidates: &[Candidate]) -> MimicResult<AssetId> {
        self.load_model_with_progress(candidates, None).await
    }

    pub async fn load_model_with_progress(
        &mut self,
        candidates: &[Candidate],
        progress: Option<ProgressSink>,
    ) -> MimicResult<AssetId> {
        self.ensure_live()?;
        self.last_candidates = candidates.to_vec();

        let loaded = self.loader.load_with_progress(candidates, progress).await?;
        let materials = match &self.materials {
            Some(materials) => materials.clone(),
            None => {
                let materials =
                    load_materials(self.loader.source(), &self.config.textures, MaterialSet::default())
                        .await;
                self.materials = Some(materials.clone());
                materials
            }
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let handle = loaded.attach_with(&mut state.scene, &materials, &self.config.attach)?;
        let id = handle.id();
        let root = handle.root();
        let targets = handle.targets().to_vec();
        let blink_targets = handle.blink_targets().to_vec();

        if let Some(mut previous) = state.handle.replace(handle) {
            previous.release(&mut state.scene);
        }
        state.driver.attach(&mut state.scene, root, &targets)?;
        state.blink.set_targets(blink_targets);

        tracing::info!(asset = %id, targets = targets.len(), "model ready");
        Ok(id)
    }

    /// Re-run the most recent candidate list
    pub async fn retry_load(&mut self) -> MimicResult<AssetId> {
        let candidates = self.last_candidates.clone();
        self.load_model(&candidates).await
    }

    /// Speak `text`; `false` when the backend cannot speak
    pub fn speak(&self, text: &str) -> bool {
        if self.torn_down {
            return false;
        }
        self.speech.lock().speak(text)
    }

    /// Follow a surface resize. Animation is unaffected.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.torn_down {
            return;
        }
        let viewport = Viewport::new(width, height);
        self.config.viewport = viewport;
        let mut state = self.state.lock();
        state.camera.set_viewport(viewport);
        state.renderer.resize(viewport);
        tracing::debug!(width, height, "viewport resized");
    }

    /// UI handle for this session
    pub fn facade(&self) -> AvatarFacade {
        AvatarFacade::new(Arc::clone(&self.speech), self.reader.clone())
    }

    pub fn loader(&self) -> &AssetLoader<S> {
        &self.loader
    }
}

impl<S> AvatarSession<S> {
    pub fn status(&self) -> SessionStatus {
        let activity = self.reader.snapshot();
        let state = self.state.lock();
        let handle = state.handle.as_ref();
        SessionStatus {
            driver: state.driver.state(),
            asset: handle.map(|h| h.id()),
            model_path: handle.map(|h| h.candidate().path.clone()),
            targets: handle.map_or(0, |h| h.targets().len()),
            blink_targets: handle.map_or(0, |h| h.blink_targets().len()),
            speaking: activity.active,
            mouth_openness: activity.value,
            blinking: state.blink.state().is_blinking,
            viewport: self.config.viewport,
            stats: state.driver.stats().clone(),
            torn_down: self.torn_down,
        }
    }

    /// Run `f` against the current scene
    pub fn with_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> R {
        f(&self.state.lock().scene)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stop every loop, then release the model and lights. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        // Loops first, so no callback touches what is released below
        self.timers.cancel_all();
        self.speech.lock().shutdown();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.blink.reset(&mut state.scene);
        state.blink.set_targets(Vec::new());
        if let Some(mut handle) = state.handle.take() {
            handle.release(&mut state.scene);
        }
        state.driver.teardown(&mut state.scene);
        for light in state.lights.drain(..) {
            let _ = state.scene.detach(light);
        }
        tracing::info!(remaining = state.scene.len(), "avatar session torn down");
    }

    fn ensure_live(&self) -> MimicResult<()> {
        if self.torn_down {
            Err(MimicError::SessionTornDown)
        } else {
            Ok(())
        }
    }
}

impl<S> Drop for AvatarSession<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<S> std::fmt::Debug for AvatarSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarSession")
            .field("viewport", &self.config.viewport)
            .field("timers", &self.timers.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

fn spawn_frame_loop(
    state: Arc<Mutex<FrameState>>,
    reader: ActivityReader,
    clock: Arc<dyn Clock>,
    period: Duration,
) -> TimerHandle {
    TimerHandle::interval("frame", period, move || {
        let activity = reader.snapshot();
        let now = clock.now();
        state.lock().frame(now, activity);
        true
    })
}

fn spawn_blink_timer(state: Arc<Mutex<FrameState>>, clock: Arc<dyn Clock>) -> TimerHandle {
    TimerHandle::spawn("blink", async move {
        loop {
            let wait = state.lock().blink(clock.now());
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    })
}
