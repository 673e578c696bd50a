use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use skin_analysis::{AnalysisApi, AnalysisError, Category};
use skin_capture::{
    wait_until_ready, CameraDevice, CameraSession, CameraStatus, CaptureError, CaptureSummary,
    CapturedImage, FilePicker, ImageSource,
};
use skin_flow::{
    load_estimate, submit_identity, Action, IntakeWizard, KeyValueStore, NavigationError,
    Navigator, Scene, SceneFrame, Screen, SummaryError, SummaryScreen, SummarySnapshot,
    Transition, WizardError, WizardView, CAMERA_SETUP_DELAY, CAPTURED_IMAGE_KEY,
};

/// Preview pacing for the live camera
pub const PREVIEW_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Intake(#[from] WizardError),
    #[error("Finish the intake first")]
    IntakeIncomplete,
    #[error("Intake submission failed: {0}")]
    Submission(#[from] AnalysisError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("No photo to use")]
    NoPhoto,
    #[error("{0:?} is not showing")]
    WrongScreen(Screen),
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error("Demographics are not loaded")]
    SummaryNotReady,
    #[error("Failed to save photo: {0}")]
    Store(#[from] anyhow::Error),
}

impl SessionError {
    /// Text for the blocking camera notice, when the error calls for one
    pub fn camera_notice(&self) -> Option<String> {
        match self {
            SessionError::Capture(e) if e.is_capability_denial() => Some(e.to_string()),
            _ => None,
        }
    }
}

/// What the demographics screen renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryState {
    pub loading: bool,
    pub error: Option<String>,
    pub view: Option<SummarySnapshot>,
    pub side_labels: Vec<(Category, String)>,
}

impl From<&SummaryScreen> for SummaryState {
    fn from(screen: &SummaryScreen) -> Self {
        let side_labels = Category::ALL
            .iter()
            .map(|&c| (c, screen.side_label(c)))
            .collect();
        match screen {
            SummaryScreen::Loading => Self {
                loading: true,
                error: None,
                view: None,
                side_labels,
            },
            SummaryScreen::Ready(view) => Self {
                loading: false,
                error: None,
                view: Some(view.snapshot()),
                side_labels,
            },
            SummaryScreen::Failed(message) => Self {
                loading: false,
                error: Some(message.clone()),
                view: None,
                side_labels,
            },
        }
    }
}

/// All per-window state behind the commands: where the user is, what they
/// typed, the camera and the chosen photo.
pub struct Session {
    api: Arc<dyn AnalysisApi>,
    store: Arc<dyn KeyValueStore>,
    camera_device: Option<Arc<dyn CameraDevice>>,
    frame_interval: Duration,

    navigator: Mutex<Navigator>,
    /// Bumped on every screen change; stale async work checks it
    visit: AtomicU64,
    entered_at: Mutex<Instant>,
    wizard: Mutex<IntakeWizard>,
    camera: Mutex<Option<CameraSession>>,
    photo: Mutex<Option<CapturedImage>>,
    summary: Mutex<SummaryScreen>,

    screen_tx: watch::Sender<Screen>,
    intake_tx: watch::Sender<WizardView>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        store: Arc<dyn KeyValueStore>,
        camera_device: Option<Arc<dyn CameraDevice>>,
    ) -> Self {
        let wizard = IntakeWizard::new();
        let (screen_tx, _) = watch::channel(Screen::Landing);
        let (intake_tx, _) = watch::channel(wizard.view());

        Self {
            api,
            store,
            camera_device,
            frame_interval: PREVIEW_INTERVAL,
            navigator: Mutex::new(Navigator::new()),
            visit: AtomicU64::new(0),
            entered_at: Mutex::new(Instant::now()),
            wizard: Mutex::new(wizard),
            camera: Mutex::new(None),
            photo: Mutex::new(None),
            summary: Mutex::new(SummaryScreen::Loading),
            screen_tx,
            intake_tx,
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn subscribe_screen(&self) -> watch::Receiver<Screen> {
        self.screen_tx.subscribe()
    }

    pub fn subscribe_intake(&self) -> watch::Receiver<WizardView> {
        self.intake_tx.subscribe()
    }

    // ---- navigation ----

    pub fn current_screen(&self) -> Screen {
        lock(&self.navigator).current()
    }

    pub fn navigate(&self, action: Action) -> Result<Screen, SessionError> {
        match action {
            Action::Proceed if !lock(&self.wizard).can_proceed() => {
                return Err(SessionError::IntakeIncomplete)
            }
            Action::UsePhoto | Action::OpenGallery => return self.use_photo(action),
            _ => {}
        }
        self.transition(|nav| nav.apply(action))
    }

    /// History back, as after a camera denial
    pub fn go_back(&self) -> Screen {
        // back() never fails
        self.transition(|nav| Ok::<_, SessionError>(nav.back()))
            .unwrap_or(Screen::Landing)
    }

    fn transition<E>(
        &self,
        step: impl FnOnce(&mut Navigator) -> Result<Screen, E>,
    ) -> Result<Screen, SessionError>
    where
        SessionError: From<E>,
    {
        let (from, to) = {
            let mut nav = lock(&self.navigator);
            let from = nav.current();
            let to = step(&mut nav)?;
            (from, to)
        };

        self.visit.fetch_add(1, Ordering::SeqCst);
        *lock(&self.entered_at) = Instant::now();

        if from.uses_camera() && !to.uses_camera() {
            self.stop_camera();
        }
        if to.uses_camera() && !from.uses_camera() {
            // A photo picked earlier must not stand in for a capture
            *lock(&self.photo) = None;
        }
        if to == Screen::Intake && from != Screen::Intake {
            let mut wizard = lock(&self.wizard);
            wizard.reset();
            self.intake_tx.send_replace(wizard.view());
        }
        if to == Screen::Summary {
            *lock(&self.summary) = SummaryScreen::Loading;
        }

        info!("Screen {:?} -> {:?}", from, to);
        self.screen_tx.send_replace(to);
        Ok(to)
    }

    /// Sleep through the camera setup screen, then move to capture if the
    /// user is still on it.
    pub async fn finish_camera_setup(&self) -> Option<Screen> {
        let visit = self.visit.load(Ordering::SeqCst);
        tokio::time::sleep(CAMERA_SETUP_DELAY).await;

        if self.visit.load(Ordering::SeqCst) != visit
            || self.current_screen() != Screen::CameraSetup
        {
            debug!("Camera setup left early; not advancing");
            return None;
        }
        self.navigate(Action::CameraReady).ok()
    }

    pub fn ornament_frame(&self) -> SceneFrame {
        let elapsed = lock(&self.entered_at).elapsed();
        Scene::for_screen(self.current_screen()).sample(elapsed)
    }

    // ---- intake ----

    pub fn intake_state(&self) -> WizardView {
        lock(&self.wizard).view()
    }

    pub fn intake_input(&self, value: &str) -> WizardView {
        let mut wizard = lock(&self.wizard);
        wizard.set_input(value);
        let view = wizard.view();
        self.intake_tx.send_replace(view.clone());
        view
    }

    pub fn take_focus_request(&self) -> bool {
        lock(&self.wizard).take_focus_request()
    }

    /// Enter on the intake field. On the city step this waits for the
    /// submission, at least `MIN_SUBMIT_DURATION`.
    pub async fn intake_confirm(&self) -> Result<WizardView, SessionError> {
        let visit = self.visit.load(Ordering::SeqCst);
        let transition = {
            let mut wizard = lock(&self.wizard);
            let transition = wizard.confirm()?;
            self.intake_tx.send_replace(wizard.view());
            transition
        };

        let Transition::Submit(identity) = transition else {
            return Ok(self.intake_state());
        };

        let result = submit_identity(self.api.as_ref(), &identity).await;

        // Leaving intake resets the wizard, so this answer belongs to an
        // abandoned submission
        if self.visit.load(Ordering::SeqCst) != visit {
            debug!("Intake left while submitting; dropping response");
            return result
                .map(|_| self.intake_state())
                .map_err(SessionError::Submission);
        }

        let mut wizard = lock(&self.wizard);
        let outcome = match result {
            Ok(ack) => {
                debug!("Phase one acknowledged with HTTP {}", ack.status);
                if wizard.submission_succeeded().is_err() {
                    debug!("Intake was reset while submitting");
                }
                Ok(wizard.view())
            }
            Err(e) => {
                if wizard.submission_failed(&e.to_string()).is_err() {
                    debug!("Intake was reset while submitting");
                }
                Err(SessionError::Submission(e))
            }
        };
        self.intake_tx.send_replace(wizard.view());
        outcome
    }

    // ---- capture ----

    /// Open the camera for the capture screen and wait for the preview.
    /// A denial releases everything and goes back one screen.
    pub async fn start_camera(&self) -> Result<CameraStatus, SessionError> {
        let current = self.current_screen();
        if current != Screen::CameraCapture {
            return Err(SessionError::WrongScreen(Screen::CameraCapture));
        }

        let opened = self.camera_receiver_or_open();
        if self.current_screen() != Screen::CameraCapture {
            debug!("Capture screen left while opening the camera");
            self.stop_camera();
            return Err(SessionError::WrongScreen(Screen::CameraCapture));
        }

        let ready = match opened {
            Ok(status_rx) => wait_until_ready(status_rx).await,
            Err(e) => Err(e),
        };

        match ready {
            Ok(()) => self.camera_status().ok_or(SessionError::Capture(CaptureError::Released)),
            Err(e) if e.is_capability_denial() => {
                warn!("Camera unavailable: {}", e);
                self.stop_camera();
                if self.current_screen() == Screen::CameraCapture {
                    self.go_back();
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn camera_receiver_or_open(&self) -> Result<watch::Receiver<CameraStatus>, CaptureError> {
        let mut slot = lock(&self.camera);
        if let Some(session) = slot.as_ref().filter(|s| !s.is_released()) {
            return Ok(session.status_receiver());
        }
        let device = self
            .camera_device
            .clone()
            .ok_or_else(|| CaptureError::Unsupported("no camera device available".into()))?;

        info!("Opening camera {}", device.name());
        let session = CameraSession::open(device, self.frame_interval);
        let status_rx = session.status_receiver();
        *slot = Some(session);
        Ok(status_rx)
    }

    pub fn camera_status(&self) -> Option<CameraStatus> {
        lock(&self.camera).as_ref().map(|s| s.status())
    }

    pub fn camera_status_receiver(&self) -> Option<watch::Receiver<CameraStatus>> {
        lock(&self.camera).as_ref().map(|s| s.status_receiver())
    }

    pub fn capture_photo(&self) -> Result<CaptureSummary, SessionError> {
        let image = {
            let mut slot = lock(&self.camera);
            let session = slot.as_mut().ok_or(CaptureError::NotReady)?;
            session.capture()?
        };
        let summary = CaptureSummary::from(&image);
        *lock(&self.photo) = Some(image);
        Ok(summary)
    }

    pub fn retake_photo(&self) -> Result<(), SessionError> {
        if let Some(session) = lock(&self.camera).as_mut() {
            session.retake()?;
        }
        *lock(&self.photo) = None;
        Ok(())
    }

    pub fn stop_camera(&self) {
        let taken = lock(&self.camera).take();
        if let Some(mut session) = taken {
            session.close();
        }
    }

    /// Load a photo from disk and go straight to the analysis menu
    pub fn pick_photo(&self, path: &str) -> Result<CaptureSummary, SessionError> {
        let image = ImageSource::FilePicker(FilePicker::new(path)).capture()?;
        let summary = CaptureSummary::from(&image);
        *lock(&self.photo) = Some(image);
        self.use_photo(Action::OpenGallery)?;
        Ok(summary)
    }

    /// Persist the current photo for the analysis screens and move on
    fn use_photo(&self, action: Action) -> Result<Screen, SessionError> {
        let current = self.current_screen();
        if !lock(&self.navigator).can(action) {
            return Err(NavigationError::NoRoute {
                screen: current,
                action,
            }
            .into());
        }

        let data_url = lock(&self.photo)
            .as_ref()
            .map(|p| p.data_url())
            .ok_or(SessionError::NoPhoto)?;
        self.store.set(CAPTURED_IMAGE_KEY, &data_url)?;
        debug!("Stored photo ({} chars)", data_url.len());

        self.transition(|nav| nav.apply(action))
    }

    // ---- summary ----

    /// Fetch (or reuse) the estimate for the demographics screen
    pub async fn load_summary(&self) -> Result<SummaryState, SessionError> {
        let visit = self.visit.load(Ordering::SeqCst);
        *lock(&self.summary) = SummaryScreen::Loading;

        let result = load_estimate(self.store.as_ref(), self.api.as_ref()).await;

        if self.visit.load(Ordering::SeqCst) != visit {
            debug!("Summary left while loading; dropping result");
            return result.map(|_| self.summary_state()).map_err(Into::into);
        }

        let mut summary = lock(&self.summary);
        match result {
            Ok(estimate) => {
                *summary = SummaryScreen::Ready(skin_flow::SummaryView::new(estimate));
                Ok(SummaryState::from(&*summary))
            }
            Err(e) => {
                *summary = SummaryScreen::Failed(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn summary_state(&self) -> SummaryState {
        SummaryState::from(&*lock(&self.summary))
    }

    pub fn select_category(&self, category: Category) -> Result<SummaryState, SessionError> {
        let mut summary = lock(&self.summary);
        let view = summary.view_mut().ok_or(SessionError::SummaryNotReady)?;
        view.set_active(category);
        Ok(SummaryState::from(&*summary))
    }

    pub fn select_row(&self, category: Category, key: &str) -> Result<SummaryState, SessionError> {
        let mut summary = lock(&self.summary);
        let view = summary.view_mut().ok_or(SessionError::SummaryNotReady)?;
        view.select(category, key)?;
        Ok(SummaryState::from(&*summary))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_camera();
    }
}
