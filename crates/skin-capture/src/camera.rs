use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{encode_jpeg, snapshot_frame, CaptureError, CapturedImage, PreviewHandle, SourceKind};

/// A granted camera stream. Reads block, so they run on the blocking pool.
pub trait MediaStream: Send {
    fn next_frame(&mut self) -> anyhow::Result<RgbaImage>;

    /// Stop every track and release the device lock. Must be idempotent.
    fn stop(&mut self);
}

/// A video input that can be asked for exclusive access
pub trait CameraDevice: Send + Sync {
    fn name(&self) -> String;

    /// Blocking. This is where the platform may prompt for permission.
    fn acquire(&self) -> Result<Box<dyn MediaStream>, CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraState {
    Requesting,
    Live,
    Frozen,
    Denied,
    Unsupported,
    Released,
}

/// Status of the live preview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub state: CameraState,
    pub device: Option<String>,
    pub fps: f64,
    pub last_frame_time: Option<u64>,
    pub resolution: Option<(u32, u32)>,
    pub message: Option<String>,
}

impl Default for CameraStatus {
    fn default() -> Self {
        Self {
            state: CameraState::Requesting,
            device: None,
            fps: 0.0,
            last_frame_time: None,
            resolution: None,
            message: None,
        }
    }
}

type StreamSlot = Arc<Mutex<Option<Box<dyn MediaStream>>>>;

/// Exclusive hold on one camera plus its live preview.
///
/// Closing (or dropping) the session raises a cancellation flag. Setup checks
/// the flag under the stream lock once acquisition resolves, so a grant that
/// arrives after the user left is stopped instead of attached.
pub struct CameraSession {
    cancelled: Arc<AtomicBool>,
    frozen: Arc<AtomicBool>,
    stream: StreamSlot,
    frame_rx: watch::Receiver<Option<Arc<RgbaImage>>>,
    status_tx: Arc<watch::Sender<CameraStatus>>,
    status_rx: watch::Receiver<CameraStatus>,
    still: Option<CapturedImage>,
}

impl CameraSession {
    /// Request the device and start the preview loop. Must be called inside
    /// a Tokio runtime.
    pub fn open(device: Arc<dyn CameraDevice>, frame_interval: Duration) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let frozen = Arc::new(AtomicBool::new(false));
        let stream: StreamSlot = Arc::new(Mutex::new(None));

        let (frame_tx, frame_rx) = watch::channel::<Option<Arc<RgbaImage>>>(None);
        let (status_tx, status_rx) = watch::channel(CameraStatus {
            device: Some(device.name()),
            ..CameraStatus::default()
        });
        let status_tx = Arc::new(status_tx);

        let setup = Setup {
            device,
            cancelled: cancelled.clone(),
            frozen: frozen.clone(),
            stream: stream.clone(),
            frame_tx,
            status_tx: status_tx.clone(),
            frame_interval,
        };
        tokio::spawn(setup.run());

        Self {
            cancelled,
            frozen,
            stream,
            frame_rx,
            status_tx,
            status_rx,
            still: None,
        }
    }

    pub fn status(&self) -> CameraStatus {
        self.status_rx.borrow().clone()
    }

    pub fn status_receiver(&self) -> watch::Receiver<CameraStatus> {
        self.status_rx.clone()
    }

    pub fn latest_frame(&self) -> Option<Arc<RgbaImage>> {
        self.frame_rx.borrow().clone()
    }

    pub fn still(&self) -> Option<&CapturedImage> {
        self.still.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the preview is live, or report why it never will be
    pub async fn wait_ready(&self) -> Result<(), CaptureError> {
        wait_until_ready(self.status_rx.clone()).await
    }

    /// Snapshot the current frame and freeze the preview
    pub fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        if self.is_released() {
            return Err(CaptureError::Released);
        }
        if self.status().state != CameraState::Live {
            return Err(CaptureError::NotReady);
        }
        let frame = self.latest_frame().ok_or(CaptureError::NotReady)?;

        self.frozen.store(true, Ordering::SeqCst);
        let still = Arc::new(snapshot_frame(&frame));
        let bytes = encode_jpeg(&still)?;

        let image = CapturedImage {
            source: SourceKind::LiveCamera,
            mime: "image/jpeg".to_string(),
            width: still.width(),
            height: still.height(),
            bytes: Arc::new(bytes),
            preview: PreviewHandle::Frame(still),
        };
        info!("Captured still {}x{}", image.width, image.height);

        self.status_tx.send_modify(|s| s.state = CameraState::Frozen);
        self.still = Some(image.clone());
        Ok(image)
    }

    /// Drop the still and resume the live preview on the same stream
    pub fn retake(&mut self) -> Result<(), CaptureError> {
        if self.is_released() {
            return Err(CaptureError::Released);
        }
        self.still = None;
        if self.frozen.swap(false, Ordering::SeqCst) {
            self.status_tx.send_modify(|s| s.state = CameraState::Live);
            debug!("Preview resumed");
        }
        Ok(())
    }

    /// Release the camera. Safe to call while setup is still in flight.
    pub fn close(&mut self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        release_stream(&self.stream);
        self.status_tx.send_modify(|s| s.state = CameraState::Released);
        info!("Camera session closed");
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve once a session's status leaves `Requesting`. Works on a cloned
/// receiver so the session itself can be closed while someone waits.
pub async fn wait_until_ready(mut status_rx: watch::Receiver<CameraStatus>) -> Result<(), CaptureError> {
    loop {
        let status = status_rx.borrow_and_update().clone();
        match status.state {
            CameraState::Live | CameraState::Frozen => return Ok(()),
            CameraState::Denied => {
                return Err(CaptureError::PermissionDenied(
                    status.message.unwrap_or_default(),
                ))
            }
            CameraState::Unsupported => {
                return Err(CaptureError::Unsupported(status.message.unwrap_or_default()))
            }
            CameraState::Released => return Err(CaptureError::Released),
            CameraState::Requesting => {}
        }
        if status_rx.changed().await.is_err() {
            return Err(CaptureError::Released);
        }
    }
}

fn release_stream(slot: &StreamSlot) {
    let taken = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(mut stream) = taken {
        stream.stop();
        debug!("Media stream stopped");
    }
}

struct Setup {
    device: Arc<dyn CameraDevice>,
    cancelled: Arc<AtomicBool>,
    frozen: Arc<AtomicBool>,
    stream: StreamSlot,
    frame_tx: watch::Sender<Option<Arc<RgbaImage>>>,
    status_tx: Arc<watch::Sender<CameraStatus>>,
    frame_interval: Duration,
}

impl Setup {
    async fn run(self) {
        let device = self.device.clone();
        let device_name = device.name();
        let acquired = tokio::task::spawn_blocking(move || device.acquire()).await;

        let granted = match acquired {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Error starting camera: {}", e);
                let state = match e {
                    CaptureError::Unsupported(_) => CameraState::Unsupported,
                    _ => CameraState::Denied,
                };
                let cancelled = self.cancelled.clone();
                self.status_tx.send_if_modified(|s| {
                    if cancelled.load(Ordering::SeqCst) {
                        return false;
                    }
                    *s = CameraStatus {
                        state,
                        device: Some(device_name.clone()),
                        message: Some(e.to_string()),
                        ..CameraStatus::default()
                    };
                    true
                });
                return;
            }
            Err(e) => {
                warn!("Camera setup task panicked: {}", e);
                return;
            }
        };

        if !self.attach(granted) {
            info!("Camera granted after session closed; stream released");
            return;
        }

        // close() may have run since attach; never overwrite its Released
        let cancelled = self.cancelled.clone();
        let went_live = self.status_tx.send_if_modified(|s| {
            if cancelled.load(Ordering::SeqCst) {
                return false;
            }
            *s = CameraStatus {
                state: CameraState::Live,
                device: Some(device_name.clone()),
                ..CameraStatus::default()
            };
            true
        });
        if !went_live {
            return;
        }
        info!("Camera preview live");

        self.preview_loop().await;
    }

    /// Store the granted stream unless the session was closed meanwhile,
    /// in which case the stream is stopped right here.
    fn attach(&self, mut granted: Box<dyn MediaStream>) -> bool {
        let mut slot = match self.stream.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.cancelled.load(Ordering::SeqCst) {
            granted.stop();
            return false;
        }
        *slot = Some(granted);
        true
    }

    async fn preview_loop(&self) {
        let mut frame_count = 0u64;
        let mut fps_timer = Instant::now();

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            let tick_start = Instant::now();

            if !self.frozen.load(Ordering::SeqCst) {
                let slot = self.stream.clone();
                let read = tokio::task::spawn_blocking(move || {
                    let mut guard = match slot.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    guard.as_mut().map(|s| s.next_frame())
                })
                .await;

                match read {
                    Ok(Some(Ok(frame))) => {
                        // A frame read across a capture belongs to the old preview
                        if self.frozen.load(Ordering::SeqCst)
                            || self.cancelled.load(Ordering::SeqCst)
                        {
                            continue;
                        }
                        frame_count += 1;
                        let elapsed = fps_timer.elapsed().as_secs_f64();
                        let fps = if elapsed > 0.0 {
                            frame_count as f64 / elapsed
                        } else {
                            0.0
                        };
                        if elapsed > 5.0 {
                            frame_count = 0;
                            fps_timer = Instant::now();
                        }

                        let now = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;
                        let resolution = (frame.width(), frame.height());

                        self.status_tx.send_modify(|s| {
                            s.fps = fps;
                            s.last_frame_time = Some(now);
                            s.resolution = Some(resolution);
                        });
                        let _ = self.frame_tx.send(Some(Arc::new(frame)));
                    }
                    Ok(Some(Err(e))) => warn!("Camera frame read failed: {}", e),
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Camera read task panicked: {}", e);
                        break;
                    }
                }
            }

            let elapsed = tick_start.elapsed();
            if elapsed < self.frame_interval {
                tokio::time::sleep(self.frame_interval - elapsed).await;
            }
        }

        debug!("Preview loop stopped");
    }
}
