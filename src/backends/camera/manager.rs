// SPDX-License-Identifier: GPL-3.0-only

//! Capture session lifecycle
//!
//! The manager provides:
//! - Device selection and resolution negotiation
//! - The background capture loop that drains the acquisition queue
//! - Start, stop and device switching, safe to call from any thread

use super::frame_loop::{LoopAction, LoopController};
use super::queue::{Acquired, FrameQueue};
use super::types::*;
use super::{CaptureBackend, CaptureSession};
use crate::constants::{
    ACQUISITION_QUEUE_DEPTH, CAPTURE_POLL_INTERVAL, DEFAULT_PREFERRED_RESOLUTION,
    DEFAULT_STOP_TIMEOUT,
};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipelines::processor::FramePipeline;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session parameters fixed at manager creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Target for resolution negotiation
    pub preferred: Resolution,
    /// Raw frames buffered between the device and the capture loop
    pub queue_depth: usize,
    /// Upper bound on waiting for the capture loop during `stop()`
    pub stop_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preferred: DEFAULT_PREFERRED_RESOLUTION,
            queue_depth: ACQUISITION_QUEUE_DEPTH,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceChoice {
    /// Reuse the selected device, or pick the default one
    Keep,
    /// Move on to the device after the selected one
    Next,
}

#[derive(Default)]
struct ManagerState {
    /// Survives `stop()`
    selected: Option<CaptureDevice>,
    session: Option<Box<dyn CaptureSession>>,
    worker: Option<LoopController>,
    queue: Option<Arc<FrameQueue>>,
}

/// Owns the capture device and the background capture context
pub struct CaptureSessionManager {
    backend: Box<dyn CaptureBackend>,
    pipeline: Arc<FramePipeline>,
    config: SessionConfig,
    state: Mutex<ManagerState>,
}

impl CaptureSessionManager {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        pipeline: Arc<FramePipeline>,
        config: SessionConfig,
    ) -> Self {
        info!(backend = %backend.backend_type(), preferred = %config.preferred, "Creating capture session manager");
        Self {
            backend,
            pipeline,
            config,
            state: Mutex::new(ManagerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend_type(&self) -> CaptureBackendType {
        self.backend.backend_type()
    }

    pub fn enumerate_devices(&self) -> Vec<CaptureDevice> {
        self.backend.enumerate_devices()
    }

    /// Open the selected (or default) device and start streaming.
    ///
    /// Does nothing while a session is running. On error the manager is left
    /// fully stopped.
    ///
    /// # Errors
    /// * `DeviceUnavailable` - no device to open
    /// * `ConfigurationUnavailable` - the device offers no usable resolution
    /// * `SurfaceUnavailable` - `preview` is not ready
    pub fn start(&self, preview: &Arc<PreviewSurface>) -> PipelineResult<()> {
        let mut state = self.state();
        if state.session.is_some() {
            debug!("Capture session already running");
            return Ok(());
        }

        self.open_locked(&mut state, preview, DeviceChoice::Keep)
            .inspect_err(|e| {
                warn!(error = %e, "Failed to start capture session");
                self.stop_locked(&mut state);
            })
    }

    /// Close the session, then wind down the capture loop. Repeatable.
    pub fn stop(&self) {
        let mut state = self.state();
        self.stop_locked(&mut state);
    }

    /// Reopen on the next device, keeping the capture loop alive.
    ///
    /// # Errors
    /// Same as [`start`](Self::start); the manager is fully stopped afterwards.
    pub fn switch_device(&self, preview: &Arc<PreviewSurface>) -> PipelineResult<()> {
        let mut state = self.state();
        if let Some(mut session) = state.session.take() {
            info!(from = %session.device().name, "Switching capture device");
            session.close();
        }

        self.open_locked(&mut state, preview, DeviceChoice::Next)
            .inspect_err(|e| {
                warn!(error = %e, "Failed to switch capture device");
                self.stop_locked(&mut state);
            })
    }

    pub fn is_running(&self) -> bool {
        self.state().session.is_some()
    }

    /// The selected device, also after `stop()`
    pub fn current_device(&self) -> Option<CaptureDevice> {
        self.state().selected.clone()
    }

    pub fn current_resolution(&self) -> Option<Resolution> {
        self.state().session.as_ref().map(|s| s.resolution())
    }

    fn open_locked(
        &self,
        state: &mut ManagerState,
        preview: &Arc<PreviewSurface>,
        choice: DeviceChoice,
    ) -> PipelineResult<()> {
        let queue = self.ensure_worker(state);

        let devices = self.backend.enumerate_devices();
        let device = match choice {
            DeviceChoice::Keep => state
                .selected
                .as_ref()
                .and_then(|selected| devices.iter().find(|d| d.id == selected.id))
                .or_else(|| default_device(&devices)),
            DeviceChoice::Next => next_device(&devices, state.selected.as_ref()),
        }
        .cloned()
        .ok_or_else(|| PipelineError::DeviceUnavailable("no capture device found".to_string()))?;
        state.selected = Some(device.clone());

        let resolutions = self.backend.supported_resolutions(&device)?;
        let resolution =
            select_resolution(&resolutions, self.config.preferred).ok_or_else(|| {
                PipelineError::ConfigurationUnavailable(format!(
                    "{} reports no output resolutions",
                    device.name
                ))
            })?;

        if !preview.is_ready() {
            return Err(PipelineError::SurfaceUnavailable);
        }

        queue.clear();
        self.pipeline.prepare(resolution);

        let targets = CaptureTargets {
            preview: Arc::clone(preview),
            acquisition: queue,
        };
        let session = self.backend.open(&device, resolution, targets)?;

        info!(
            device = %device.name,
            facing = %device.facing,
            %resolution,
            "Capture session started"
        );
        state.session = Some(session);
        Ok(())
    }

    /// Start the capture loop unless it is already running
    fn ensure_worker(&self, state: &mut ManagerState) -> Arc<FrameQueue> {
        if let (Some(queue), Some(_)) = (&state.queue, &state.worker) {
            return Arc::clone(queue);
        }

        let queue = Arc::new(FrameQueue::new(self.config.queue_depth));
        let loop_queue = Arc::clone(&queue);
        let pipeline = Arc::clone(&self.pipeline);

        let worker = LoopController::start("capture-loop", move || {
            match loop_queue.acquire_latest(CAPTURE_POLL_INTERVAL) {
                Acquired::Frame(frame) => {
                    pipeline.process(&frame);
                    LoopAction::Continue
                }
                Acquired::Timeout => LoopAction::Continue,
                Acquired::Closed => LoopAction::Stop,
            }
        });

        state.queue = Some(Arc::clone(&queue));
        state.worker = Some(worker);
        queue
    }

    fn stop_locked(&self, state: &mut ManagerState) {
        if let Some(mut session) = state.session.take() {
            session.close();
            info!(device = %session.device().name, "Capture session closed");
        }
        if let Some(queue) = state.queue.take() {
            queue.close();
        }
        if let Some(mut worker) = state.worker.take() {
            if worker.stop_with_timeout(self.config.stop_timeout) {
                debug!("Capture loop stopped");
            }
        }
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("CaptureSessionManager")
            .field("backend_type", &self.backend.backend_type())
            .field("running", &state.session.is_some())
            .field("selected", &state.selected.as_ref().map(|d| &d.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticBackend;
    use crate::pipelines::exchange::FrameExchange;
    use crate::pipelines::transform::TransformKind;
    use std::time::Instant;

    fn manager_with(backend: SyntheticBackend, preferred: Resolution) -> CaptureSessionManager {
        let pipeline = Arc::new(FramePipeline::new(
            Arc::new(FrameExchange::new()),
            Some(TransformKind::Gray.create()),
        ));
        let config = SessionConfig {
            preferred,
            ..Default::default()
        };
        CaptureSessionManager::new(Box::new(backend), pipeline, config)
    }

    fn manager() -> CaptureSessionManager {
        manager_with(SyntheticBackend::new(120), DEFAULT_PREFERRED_RESOLUTION)
    }

    fn wait_for_publication(manager: &CaptureSessionManager) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if manager.pipeline().stats().published > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_start_prefers_back_device() {
        let manager = manager();
        manager.start(&PreviewSurface::ready()).unwrap();

        assert!(manager.is_running());
        assert_eq!(manager.current_device().unwrap().facing, Facing::Back);
        assert_eq!(manager.current_resolution(), Some(Resolution::new(640, 480)));
        assert!(wait_for_publication(&manager));

        let latest = manager.pipeline().exchange().latest().unwrap();
        assert_eq!(latest.frame.resolution(), Resolution::new(640, 480));
        manager.stop();
    }

    #[test]
    fn test_start_is_idempotent() {
        let manager = manager();
        let preview = PreviewSurface::ready();
        manager.start(&preview).unwrap();
        let epoch = manager.pipeline().epoch();

        manager.start(&preview).unwrap();
        assert_eq!(manager.pipeline().epoch(), epoch);
        assert!(manager.is_running());
    }

    #[test]
    fn test_stop_is_repeatable_and_keeps_selection() {
        let manager = manager();
        manager.stop();

        let preview = PreviewSurface::ready();
        manager.start(&preview).unwrap();
        manager.switch_device(&preview).unwrap();
        manager.stop();
        manager.stop();

        assert!(!manager.is_running());
        assert_eq!(manager.current_resolution(), None);
        assert_eq!(manager.current_device().unwrap().facing, Facing::Front);

        // Restart stays on the device selected before stop
        manager.start(&preview).unwrap();
        assert_eq!(manager.current_device().unwrap().facing, Facing::Front);
    }

    #[test]
    fn test_surface_not_ready() {
        let manager = manager();
        let preview = Arc::new(PreviewSurface::new());

        assert_eq!(
            manager.start(&preview),
            Err(PipelineError::SurfaceUnavailable)
        );
        assert!(!manager.is_running());

        preview.set_ready(true);
        manager.start(&preview).unwrap();
        assert!(manager.is_running());
    }

    #[test]
    fn test_no_devices() {
        let manager = manager_with(
            SyntheticBackend::with_devices(Vec::new(), 30),
            DEFAULT_PREFERRED_RESOLUTION,
        );
        assert!(matches!(
            manager.start(&PreviewSurface::ready()),
            Err(PipelineError::DeviceUnavailable(_))
        ));
        assert!(!manager.is_running());
    }

    #[test]
    fn test_device_without_resolutions() {
        let device = CaptureDevice {
            id: "empty".into(),
            name: "Empty".into(),
            facing: Facing::Back,
            resolutions: Vec::new(),
        };
        let manager = manager_with(
            SyntheticBackend::with_devices(vec![device], 30),
            DEFAULT_PREFERRED_RESOLUTION,
        );
        assert!(matches!(
            manager.start(&PreviewSurface::ready()),
            Err(PipelineError::ConfigurationUnavailable(_))
        ));
        assert!(!manager.is_running());
    }

    #[test]
    fn test_negotiates_nearest_resolution() {
        let manager = manager_with(SyntheticBackend::new(30), Resolution::new(1000, 700));
        manager.start(&PreviewSurface::ready()).unwrap();
        assert_eq!(
            manager.current_resolution(),
            Some(Resolution::new(1280, 720))
        );
    }

    #[test]
    fn test_switch_toggles_and_bumps_epoch() {
        let manager = manager();
        let preview = PreviewSurface::ready();
        manager.start(&preview).unwrap();
        let epoch = manager.pipeline().epoch();

        manager.switch_device(&preview).unwrap();
        assert!(manager.is_running());
        assert_eq!(manager.current_device().unwrap().facing, Facing::Front);
        assert!(manager.pipeline().epoch() > epoch);

        manager.switch_device(&preview).unwrap();
        assert_eq!(manager.current_device().unwrap().facing, Facing::Back);
        assert!(wait_for_publication(&manager));
    }

    #[test]
    fn test_failed_switch_stops_everything() {
        let manager = manager();
        let preview = PreviewSurface::ready();
        manager.start(&preview).unwrap();

        preview.set_ready(false);
        assert_eq!(
            manager.switch_device(&preview),
            Err(PipelineError::SurfaceUnavailable)
        );
        assert!(!manager.is_running());
        assert!(manager.state().worker.is_none());
    }
}
