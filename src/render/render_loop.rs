// SPDX-License-Identifier: GPL-3.0-only

//! Render-on-demand loop
//!
//! The loop thread owns the renderer and the display surface. It sleeps until
//! a render is requested (new publication, filter change, readback) and then
//! draws the latest published frame once.

use super::filter::{FilterMode, FilterSelector};
use super::preview::PreviewRenderer;
use super::surface::DisplaySurface;
use crate::backends::camera::frame_loop::{LoopAction, LoopController};
use crate::constants::{FRAME_LOG_INTERVAL, RENDER_IDLE_WAKE};
use crate::errors::PipelineResult;
use crate::media::buffers::Snapshot;
use crate::pipelines::exchange::FrameExchange;
use crate::pipelines::telemetry::FpsMeter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receives the instantaneous render rate after each new frame
pub type FpsCallback = Box<dyn Fn(f32) + Send>;

/// Receives a copy of each newly rendered frame
pub type FrameConsumer = Box<dyn Fn(&Snapshot) + Send>;

/// Pending render request, coalesced
#[derive(Debug, Default)]
pub struct RenderSignal {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl RenderSignal {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.requested.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn request(&self) {
        *self.lock() = true;
        self.wake.notify_one();
    }

    /// Wait for a request and consume it. `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut requested, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *requested)
    }
}

/// Cheap handle for asking the render loop to draw, e.g. from a publish listener
#[derive(Debug, Clone)]
pub struct RenderRequester(Arc<RenderSignal>);

impl RenderRequester {
    pub fn request(&self) {
        self.0.request();
    }
}

type ReadbackResult = PipelineResult<Option<Snapshot>>;

#[derive(Default)]
struct ReadbackState {
    requested: bool,
    result: Option<ReadbackResult>,
}

/// Rendezvous between a readback request and the render loop
#[derive(Default)]
struct ReadbackSlot {
    state: Mutex<ReadbackState>,
    done: Condvar,
}

impl ReadbackSlot {
    fn lock(&self) -> MutexGuard<'_, ReadbackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_request(&self) -> bool {
        std::mem::take(&mut self.lock().requested)
    }

    fn fulfill(&self, result: ReadbackResult) {
        self.lock().result = Some(result);
        self.done.notify_all();
    }
}

/// Optional host callbacks
#[derive(Default)]
pub struct RenderHooks {
    pub on_fps: Option<FpsCallback>,
    pub frame_consumer: Option<FrameConsumer>,
}

/// Running render loop
pub struct RenderHandle {
    controller: LoopController,
    signal: Arc<RenderSignal>,
    readback: Arc<ReadbackSlot>,
    filter: FilterSelector,
    exchange: Arc<FrameExchange>,
    rendered: Arc<AtomicU64>,
}

/// Start the render loop on its own thread.
///
/// `filter` is shared with the caller; changing it through the returned
/// handle triggers a redraw.
pub fn spawn(
    mut renderer: PreviewRenderer,
    mut surface: Box<dyn DisplaySurface>,
    exchange: Arc<FrameExchange>,
    filter: FilterSelector,
    hooks: RenderHooks,
) -> RenderHandle {
    let signal = Arc::new(RenderSignal::default());
    let readback = Arc::new(ReadbackSlot::default());
    let rendered = Arc::new(AtomicU64::new(0));

    let loop_signal = Arc::clone(&signal);
    let loop_readback = Arc::clone(&readback);
    let loop_exchange = Arc::clone(&exchange);
    let loop_filter = filter.clone();
    let loop_rendered = Arc::clone(&rendered);

    let (width, height) = surface.size();
    info!(width, height, "Starting render loop");

    let mut fps = FpsMeter::new();
    let mut last_drawn: Option<(u64, u64)> = None;

    let controller = LoopController::start("render-loop", move || {
        if !loop_signal.wait(RENDER_IDLE_WAKE) {
            return LoopAction::Continue;
        }

        let latest = loop_exchange.latest();
        let identity = latest.as_ref().map(|l| (l.frame.epoch, l.frame.sequence));
        let new_frame = identity.is_some() && identity != last_drawn;

        renderer.set_filter(loop_filter.get());
        if let Err(e) = renderer.render(surface.as_mut(), latest.as_ref()) {
            warn!(error = %e, "Preview draw failed");
        } else if let (true, Some(latest)) = (new_frame, latest.as_ref()) {
            last_drawn = identity;
            let count = loop_rendered.fetch_add(1, Ordering::Relaxed) + 1;
            if count % FRAME_LOG_INTERVAL == 0 {
                debug!(
                    count,
                    width = latest.frame.width,
                    height = latest.frame.height,
                    "Rendered frames"
                );
            }

            if let (Some(rate), Some(on_fps)) = (fps.tick(Instant::now()), hooks.on_fps.as_ref())
            {
                on_fps(rate);
            }
            if let Some(consumer) = hooks.frame_consumer.as_ref() {
                consumer(&Snapshot::from_frame(&latest.frame));
            }
        }

        if loop_readback.take_request() {
            loop_readback.fulfill(surface.read_pixels(renderer.gpu()));
        }
        LoopAction::Continue
    });

    RenderHandle {
        controller,
        signal,
        readback,
        filter,
        exchange,
        rendered,
    }
}

impl RenderHandle {
    /// Ask for one draw of the latest frame
    pub fn request_render(&self) {
        self.signal.request();
    }

    pub fn requester(&self) -> RenderRequester {
        RenderRequester(Arc::clone(&self.signal))
    }

    pub fn filter(&self) -> FilterMode {
        self.filter.get()
    }

    /// Cycle the display filter and redraw
    pub fn next_filter(&self) -> FilterMode {
        let mode = self.filter.cycle();
        info!(filter = %mode, "Display filter changed");
        self.signal.request();
        mode
    }

    /// Copy of the frame currently feeding the texture
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.exchange.snapshot()
    }

    /// Redraw and read back what is on the display surface.
    ///
    /// `Ok(None)` if the surface cannot be read back or the loop did not
    /// answer within `timeout`.
    pub fn read_display(&self, timeout: Duration) -> PipelineResult<Option<Snapshot>> {
        {
            let mut state = self.readback.lock();
            state.requested = true;
            state.result = None;
        }
        self.signal.request();

        let state = self.readback.lock();
        let (mut state, _) = self
            .readback
            .done
            .wait_timeout_while(state, timeout, |s| s.result.is_none())
            .unwrap_or_else(|e| e.into_inner());
        state.requested = false;
        state.result.take().unwrap_or(Ok(None))
    }

    /// New frames drawn so far
    pub fn frames_rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn stop(&mut self) {
        self.controller.request_stop();
        self.signal.request();
        self.controller.stop();
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_coalesces_requests() {
        let signal = RenderSignal::default();
        signal.request();
        signal.request();
        assert!(signal.wait(Duration::from_millis(10)));
        assert!(!signal.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let signal = Arc::new(RenderSignal::default());
        let requester = RenderRequester(Arc::clone(&signal));
        let waiter = thread::spawn(move || signal.wait(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        requester.request();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_readback_request_is_consumed_once() {
        let slot = ReadbackSlot::default();
        assert!(!slot.take_request());
        slot.lock().requested = true;
        assert!(slot.take_request());
        assert!(!slot.take_request());

        slot.fulfill(Ok(None));
        assert!(matches!(slot.lock().result, Some(Ok(None))));
    }
}
