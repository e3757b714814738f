// SPDX-License-Identifier: MPL-2.0

//! End-to-end tests: synthetic capture through the manager, transform and exchange

use edge_viewer::backends::camera::ChromaLayout;
use edge_viewer::render::{RenderState, TextureUpload};
use edge_viewer::{
    CaptureDevice, CaptureSessionManager, Facing, FrameExchange, FramePipeline, PreviewSurface,
    Resolution, SessionConfig, SyntheticBackend, TransformKind,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn device(id: &str, facing: Facing, resolutions: Vec<Resolution>) -> CaptureDevice {
    CaptureDevice {
        id: id.to_string(),
        name: id.to_string(),
        facing,
        resolutions,
    }
}

fn setup(
    backend: SyntheticBackend,
    transform: TransformKind,
) -> (Arc<FrameExchange>, CaptureSessionManager) {
    let exchange = Arc::new(FrameExchange::new());
    let pipeline = Arc::new(FramePipeline::new(
        Arc::clone(&exchange),
        Some(transform.create()),
    ));
    let manager = CaptureSessionManager::new(Box::new(backend), pipeline, SessionConfig::default());
    (exchange, manager)
}

#[test]
fn test_snapshot_follows_published_frames() {
    let (exchange, manager) = setup(SyntheticBackend::new(120), TransformKind::Color);
    assert!(exchange.snapshot().is_none());

    manager.start(&PreviewSurface::ready()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || exchange
        .snapshot()
        .is_some()));

    let snapshot = exchange.snapshot().unwrap();
    assert_eq!((snapshot.width, snapshot.height), (640, 480));
    assert_eq!(snapshot.rgba.len(), 640 * 480 * 4);
    assert!(snapshot.rgba.chunks_exact(4).all(|px| px[3] == 255));

    // Later publications don't reach into an earlier copy
    let copy = snapshot.rgba.clone();
    let published = manager.pipeline().stats().published;
    assert!(wait_until(Duration::from_secs(5), || manager
        .pipeline()
        .stats()
        .published
        > published + 2));
    assert_eq!(snapshot.rgba, copy);

    manager.stop();
}

#[test]
fn test_edges_from_planar_capture() {
    let backend = SyntheticBackend::new(60).with_layout(ChromaLayout::Planar);
    let (exchange, manager) = setup(backend, TransformKind::Edges);
    manager.start(&PreviewSurface::ready()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || exchange
        .snapshot()
        .is_some()));
    let snapshot = exchange.snapshot().unwrap();
    manager.stop();

    // Edge maps are binary
    assert!(
        snapshot
            .rgba
            .chunks_exact(4)
            .all(|px| (px[0] == 0 || px[0] == 255) && px[0] == px[1] && px[1] == px[2])
    );
    // The test pattern has hard bands, so something is found
    assert!(snapshot.rgba.chunks_exact(4).any(|px| px[0] == 255));
}

#[test]
fn test_switch_causes_one_texture_allocation() {
    let backend = SyntheticBackend::with_devices(
        vec![
            device("back", Facing::Back, vec![Resolution::new(320, 240)]),
            device("front", Facing::Front, vec![Resolution::new(640, 480)]),
        ],
        120,
    );
    let (exchange, manager) = setup(backend, TransformKind::Gray);
    let preview = PreviewSurface::ready();
    let mut render = RenderState::new();

    let upload_latest = |render: &mut RenderState| {
        exchange.latest().map(|latest| {
            let frame = &latest.frame;
            let plan = render.plan_upload(
                frame.width,
                frame.height,
                frame.epoch,
                frame.sequence,
                latest.reinitialize,
            );
            (frame.resolution(), plan)
        })
    };

    manager.start(&preview).unwrap();
    assert!(wait_until(Duration::from_secs(5), || upload_latest(
        &mut render
    )
    .is_some()));
    assert_eq!(render.allocations(), 1);
    assert_eq!(render.dimensions(), Some((320, 240)));

    manager.switch_device(&preview).unwrap();
    assert_eq!(manager.current_resolution(), Some(Resolution::new(640, 480)));

    let mut plans = Vec::new();
    assert!(wait_until(Duration::from_secs(5), || {
        if let Some((res, plan)) = upload_latest(&mut render) {
            if res == Resolution::new(640, 480) {
                plans.push(plan);
            }
        }
        plans.len() >= 3
    }));
    manager.stop();

    assert!(matches!(
        plans[0],
        TextureUpload::Allocate {
            width: 640,
            height: 480
        }
    ));
    assert!(plans[1..].iter().all(|p| !matches!(p, TextureUpload::Allocate { .. })));
    assert_eq!(render.allocations(), 2);
}

#[test]
fn test_stop_is_bounded_while_streaming() {
    let (_exchange, manager) = setup(SyntheticBackend::new(240), TransformKind::Edges);
    manager.start(&PreviewSurface::ready()).unwrap();
    std::thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    manager.stop();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!manager.is_running());

    // And the manager is reusable afterwards
    manager.start(&PreviewSurface::ready()).unwrap();
    assert!(manager.is_running());
}

#[test]
fn test_disabled_pipeline_publishes_nothing() {
    let (exchange, manager) = setup(SyntheticBackend::new(120), TransformKind::Gray);
    manager.pipeline().set_enabled(false);
    let preview = PreviewSurface::ready();
    manager.start(&preview).unwrap();

    // Frames keep reaching the preview surface
    assert!(wait_until(Duration::from_secs(5), || preview
        .frames_presented()
        > 5));
    assert!(exchange.snapshot().is_none());

    manager.pipeline().set_enabled(true);
    assert!(wait_until(Duration::from_secs(5), || exchange
        .snapshot()
        .is_some()));
}

#[test]
fn test_switch_to_same_resolution_keeps_preview_live() {
    let backend = SyntheticBackend::with_devices(
        vec![
            device("back", Facing::Back, vec![Resolution::new(320, 240)]),
            device("front", Facing::Front, vec![Resolution::new(320, 240)]),
        ],
        240,
    );
    let (exchange, manager) = setup(backend, TransformKind::Gray);
    let preview = PreviewSurface::ready();
    manager.start(&preview).unwrap();

    // Let the first device run its sequence numbers well ahead
    assert!(wait_until(Duration::from_secs(5), || manager
        .pipeline()
        .stats()
        .published
        > 60));
    let stale_before = manager.pipeline().stats().stale;

    manager.switch_device(&preview).unwrap();
    let epoch = manager.pipeline().epoch();

    // Fresh frames from the new device, counting from the start again, show up
    assert!(wait_until(Duration::from_secs(5), || exchange
        .latest()
        .is_some_and(|l| l.frame.epoch == epoch && l.frame.sequence > 30)));
    manager.stop();

    // At most the frame the capture loop was holding at the switch is dropped
    assert!(manager.pipeline().stats().stale - stale_before <= 2);
}
