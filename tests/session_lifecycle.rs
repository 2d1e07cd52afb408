//! Integration tests for the session state machine over the mock transport.

use std::sync::Arc;
use std::time::Duration;

use uvc_stream::config::{CaptureConfig, Config};
use uvc_stream::transport::mock::MockTransport;
use uvc_stream::transport::StreamCapability;
use uvc_stream::{
    DeviceId, DeviceRegistry, PixelFormat, Resolution, Session, SessionState, UvcError,
};

fn camera_transport() -> Arc<MockTransport> {
    let transport = MockTransport::new();
    transport.add_device(
        1,
        "CamA",
        vec![
            StreamCapability::new(PixelFormat::Yuv, vec![Resolution::VGA, Resolution::HD]),
            StreamCapability::new(PixelFormat::Nv21, vec![Resolution::VGA]),
        ],
    );
    transport
}

fn fast_config() -> Config {
    Config {
        capture: CaptureConfig {
            read_timeout_ms: 20,
            stop_timeout_ms: 500,
            read_retries: 3,
        },
        preview: Default::default(),
    }
}

#[test]
fn test_full_lifecycle() {
    let registry = DeviceRegistry::new(camera_transport());
    let devices = registry.enumerate().expect("enumerate should not fail");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "CamA");

    let mut session = registry
        .connect_with_config(&devices[0], fast_config())
        .expect("connect should succeed");
    assert!(session.is_connected());
    assert!(!session.is_previewing());

    session
        .start_preview(Resolution::VGA, PixelFormat::Rgbx)
        .expect("start_preview should succeed");
    assert!(session.is_previewing());
    assert_eq!(session.state(), SessionState::Previewing);

    session.stop_preview().expect("stop_preview should succeed");
    assert!(session.is_connected());
    assert!(!session.is_previewing());

    session.disconnect();
    assert!(!session.is_connected());
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_connect_is_exclusive() {
    let registry = DeviceRegistry::new(camera_transport());
    let devices = registry.enumerate().unwrap();

    let session = registry.connect(&devices[0]).unwrap();

    // A second session cannot silently share the device
    match registry.connect(&devices[0]) {
        Err(UvcError::DeviceBusy(id)) => assert_eq!(id, DeviceId(1)),
        other => panic!("expected DeviceBusy, got {:?}", other.map(|_| ())),
    }

    drop(session);
    assert!(
        registry.connect(&devices[0]).is_ok(),
        "device should be claimable again after the holder is gone"
    );
}

#[test]
fn test_stale_descriptor_fails_with_device_not_found() {
    let transport = camera_transport();
    let registry = DeviceRegistry::new(transport.clone());
    let devices = registry.enumerate().unwrap();

    transport.remove_device(DeviceId(1));

    // Re-enumeration no longer lists the device
    assert!(registry.enumerate().unwrap().is_empty());

    // The old descriptor is stale, not a crash
    match registry.connect(&devices[0]) {
        Err(UvcError::DeviceNotFound(id)) => assert_eq!(id, DeviceId(1)),
        other => panic!("expected DeviceNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_transitions_leave_state_unchanged() {
    let registry = DeviceRegistry::new(camera_transport());
    let devices = registry.enumerate().unwrap();
    let mut session = registry
        .connect_with_config(&devices[0], fast_config())
        .unwrap();

    session
        .start_preview(Resolution::VGA, PixelFormat::Rgbx)
        .unwrap();

    // start while previewing
    assert!(matches!(
        session.start_preview(Resolution::VGA, PixelFormat::Rgbx),
        Err(UvcError::InvalidState { .. })
    ));
    assert_eq!(session.state(), SessionState::Previewing);

    // resolution change while previewing
    assert!(matches!(
        session.change_resolution(Resolution::HD),
        Err(UvcError::InvalidState { .. })
    ));
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(session.resolution(), Resolution::VGA);

    // unsupported live format change
    assert!(matches!(
        session.change_format(PixelFormat::Rgb565),
        Err(UvcError::UnsupportedFormat { .. })
    ));
    assert_eq!(session.format(), PixelFormat::Rgbx);
    assert_eq!(session.state(), SessionState::Previewing);
}

#[test]
fn test_supported_resolutions_by_format() {
    let registry = DeviceRegistry::new(camera_transport());
    let devices = registry.enumerate().unwrap();
    let mut session = registry.connect(&devices[0]).unwrap();

    // RGBX is reachable from both wire formats
    assert_eq!(
        session.supported_resolutions(PixelFormat::Rgbx).unwrap(),
        vec![Resolution::VGA, Resolution::HD]
    );
    // YUV420SP is only reachable from the NV21 wire entry
    assert_eq!(
        session.supported_resolutions(PixelFormat::Yuv420sp).unwrap(),
        vec![Resolution::VGA]
    );
}

/// Start a preview on a one-device registry, then exhaust the transport
/// retry budget (3 consecutive transient failures) and wait for the capture
/// loop to give up.
fn previewing_session_with_lost_device() -> (DeviceRegistry, Session) {
    let transport = MockTransport::new();
    let control = transport.add_device(
        1,
        "CamA",
        vec![StreamCapability::new(
            PixelFormat::Rgbx,
            vec![Resolution::VGA],
        )],
    );
    let registry = DeviceRegistry::new(transport);
    let devices = registry.enumerate().unwrap();
    let mut session = registry
        .connect_with_config(&devices[0], fast_config())
        .unwrap();
    session
        .start_preview(Resolution::VGA, PixelFormat::Rgbx)
        .unwrap();

    control.push_transient_error("bus reset");
    control.push_transient_error("bus reset");
    control.push_transient_error("bus reset");

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while session.is_previewing() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!session.is_connected(), "loss should reflect in is_connected");
    (registry, session)
}

#[test]
fn test_device_lost_forces_disconnect_and_allows_reconnect() {
    let (registry, mut session) = previewing_session_with_lost_device();

    // The next failable operation surfaces DeviceLost and the session is
    // Disconnected
    match session.start_preview(Resolution::VGA, PixelFormat::Rgbx) {
        Err(UvcError::DeviceLost { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected DeviceLost, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Disconnected);

    // The claim was released: reconnecting works
    let devices = registry.enumerate().unwrap();
    assert!(registry.connect(&devices[0]).is_ok());
}

#[test]
fn test_stop_preview_after_loss_succeeds() {
    let (registry, mut session) = previewing_session_with_lost_device();

    // Stopping is what the caller wanted anyway: the pending loss is
    // absorbed, not returned
    session
        .stop_preview()
        .expect("stop after a loss still succeeds");
    assert_eq!(session.state(), SessionState::Disconnected);

    let devices = registry.enumerate().unwrap();
    assert!(registry.connect(&devices[0]).is_ok());
}
