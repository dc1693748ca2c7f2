mod support;

use fbserial_communication::{spawn, Device, DeviceCommand, ParameterReconciler, ReconcileOutcome};
use fbserial_core::DeviceEvent;
use fbserial_settings::{CatalogEntry, EngineSettings, MemoryParameterStore, ParameterCatalog};
use std::time::Duration;
use support::{MockTransport, SimulatedArduino, Wire};

fn settings() -> EngineSettings {
    EngineSettings {
        tick_interval_ms: 5,
        ..EngineSettings::default()
    }
}

fn store() -> MemoryParameterStore {
    let mut store = MemoryParameterStore::with_catalog(ParameterCatalog::new(vec![
        CatalogEntry::new("PARAM_VERSION", 0, 0),
        CatalogEntry::new("MOVEMENT_TIMEOUT_X", 11, 120),
    ]));
    store.set_value(0, 2);
    store.set_value(11, 90);
    store
}

async fn wait_for_line(wire: &Wire, line: &str) -> bool {
    for _ in 0..200 {
        if wire.sent().iter().any(|sent| sent == line) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_queued_move_is_released_once_ready() {
    let sim = SimulatedArduino::default();
    let (transport, wire) = MockTransport::with_responder(sim.responder());
    let device = Device::new(transport, settings());
    let reconciler = ParameterReconciler::new(store()).unwrap();
    let (handle, _task) = spawn(device, reconciler);

    handle
        .execute(DeviceCommand::MoveAbsolute {
            x: 10,
            y: 20,
            z: 30,
            speed: None,
        })
        .await
        .unwrap();

    assert!(wait_for_line(&wire, "G00 X10 Y20 Z30").await);
    // The device starts busy, so a readiness poll goes out first.
    assert_eq!(wire.sent()[0], "F31 P8");
}

#[tokio::test]
async fn test_rejected_command_reports_error() {
    let (transport, wire) = MockTransport::new();
    let device = Device::new(transport, settings());
    let reconciler = ParameterReconciler::new(store()).unwrap();
    let (handle, _task) = spawn(device, reconciler);

    let err = handle
        .execute(DeviceCommand::SetMaxSpeed {
            axis: "q".to_string(),
            value: 10,
        })
        .await
        .unwrap_err();
    assert!(err.is_command_error());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(wire.sent().is_empty());
}

#[tokio::test]
async fn test_check_parameters_on_engine_task() {
    let sim = SimulatedArduino::with_parameters(&[(0, 1), (11, 120)]);
    let (transport, wire) = MockTransport::with_responder(sim.responder());
    let device = Device::new(transport, settings());
    let reconciler = ParameterReconciler::new(store()).unwrap();
    let (handle, _task) = spawn(device, reconciler);

    let outcome = handle.check_parameters().await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Converged {
            pushed: vec!["MOVEMENT_TIMEOUT_X".to_string()],
            version: 2,
        }
    );
    assert_eq!(sim.parameter(11), Some(90));
    assert_eq!(sim.parameter(0), Some(2));
    assert!(wire.sent().contains(&"F22 P0 V2".to_string()));

    let outcome = handle.check_parameters().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyInSync { version: 2 });
}

#[tokio::test]
async fn test_requests_fail_after_link_closes() {
    let (transport, wire) = MockTransport::new();
    let device = Device::new(transport, settings());
    let reconciler = ParameterReconciler::new(store()).unwrap();
    let (handle, task) = spawn(device, reconciler);
    let mut events = handle.subscribe();

    wire.close();
    task.await.unwrap();

    assert!(matches!(events.recv().await.unwrap(), DeviceEvent::Closed));
    let err = handle.emergency_stop().await.unwrap_err();
    assert!(err.is_closed());
    assert!(handle.check_parameters().await.unwrap_err().is_closed());
    assert!(handle.is_closed());
    assert!(!handle.is_ready());
}
