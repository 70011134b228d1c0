use loupguard_core::{HubConfig, ManualClock};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::driver::SimulatedStepper;

struct Rig {
    hub: Arc<Hub>,
    clock: Arc<ManualClock>,
    ctx: WorkerContext,
}

fn rig() -> Rig {
    let clock = Arc::new(ManualClock::new(100.0));
    let hub = Arc::new(Hub::with_clock(HubConfig::default(), clock.clone()));
    let ctx = WorkerContext::new(WORKER_NAME, hub.clone(), CancellationToken::new());
    Rig { hub, clock, ctx }
}

fn quiet() -> ActuatorConfig {
    ActuatorConfig {
        calibrate: false,
        ..Default::default()
    }
}

/// 36 degrees at 200 steps per turn: a 20-step arc.
fn short_arc() -> ActuatorConfig {
    ActuatorConfig {
        microsteps: 1,
        sweep_angle_deg: 36.0,
        batch_size: 8,
        ..quiet()
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_advances_and_publishes() {
    let rig = rig();
    let stepper = SimulatedStepper::new();
    let mut worker = ActuatorWorker::new(quiet(), stepper.clone(), &rig.hub).unwrap();

    worker.init(&rig.ctx).await.unwrap();
    assert!(stepper.log().enabled);

    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(worker.index(), 20);
    assert_eq!(stepper.log().pulses, 20);
    assert_eq!(stepper.log().position, 20);

    let state = rig.hub.actuator_state().unwrap();
    assert_eq!(state.angle, 2.3);
    assert_eq!(state.direction, 1);
    assert!(state.moving);
}

#[tokio::test(start_paused = true)]
async fn test_reverses_at_both_ends() {
    let rig = rig();
    let stepper = SimulatedStepper::new();
    let mut worker = ActuatorWorker::new(short_arc(), stepper.clone(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();

    let mut trace = Vec::new();
    for _ in 0..6 {
        worker.step(&rig.ctx).await.unwrap();
        trace.push((worker.index(), worker.direction()));
    }
    assert_eq!(
        trace,
        vec![(8, 1), (16, 1), (20, -1), (12, -1), (4, -1), (0, 1)]
    );
    assert_eq!(stepper.log().position, 0);
    assert_eq!(rig.hub.actuator_state().unwrap().angle, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_direction_pause_at_boundary() {
    let rig = rig();
    let mut worker = ActuatorWorker::new(short_arc(), SimulatedStepper::new(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();
    worker.step(&rig.ctx).await.unwrap();
    worker.step(&rig.ctx).await.unwrap();

    // four pulses of 10ms, then the 200ms direction pause
    let start = tokio::time::Instant::now();
    worker.step(&rig.ctx).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(240));
}

#[tokio::test(start_paused = true)]
async fn test_rising_edge_pauses_and_resumes_forward() {
    let rig = rig();
    let stepper = SimulatedStepper::new();
    let mut worker = ActuatorWorker::new(quiet(), stepper.clone(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();

    worker.step(&rig.ctx).await.unwrap();
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(worker.index(), 40);

    rig.hub.set_trigger(true);
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(worker.state(), MotionState::AlertPaused { since: 100.0 });
    assert_eq!(worker.index(), 40);

    let tx = rig.hub.link_tx_queue(10).unwrap();
    assert_eq!(tx.try_pop(), Some(OutboundMessage::Text("LOUP_ANGLE:4.5".into())));

    let paused = rig.hub.actuator_state().unwrap();
    assert!(!paused.moving);
    assert_eq!(paused.angle, 4.5);
    assert_eq!(paused.direction, 1);

    rig.clock.advance_secs(1.0);
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(stepper.log().pulses, 40);

    rig.clock.advance_secs(1.0);
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(worker.state(), MotionState::Scanning);
    assert_eq!(worker.index(), 60);
    assert_eq!(worker.direction(), 1);
    assert!(rig.hub.actuator_state().unwrap().moving);
    assert!(tx.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_alerts_only_on_edges() {
    let rig = rig();
    let mut worker = ActuatorWorker::new(quiet(), SimulatedStepper::new(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();
    let tx = rig.hub.link_tx_queue(10).unwrap();

    rig.hub.set_trigger(true);
    worker.step(&rig.ctx).await.unwrap();
    rig.clock.advance_secs(2.0);
    worker.step(&rig.ctx).await.unwrap();
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(tx.len(), 1);

    rig.hub.set_trigger(false);
    worker.step(&rig.ctx).await.unwrap();
    rig.hub.set_trigger(true);
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(tx.len(), 2);
    assert!(matches!(worker.state(), MotionState::AlertPaused { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_drops_alert_but_pauses() {
    let rig = rig();
    let tx = rig.hub.link_tx_queue(1).unwrap();
    tx.try_push("stale".into()).unwrap();

    let mut worker = ActuatorWorker::new(quiet(), SimulatedStepper::new(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();

    rig.hub.set_trigger(true);
    let start = tokio::time::Instant::now();
    worker.step(&rig.ctx).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(500));

    assert!(matches!(worker.state(), MotionState::AlertPaused { .. }));
    assert_eq!(tx.try_pop(), Some(OutboundMessage::Text("stale".into())));

    let log = rig.hub.error_log().drain(10);
    assert!(
        log.iter()
            .any(|e| e.severity == Severity::Warning && e.message.contains("dropped"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_calibration_returns_home() {
    let rig = rig();
    let stepper = SimulatedStepper::new();
    let mut worker =
        ActuatorWorker::new(ActuatorConfig::default(), stepper.clone(), &rig.hub).unwrap();

    worker.init(&rig.ctx).await.unwrap();
    let log = stepper.log();
    assert_eq!(log.pulses, 100);
    assert_eq!(log.position, 0);
    assert_eq!(worker.index(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cuts_batch_short() {
    let rig = rig();
    let mut worker = ActuatorWorker::new(quiet(), SimulatedStepper::new(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();

    rig.ctx.request_stop();
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(worker.index(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_disables_motor() {
    let rig = rig();
    let stepper = SimulatedStepper::new();
    let mut worker = ActuatorWorker::new(quiet(), stepper.clone(), &rig.hub).unwrap();
    worker.init(&rig.ctx).await.unwrap();
    worker.step(&rig.ctx).await.unwrap();

    worker.teardown(&rig.ctx).await.unwrap();
    assert!(!stepper.log().enabled);
    assert!(!rig.hub.actuator_state().unwrap().moving);
}
