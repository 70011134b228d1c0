//! Worker assembly for LoupGuard.
//!
//! Reads every worker's typed configuration once, then spawns the workers
//! that the settings and CLI flags ask for into one [`WorkerSet`].

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use loupguard_actuator::{ActuatorConfig, ActuatorWorker, SimulatedStepper};
use loupguard_config::{ConfigError, Settings};
use loupguard_core::{keys, Hub, HubConfig};
use loupguard_decision::{DecisionConfig, DecisionWorker};
use loupguard_link::{LinkConfig, LinkWorker};
use loupguard_perception::{
    names, ArchiveConfig, ArchiveWorker, CaptureConfig, CaptureWorker, DetectorConfig,
    DetectorWorker, DirectorySource, PassthroughDetector, ReplayConfig, ReplayWorker,
};
use loupguard_worker::{SupervisorConfig, WorkerError, WorkerSet};

use crate::cli::RunArgs;

/// Prefix of the hub queue capacities (`hub_image_queue_size`, ...).
const HUB_PREFIX: &str = "hub";

/// Validated configuration of every worker this process will run.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    settings: Settings,
    pub hub: HubConfig,
    pub decision: DecisionConfig,
    pub link: LinkConfig,
    /// `None` when no stepper driver is available.
    pub actuator: Option<ActuatorConfig>,
    /// Capture and detector run together, only with an image directory.
    pub camera: Option<(CaptureConfig, DetectorConfig, PathBuf)>,
    pub replay: Option<(ReplayConfig, PathBuf)>,
    pub archive: ArchiveConfig,
}

impl Plan {
    pub fn new(settings: Settings, args: &RunArgs) -> Result<Self, ConfigError> {
        let hub = settings.scoped(HUB_PREFIX).extract::<HubConfig>()?;
        let decision = DecisionConfig::from_settings(&settings)?;
        let link = LinkConfig::from_settings(&settings)?;
        let actuator = ActuatorConfig::from_settings(&settings)?;
        let capture = CaptureConfig::from_settings(&settings)?;
        let detector = DetectorConfig::from_settings(&settings)?;
        let replay = ReplayConfig::from_settings(&settings)?;
        let archive = ArchiveConfig::from_settings(&settings)?;

        let camera = capture
            .image_dir()
            .map(|dir| (capture, detector, dir));
        let replay = args
            .replay
            .clone()
            .or_else(|| replay.file())
            .map(|file| (replay, file));

        let plan = Self {
            actuator: args.simulate.then_some(actuator),
            settings,
            hub,
            decision,
            link,
            camera,
            replay,
            archive,
        };
        for name in plan.worker_names() {
            SupervisorConfig::from_settings(&plan.settings, name)?;
        }
        Ok(plan)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Names of the workers [`Plan::spawn`] starts, in start order.
    pub fn worker_names(&self) -> Vec<&'static str> {
        let mut names = vec![loupguard_decision::WORKER_NAME, loupguard_link::WORKER_NAME];
        if self.actuator.is_some() {
            names.push(loupguard_actuator::WORKER_NAME);
        }
        if self.camera.is_some() {
            names.extend([names::CAPTURE, names::DETECTOR]);
        }
        if self.replay.is_some() {
            names.push(names::REPLAY);
        }
        names.push(names::ARCHIVE);
        names
    }

    /// Create the hub and publish the effective settings under `config`.
    pub fn build_hub(&self) -> Arc<Hub> {
        let hub = Arc::new(Hub::new(self.hub));
        hub.set_state(keys::CONFIG, Value::Object(self.settings.to_map()));
        hub
    }

    fn supervisor(&self, name: &str) -> Result<SupervisorConfig, ConfigError> {
        SupervisorConfig::from_settings(&self.settings, name)
    }

    /// Spawn every planned worker onto `hub`.
    pub fn spawn(&self, hub: Arc<Hub>) -> Result<WorkerSet, WorkerError> {
        let mut workers = WorkerSet::new(hub.clone());

        workers.spawn(
            DecisionWorker::new(self.decision.clone()),
            self.supervisor(loupguard_decision::WORKER_NAME)?,
        );

        // The link worker creates the radio queues with their configured
        // capacities; it must exist before the actuator asks for them.
        let link = LinkWorker::from_config(self.link.clone(), &hub)?;
        workers.spawn(link, self.supervisor(loupguard_link::WORKER_NAME)?);

        match &self.actuator {
            Some(config) => {
                let actuator = ActuatorWorker::new(config.clone(), SimulatedStepper::new(), &hub)?;
                workers.spawn(actuator, self.supervisor(loupguard_actuator::WORKER_NAME)?);
            }
            None => warn!(
                "No stepper driver in this build, '{}' worker not started (use --simulate)",
                loupguard_actuator::WORKER_NAME
            ),
        }

        if let Some((capture, detector, dir)) = &self.camera {
            workers.spawn(
                CaptureWorker::new(capture.clone(), DirectorySource::new(dir)),
                self.supervisor(names::CAPTURE)?,
            );
            workers.spawn(
                DetectorWorker::new(detector.clone(), PassthroughDetector),
                self.supervisor(names::DETECTOR)?,
            );
        }

        if let Some((config, file)) = &self.replay {
            workers.spawn(
                ReplayWorker::new(config.clone(), file),
                self.supervisor(names::REPLAY)?,
            );
        }

        workers.spawn(
            ArchiveWorker::new(self.archive.clone()),
            self.supervisor(names::ARCHIVE)?,
        );

        info!("Started {} workers: {}", workers.len(), workers.names().join(", "));
        Ok(workers)
    }
}
