use actix::{Actor, Addr};
use std::sync::Arc;
use std::time::Duration;

use super::config::{AppConfigCache, Settings};
use super::errors::InitErr;
use super::hub::BroadcastHub;
use crate::classifier::Classifier;
use crate::pipeline::source::DatalinkFactory;
use crate::pipeline::supervisor::CaptureSupervisor;

/// Everything a request handler needs, constructed once at startup and
/// injected through `web::Data`. There is no process-global state.
#[derive(Clone)]
pub struct State {
    pub classifier: Arc<Classifier>,
    pub hub: Addr<BroadcastHub>,
    pub supervisor: Arc<CaptureSupervisor<DatalinkFactory>>,
}

impl State {
    pub async fn new() -> Result<Self, InitErr> {
        let cfg = AppConfigCache::new().map_err(InitErr::Config)?;
        let settings = cfg.get_config::<Settings>().map_err(InitErr::Config)?;

        let classifier =
            Arc::new(Classifier::load_or_bootstrap(&settings).map_err(InitErr::Model)?);

        let hub = BroadcastHub::default().start();

        let supervisor = Arc::new(CaptureSupervisor::new(
            DatalinkFactory::new(settings.capture_interface.clone()),
            classifier.clone(),
            hub.clone(),
            Duration::from_secs(settings.batch_interval_secs),
            settings.queue_capacity,
        ));

        Ok(Self {
            classifier,
            hub,
            supervisor,
        })
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::classifier::{ModelArtifact, FEATURE_COUNT};

    /// State backed by a single-label model and a capture source that
    /// will never open; enough for exercising the request handlers.
    pub fn test_state(label: &str) -> State {
        let classifier = Arc::new(
            Classifier::new(ModelArtifact {
                labels: vec![label.to_owned()],
                centroids: vec![[0.0; FEATURE_COUNT]],
                feature_means: [0.0; FEATURE_COUNT],
                feature_stds: [1.0; FEATURE_COUNT],
            })
            .unwrap(),
        );

        let hub = BroadcastHub::default().start();

        let supervisor = Arc::new(CaptureSupervisor::new(
            DatalinkFactory::new("sentinel-test-no-such-if".to_owned()),
            classifier.clone(),
            hub.clone(),
            Duration::from_secs(10),
            16,
        ));

        State {
            classifier,
            hub,
            supervisor,
        }
    }
}
