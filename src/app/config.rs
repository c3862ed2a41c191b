use super::errors::ConfigErr;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;

const DEFAULT_ENV_VAR_PREFIX: &str = "SENTINEL";

#[derive(Debug, Clone)]
pub struct AppConfigCache {
    config: Config,
}

impl AppConfigCache {
    pub fn new() -> Result<Self, ConfigErr> {
        let config_cache = Self {
            config: Self::load_config()?,
        };

        Ok(config_cache)
    }

    pub fn get_config<'d, T: Deserialize<'d>>(&self) -> Result<T, ConfigErr> {
        self.config
            .clone()
            .try_deserialize()
            .map_err(ConfigErr::Read)
    }

    fn load_config() -> Result<Config, ConfigErr> {
        let base_config_builder = ConfigBuilder::<DefaultState>::default();
        base_config_builder
            .add_source(Environment::with_prefix(DEFAULT_ENV_VAR_PREFIX).separator("__"))
            .build()
            .map_err(ConfigErr::Read)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Interface the capture pipeline listens on
    pub capture_interface: String,

    /// Wall-clock period after which every touched flow is drained
    #[serde(default = "default_batch_interval_secs")]
    pub batch_interval_secs: u64,

    /// Model artifact file, loaded wholesale at startup
    pub model_path: String,

    /// Labeled dataset used only for bootstrap training
    pub dataset_path: Option<String>,

    /// Explicitly opt in to training a model when the artifact is absent.
    /// Off by default: a missing artifact is a deployment error.
    #[serde(default)]
    pub bootstrap_train: bool,

    /// Capacity of the queue between aggregation and classify/broadcast
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_batch_interval_secs() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    1024
}
