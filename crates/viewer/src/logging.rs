use crate::config::ViewerConfig;

pub fn setup_logging(config: &ViewerConfig) {
    common::setup_logging(config.log_level.as_str(), config.environment);
}
