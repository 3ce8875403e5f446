/// TOML configuration: research limits, providers, stage models, tools, report ladder, logging.
pub mod toml_config;
