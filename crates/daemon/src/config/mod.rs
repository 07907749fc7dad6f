// crates/daemon/src/config/mod.rs

pub mod model;
pub mod parser;
pub mod validator;

pub use model::{DaemonConfig, ServiceSection};
pub use parser::{load_config, parse_config, parse_config_file};
pub use validator::{parse_bool, parse_protocol};
