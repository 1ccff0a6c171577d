pub mod config_store;
pub mod defaults;
pub mod llm;
pub mod maps;
pub mod route_map;
pub mod runtime_engine;
pub mod secrets;
pub mod speech;
pub mod street_view;

pub use config_store::ConfigStore;
pub use runtime_engine::{build_engine, build_engine_from_config};
pub use secrets::ApiKeys;
