pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command, LogFormat};

pub use app::{RemoteCopyPipeline, TextImportPipeline};
pub use config::{RemoteCopyConfig, TextImportConfig, TomlConfig};
pub use core::etl::EtlEngine;
pub use domain::model::RunSummary;
pub use utils::error::{EtlError, Result};
