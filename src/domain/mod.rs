// Domain layer: core models and ports (interfaces) shared by both pipelines.

pub mod model;
pub mod ports;
