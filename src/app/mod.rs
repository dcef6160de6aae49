pub mod pipelines;

pub use pipelines::{remote_copy::RemoteCopyPipeline, text_import::TextImportPipeline};
