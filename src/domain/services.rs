//! Domain services
//!
//! Ports the crawl pipeline consumes; implementations live in infrastructure.

pub mod output_services;
pub mod rendering_services;

pub use output_services::RecordSink;
pub use rendering_services::{
    ElementHandle, PageSession, ReadyWait, RenderingSurface, first_text, first_text_within,
};
