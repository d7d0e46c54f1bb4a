//! Layout and render-cache pipeline for page-based document viewers.
//!
//! The crate turns a [`source::PageSource`] (anything that can report
//! page sizes and rasterize regions) into laid-out geometry, coordinate
//! mapping and an asynchronous tile cache. [`controller::ViewerController`]
//! ties the pieces together behind a command interface.

pub mod config;
pub mod controller;
pub mod document;
pub mod geometry;
pub mod layout;
pub mod mapper;
pub mod rects;
pub mod render;
pub mod source;
pub mod viewport;

pub mod test_utils;

pub use config::ViewerConfig;
pub use controller::{Command, DrawCommand, RotateTarget, ViewerController, ViewerError};
pub use document::Document;
pub use geometry::{Point, Rect, Rotation, Size};
pub use layout::{LayoutStrategy, layout};
pub use source::{PageSource, PixelBuffer, SourceError};
pub use viewport::Viewport;
