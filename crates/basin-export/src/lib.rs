//! basin-export: pure serializers for segmentation output (sans-IO).
//!
//! Encodes rendered label maps as PNG bytes and label buffers as plain
//! text grids. Nothing here touches the filesystem.

pub mod labels;
pub mod png;

pub use labels::to_label_text;
pub use png::{
    ExportError, boundaries_png, encode_gray_png, encode_rgba_png, gradient_png, regions_png,
};
