//! tracefuse-markup: Pure markup serializers (sans-IO)
//!
//! Renders fragments, the endpoint index, and draw-mode previews as SVG
//! fragments for the editing surface, or as a standalone document.

pub mod svg;

pub use svg::{
    endpoint_marker_markup, fragment_path_data, hit_overlay_markup, outline_markup, path_data,
    preview_markup, to_svg_document,
};
