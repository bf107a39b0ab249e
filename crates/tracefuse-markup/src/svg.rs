//! SVG markup serializers.
//!
//! Builds the render-ready layers the editing surface draws verbatim:
//!
//! - **outlines**: one visible `<path>` per fragment,
//! - **hit overlay**: one wide, transparent `<path>` per fragment so the
//!   pointer can grab thin curves,
//! - **endpoint markers**: one `<circle>` per index bucket, carrying one
//!   `data-owner-{i}="{fragment}:{role}"` attribute per owner, so a
//!   coordinate shared by N endpoints renders exactly one marker.
//!
//! Stroke widths and marker radii are given in screen units by
//! [`SessionConfig`] and divided by the current [`Scale`], so they look
//! the same at every zoom level.
//!
//! Document construction and attribute escaping go through the [`svg`]
//! crate. Path data is formatted here at `f64` precision, since
//! [`svg::node::element::path::Data`] narrows coordinates to `f32`.
//! These are pure functions with no I/O.

use std::fmt::Write as _;

use svg::Document;
use svg::node::element::{Circle, Group, Line, Path};

use tracefuse_core::{
    Bucket, DrawPreview, Fragment, Point, Scale, SessionConfig, SpatialEndpointIndex,
};

/// Build an SVG path `d` attribute string from 2-4 points.
///
/// The point count picks the command after the initial `M`: 2 points
/// give `L`, 3 give `Q`, 4 give `C`. Anything else is drawn as a
/// polyline; fewer than 2 points give an empty string.
///
/// Coordinates are written at full `f64` precision so outline ends land
/// exactly on their endpoint markers.
///
/// # Examples
///
/// ```
/// use tracefuse_core::Point;
/// use tracefuse_markup::path_data;
///
/// let d = path_data(&[Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 0.0)]);
/// assert_eq!(d, "M0,0 Q5,5,10,0");
/// ```
#[must_use]
pub fn path_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut d = format!("M{},{}", first.x, first.y);
    match rest.len() {
        2 | 3 => {
            let command = if rest.len() == 2 { 'Q' } else { 'C' };
            let coords: Vec<String> = rest.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
            let _ = write!(d, " {command}{}", coords.join(","));
        }
        _ => {
            for p in rest {
                let _ = write!(d, " L{},{}", p.x, p.y);
            }
        }
    }
    d
}

/// Path data for a fragment.
#[must_use]
pub fn fragment_path_data(fragment: &Fragment) -> String {
    path_data(fragment.points())
}

fn fragment_path(fragment: &Fragment) -> Path {
    Path::new()
        .set("d", fragment_path_data(fragment))
        .set("data-fragment", fragment.id().0)
        .set("fill", "none")
}

fn outline_group(fragments: &[Fragment], scale: Scale, config: &SessionConfig) -> Group {
    let width = scale.world_length(config.outline_width);
    fragments.iter().fold(Group::new().set("class", "outlines"), |group, fragment| {
        group.add(
            fragment_path(fragment)
                .set("stroke", "black")
                .set("stroke-width", width),
        )
    })
}

fn hit_overlay_group(fragments: &[Fragment], scale: Scale, config: &SessionConfig) -> Group {
    let width = scale.world_length(config.hit_width);
    fragments.iter().fold(Group::new().set("class", "hit-overlay"), |group, fragment| {
        group.add(
            fragment_path(fragment)
                .set("stroke", "transparent")
                .set("stroke-width", width)
                .set("stroke-linecap", "round")
                .set("pointer-events", "stroke"),
        )
    })
}

fn marker(bucket: &Bucket, radius: f64) -> Circle {
    let circle = Circle::new()
        .set("cx", bucket.coordinate.x)
        .set("cy", bucket.coordinate.y)
        .set("r", radius)
        .set("data-key", bucket.key().raw().to_string());
    bucket
        .owners
        .iter()
        .enumerate()
        .fold(circle, |circle, (i, owner)| {
            circle.set(
                format!("data-owner-{i}"),
                format!("{}:{}", owner.fragment, owner.role),
            )
        })
}

fn endpoint_marker_group(index: &SpatialEndpointIndex, scale: Scale, config: &SessionConfig) -> Group {
    let radius = scale.world_length(config.marker_radius);
    index.iter().fold(
        Group::new().set("class", "endpoints").set("fill", "white").set("stroke", "black"),
        |group, bucket| group.add(marker(bucket, radius)),
    )
}

/// Outline layer: one `<path>` per fragment inside `<g class="outlines">`.
#[must_use]
pub fn outline_markup(fragments: &[Fragment], scale: Scale, config: &SessionConfig) -> String {
    outline_group(fragments, scale, config).to_string()
}

/// Hit-test layer: one transparent, wide `<path>` per fragment inside
/// `<g class="hit-overlay">`.
#[must_use]
pub fn hit_overlay_markup(fragments: &[Fragment], scale: Scale, config: &SessionConfig) -> String {
    hit_overlay_group(fragments, scale, config).to_string()
}

/// Endpoint-marker layer: one `<circle>` per bucket, in index order,
/// inside `<g class="endpoints">`.
#[must_use]
pub fn endpoint_marker_markup(
    index: &SpatialEndpointIndex,
    scale: Scale,
    config: &SessionConfig,
) -> String {
    endpoint_marker_group(index, scale, config).to_string()
}

/// Draw-mode preview: the dashed fragment that would be committed, plus
/// the mirrored outgoing handle when there is one.
#[must_use]
pub fn preview_markup(preview: &DrawPreview, scale: Scale, config: &SessionConfig) -> String {
    let width = scale.world_length(config.outline_width);
    let dash = scale.world_length(config.marker_radius);
    let mut group = Group::new().set("class", "preview").add(
        Path::new()
            .set("d", path_data(&preview.points))
            .set("fill", "none")
            .set("stroke", "steelblue")
            .set("stroke-width", width)
            .set("stroke-dasharray", dash),
    );
    if let (Some(handle), Some(hover)) = (preview.mirrored_handle, preview.points.last()) {
        group = group
            .add(
                Line::new()
                    .set("x1", hover.x)
                    .set("y1", hover.y)
                    .set("x2", handle.x)
                    .set("y2", handle.y)
                    .set("stroke", "steelblue")
                    .set("stroke-width", width),
            )
            .add(
                Circle::new()
                    .set("cx", handle.x)
                    .set("cy", handle.y)
                    .set("r", scale.world_length(config.marker_radius) / 2.0)
                    .set("fill", "steelblue"),
            );
    }
    group.to_string()
}

/// Axis-aligned bounds of every fragment point: `(min_x, min_y, max_x, max_y)`.
fn bounds(fragments: &[Fragment]) -> Option<(f64, f64, f64, f64)> {
    fragments
        .iter()
        .flat_map(Fragment::points)
        .fold(None, |acc, p| {
            Some(acc.map_or((p.x, p.y, p.x, p.y), |(x0, y0, x1, y1): (f64, f64, f64, f64)| {
                (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
            }))
        })
}

/// Serialize fragments and endpoint markers into a standalone SVG
/// document.
///
/// The `viewBox` covers every fragment point, padded by one marker
/// radius. Layers are emitted outlines first, then markers.
#[must_use]
pub fn to_svg_document(
    fragments: &[Fragment],
    index: &SpatialEndpointIndex,
    scale: Scale,
    config: &SessionConfig,
) -> String {
    let mut doc = Document::new();
    if let Some((x0, y0, x1, y1)) = bounds(fragments) {
        let pad = scale.world_length(config.marker_radius);
        doc = doc.set(
            "viewBox",
            (x0 - pad, y0 - pad, 2.0f64.mul_add(pad, x1 - x0), 2.0f64.mul_add(pad, y1 - y0)),
        );
    }
    let doc = doc
        .add(outline_group(fragments, scale, config))
        .add(endpoint_marker_group(index, scale, config));

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
