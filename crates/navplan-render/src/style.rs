//! Mapping from model styling to canvas styling.

use navplan_core::{NodeType, RenderStyle, SerializableColor};
use peniko::Color;

/// Convert a model color to a canvas color.
pub fn to_color(c: SerializableColor) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

pub(crate) fn node_color(style: &RenderStyle, node_type: NodeType) -> Color {
    to_color(match node_type {
        NodeType::Waypoint => style.waypoint_color,
        NodeType::Elevator => style.elevator_color,
        NodeType::Stairs => style.stairs_color,
    })
}

pub(crate) fn beacon_color(style: &RenderStyle, active: bool) -> Color {
    to_color(if active {
        style.beacon_color
    } else {
        style.inactive_beacon_color
    })
}

pub(crate) fn marker_scale(style: &RenderStyle, selected: bool) -> f64 {
    if selected {
        style.selected_marker_scale
    } else {
        style.marker_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_color_keeps_channels() {
        let rgba = to_color(SerializableColor::new(1, 2, 3, 4)).to_rgba8();
        assert_eq!((rgba.r, rgba.g, rgba.b, rgba.a), (1, 2, 3, 4));
    }

    #[test]
    fn test_connector_colors() {
        let style = RenderStyle::default();
        let stairs = node_color(&style, NodeType::Stairs).to_rgba8();
        let expected = style.stairs_color;
        assert_eq!((stairs.r, stairs.g, stairs.b), (expected.r, expected.g, expected.b));
        assert_eq!(marker_scale(&style, true), style.selected_marker_scale);
    }
}
