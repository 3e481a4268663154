//! Per-connection interest sets derived from reported camera viewports.

use crate::grid::CellKey;
use shared::Viewport;

/// Size limits applied to incoming camera reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLimits {
    pub min_width: f32,
    pub max_width: f32,
    pub min_height: f32,
    pub max_height: f32,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_width: shared::MIN_CAMERA_WIDTH,
            max_width: shared::MAX_CAMERA_WIDTH,
            min_height: shared::MIN_CAMERA_HEIGHT,
            max_height: shared::MAX_CAMERA_HEIGHT,
        }
    }
}

/// Validates a client-reported viewport.
///
/// Returns `None` if any component is not finite; otherwise the size is clamped to the
/// configured limits and the position is kept as reported.
pub fn sanitize_viewport(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    limits: &ViewportLimits,
) -> Option<Viewport> {
    if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
        return None;
    }

    Some(Viewport {
        x,
        y,
        width: width.clamp(limits.min_width, limits.max_width),
        height: height.clamp(limits.min_height, limits.max_height),
    })
}

/// Viewport of the given size centred on a world point.
pub fn viewport_centered_on(cx: f32, cy: f32, width: f32, height: f32) -> Viewport {
    Viewport {
        x: cx - width / 2.0,
        y: cy - height / 2.0,
        width,
        height,
    }
}

/// Rewrites `cells` with every grid cell overlapping the viewport expanded by `padding`.
///
/// The range is floor of the padded left/top edge through ceil of the padded right/bottom
/// edge, both inclusive.
pub fn compute_visible_cells(
    viewport: &Viewport,
    cell_size: f32,
    padding: f32,
    cells: &mut Vec<CellKey>,
) {
    cells.clear();

    let start_col = ((viewport.x - padding) / cell_size).floor() as i32;
    let end_col = ((viewport.x + viewport.width + padding) / cell_size).ceil() as i32;
    let start_row = ((viewport.y - padding) / cell_size).floor() as i32;
    let end_row = ((viewport.y + viewport.height + padding) / cell_size).ceil() as i32;

    for col in start_col..=end_col {
        for row in start_row..=end_row {
            cells.push(CellKey { col, row });
        }
    }
}
