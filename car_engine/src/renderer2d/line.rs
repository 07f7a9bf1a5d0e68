/// Line stroking for the 2D batcher

use glam::Vec2;

use crate::renderer2d::quad::Rect;

/// Geometry a line turns into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineShape {
    /// Horizontal or vertical line: a filled rectangle
    Rect(Rect),
    /// Any other angle: a rotated quad, corners in emission order
    Quad([Vec2; 4]),
}

/// Compute the shape of a line from `from` to `to`
///
/// Axis-aligned lines become a rectangle `width / 2` thick anchored at the
/// line, which keeps thin strokes pixel exact. Other lines become a quad
/// whose long edges sit `width / 2` either side of the line. Corners are
/// rounded outward: the start corners are floored and the end corners
/// ceiled along the direction of travel, which is what lets consecutive
/// segments meet without gaps or double-covered pixels.
pub fn line_shape(from: Vec2, to: Vec2, width: f32) -> LineShape {
    let half = width / 2.0;
    let delta = to - from;

    if delta.y == 0.0 {
        return LineShape::Rect(Rect::new(from.x.min(to.x), from.y, delta.x.abs(), half));
    }
    if delta.x == 0.0 {
        return LineShape::Rect(Rect::new(from.x, from.y.min(to.y), half, delta.y.abs()));
    }

    let angle = delta.y.atan2(delta.x);
    let normal = Vec2::new(-angle.sin(), angle.cos()) * half;

    let start = [from + normal, from - normal];
    let end = [to + normal, to - normal];

    // Screen Y grows downward: a positive delta.y travels down the screen
    let going_down = delta.y > 0.0;
    let going_right = delta.x > 0.0;

    let round_start = |p: Vec2| {
        Vec2::new(
            if going_right { p.x.floor() } else { p.x.ceil() },
            if going_down { p.y.floor() } else { p.y.ceil() },
        )
    };
    let round_end = |p: Vec2| {
        Vec2::new(
            if going_right { p.x.ceil() } else { p.x.floor() },
            if going_down { p.y.ceil() } else { p.y.floor() },
        )
    };

    LineShape::Quad([
        round_start(start[0]),
        round_end(end[0]),
        round_end(end[1]),
        round_start(start[1]),
    ])
}
