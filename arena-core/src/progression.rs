//! Player level progression derived from lifetime points.

/// Level for a points total: `floor(sqrt(points / 100)) + 1`.
/// Levels start at 1 and grow with the square root of points, so each
/// level costs progressively more.
pub fn level_for_points(points: i32) -> i32 {
    let points = points.max(0) as f64;
    (points / 100.0).sqrt().floor() as i32 + 1
}

/// Points needed to reach the next level from `points`.
pub fn points_for_next_level(points: i32) -> i32 {
    let next_level = level_for_points(points) + 1;
    let threshold = (next_level - 1).pow(2) * 100;
    threshold - points.max(0)
}
