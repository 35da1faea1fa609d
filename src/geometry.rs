use imageproc::{geometry::approximate_polygon_dp, point::Point};
use log::debug;

use crate::types::BoundaryBox;

pub fn distance_from_point_to_point(p1: &Point<f32>, p2: &Point<f32>) -> f32 {
    ((p1.x - p2.x).powf(2.0) + (p1.y - p2.y).powf(2.0)).sqrt()
}

pub fn to_f32_points(points: &[Point<i32>]) -> Vec<Point<f32>> {
    points
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32))
        .collect()
}

/// Area enclosed by a closed polygon, using the shoelace formula.
pub fn polygon_area(points: &[Point<f32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: f32 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice_area.abs() / 2.0
}

/// Approximates a closed contour with a polygon whose vertices lie within
/// `epsilon` of the contour.
///
/// The curve is split at the point farthest from the first point, and each
/// half is simplified on its own, so the result does not depend on a single
/// arbitrary chord.
pub fn approximate_closed_polygon(points: &[Point<f32>], epsilon: f32) -> Vec<Point<f32>> {
    if points.len() <= 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let first = points[0];
    let (split, _) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, distance_from_point_to_point(&first, p)))
        .fold((0, 0.0_f32), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });
    if split == 0 {
        return vec![first];
    }

    let mut second_half = points[split..].to_vec();
    second_half.push(first);

    let epsilon = epsilon as f64;
    let mut polygon = approximate_polygon_dp(&points[..=split], epsilon, false);
    polygon.pop();
    polygon.extend(approximate_polygon_dp(&second_half, epsilon, false));
    polygon.pop();
    polygon
}

/// The axis-aligned box enclosing all `points`, clamped to non-negative
/// coordinates.
pub fn bounding_box(points: &[Point<f32>]) -> Option<BoundaryBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let left = min_x.max(0.0).floor() as u32;
    let top = min_y.max(0.0).floor() as u32;
    let right = max_x.max(0.0).floor() as u32;
    let bottom = max_y.max(0.0).floor() as u32;
    Some(BoundaryBox {
        x: left,
        y: top,
        width: right - left + 1,
        height: bottom - top + 1,
    })
}

/// Corners of a quadrilateral in top-left, top-right, bottom-right,
/// bottom-left order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    pub top_left: Point<f32>,
    pub top_right: Point<f32>,
    pub bottom_right: Point<f32>,
    pub bottom_left: Point<f32>,
}

impl Quadrilateral {
    /// Orders four vertices by their coordinate sums and differences: the
    /// top-left corner has the smallest `x + y`, the bottom-right the largest,
    /// the top-right the smallest `y - x` and the bottom-left the largest.
    ///
    /// Returns `None` when one vertex would fill two corners, as happens for
    /// outlines turned close to 45°.
    pub fn from_vertices(vertices: [Point<f32>; 4]) -> Option<Self> {
        let quad = Self {
            top_left: extreme_vertex(&vertices, |p| p.x + p.y, false),
            bottom_right: extreme_vertex(&vertices, |p| p.x + p.y, true),
            top_right: extreme_vertex(&vertices, |p| p.y - p.x, false),
            bottom_left: extreme_vertex(&vertices, |p| p.y - p.x, true),
        };

        let corners = quad.corners();
        let distinct = (0..4).all(|i| ((i + 1)..4).all(|j| corners[i] != corners[j]));
        if !distinct {
            debug!("cannot order corners of {:?}", vertices);
            return None;
        }
        Some(quad)
    }

    pub fn corners(&self) -> [Point<f32>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn control_points(&self) -> [(f32, f32); 4] {
        self.corners().map(|p| (p.x, p.y))
    }
}

fn extreme_vertex(
    vertices: &[Point<f32>; 4],
    key: impl Fn(&Point<f32>) -> f32,
    largest: bool,
) -> Point<f32> {
    let mut best = vertices[0];
    for v in &vertices[1..] {
        let better = if largest {
            key(v) > key(&best)
        } else {
            key(v) < key(&best)
        };
        if better {
            best = *v;
        }
    }
    best
}
