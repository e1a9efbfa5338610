//! Overlay shapes and the geometry used to compare them.
//!
//! All coordinates are normalized to the unit square. Every function here is
//! pure and deterministic so results are reproducible bit-for-bit.

use serde::{Deserialize, Serialize};

/// Axis-aligned box as `[xmin, ymin, xmax, ymax]`.
pub type BBox = [f64; 4];

const UNIT_DIAGONAL: f64 = std::f64::consts::SQRT_2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A detected region in a frame, either a box or a polygon ring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OverlayShape {
    #[serde(rename_all = "camelCase")]
    Box {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        label: String,
        #[serde(default)]
        label_localized: Option<String>,
        confidence: f64,
    },
    #[serde(rename_all = "camelCase")]
    Polygon {
        points: Vec<Point>,
        label: String,
        #[serde(default)]
        label_localized: Option<String>,
        confidence: f64,
    },
}

impl OverlayShape {
    /// Convenience constructor for an unlabeled-locale box.
    pub fn boxed(x: f64, y: f64, w: f64, h: f64, label: &str, confidence: f64) -> Self {
        OverlayShape::Box {
            x,
            y,
            w,
            h,
            label: label.to_string(),
            label_localized: None,
            confidence,
        }
    }

    pub fn polygon(points: Vec<Point>, label: &str, confidence: f64) -> Self {
        OverlayShape::Polygon {
            points,
            label: label.to_string(),
            label_localized: None,
            confidence,
        }
    }

    /// Attach a localized label.
    pub fn with_localized(mut self, localized: &str) -> Self {
        match &mut self {
            OverlayShape::Box {
                label_localized, ..
            }
            | OverlayShape::Polygon {
                label_localized, ..
            } => *label_localized = Some(localized.to_string()),
        }
        self
    }

    pub fn label(&self) -> &str {
        match self {
            OverlayShape::Box { label, .. } | OverlayShape::Polygon { label, .. } => label,
        }
    }

    pub fn label_localized(&self) -> Option<&str> {
        match self {
            OverlayShape::Box {
                label_localized, ..
            }
            | OverlayShape::Polygon {
                label_localized, ..
            } => label_localized.as_deref(),
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            OverlayShape::Box { confidence, .. } | OverlayShape::Polygon { confidence, .. } => {
                *confidence
            }
        }
    }

    /// Axis-aligned bounds. An empty polygon yields `[0, 0, 0, 0]`.
    pub fn bounding_box(&self) -> BBox {
        match self {
            OverlayShape::Box { x, y, w, h, .. } => [*x, *y, x + w, y + h],
            OverlayShape::Polygon { points, .. } => {
                let Some(first) = points.first() else {
                    return [0.0; 4];
                };
                points.iter().skip(1).fold(
                    [first.x, first.y, first.x, first.y],
                    |[xmin, ymin, xmax, ymax], p| {
                        [xmin.min(p.x), ymin.min(p.y), xmax.max(p.x), ymax.max(p.y)]
                    },
                )
            }
        }
    }

    /// Box center, or the arithmetic mean of polygon vertices.
    ///
    /// An empty polygon sits at the frame center.
    pub fn centroid(&self) -> Point {
        match self {
            OverlayShape::Box { x, y, w, h, .. } => Point::new(x + w / 2.0, y + h / 2.0),
            OverlayShape::Polygon { points, .. } => {
                if points.is_empty() {
                    return Point::new(0.5, 0.5);
                }
                let n = points.len() as f64;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                Point::new(sx / n, sy / n)
            }
        }
    }

    /// Box `w*h`, or the shoelace area of the polygon ring.
    pub fn area(&self) -> f64 {
        match self {
            OverlayShape::Box { w, h, .. } => w * h,
            OverlayShape::Polygon { points, .. } => shoelace_area(points),
        }
    }
}

/// Absolute shoelace area; the ring wraps from the last vertex to the first.
pub fn shoelace_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    (twice_area / 2.0).abs()
}

/// Intersection over union of two `[xmin, ymin, xmax, ymax]` boxes.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Centroid distance normalized by the unit-square diagonal, capped at 1.
///
/// Smaller is better; callers use `1 - distance` as a similarity.
pub fn centroid_distance(a: &OverlayShape, b: &OverlayShape) -> f64 {
    let ca = a.centroid();
    let cb = b.centroid();
    let distance = ((ca.x - cb.x).powi(2) + (ca.y - cb.y).powi(2)).sqrt();
    (distance / UNIT_DIAGONAL).min(1.0)
}

/// Ratio of the smaller area to the larger one. Zero when either area is zero.
pub fn scale_ratio(a: &OverlayShape, b: &OverlayShape) -> f64 {
    let area_a = a.area();
    let area_b = b.area();
    if area_a == 0.0 || area_b == 0.0 {
        return 0.0;
    }
    (area_a / area_b).min(area_b / area_a).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, side: f64) -> OverlayShape {
        OverlayShape::boxed(x, y, side, side, "cup", 0.9)
    }

    fn ring(points: &[(f64, f64)]) -> OverlayShape {
        OverlayShape::polygon(
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            "table",
            0.8,
        )
    }

    #[test]
    fn box_bounding_box_adds_extent() {
        let shape = OverlayShape::boxed(0.1, 0.2, 0.3, 0.4, "cup", 0.9);
        let [xmin, ymin, xmax, ymax] = shape.bounding_box();
        assert_eq!((xmin, ymin), (0.1, 0.2));
        assert!((xmax - 0.4).abs() < 1e-12);
        assert!((ymax - 0.6).abs() < 1e-12);
    }

    #[test]
    fn polygon_bounding_box_spans_all_points() {
        let shape = ring(&[(0.4, 0.1), (0.9, 0.5), (0.2, 0.7)]);
        assert_eq!(shape.bounding_box(), [0.2, 0.1, 0.9, 0.7]);
        assert_eq!(ring(&[]).bounding_box(), [0.0; 4]);
    }

    #[test]
    fn iou_identity_and_symmetry() {
        let a = [0.1, 0.1, 0.5, 0.6];
        let b = [0.3, 0.2, 0.8, 0.9];
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &b), iou(&b, &a));
    }

    #[test]
    fn iou_partial_overlap() {
        let a = [0.0, 0.0, 0.5, 0.5];
        let b = [0.25, 0.25, 0.75, 0.75];
        // 0.0625 / (0.25 + 0.25 - 0.0625)
        let expected = 0.0625 / 0.4375;
        assert!((iou(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn iou_zero_for_touching_or_degenerate_boxes() {
        assert_eq!(iou(&[0.0, 0.0, 0.5, 0.5], &[0.5, 0.0, 1.0, 0.5]), 0.0);
        assert_eq!(iou(&[0.2, 0.2, 0.2, 0.2], &[0.2, 0.2, 0.2, 0.2]), 0.0);
    }

    #[test]
    fn centroid_distance_bounds() {
        let a = square(0.0, 0.0, 0.5);
        assert_eq!(centroid_distance(&a, &a.clone()), 0.0);

        let top_left = ring(&[(0.0, 0.0)]);
        let bottom_right = ring(&[(1.0, 1.0)]);
        assert!((centroid_distance(&top_left, &bottom_right) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn polygon_centroid_is_vertex_mean() {
        let shape = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(shape.centroid(), Point::new(0.5, 0.5));
        assert_eq!(ring(&[]).centroid(), Point::new(0.5, 0.5));
    }

    #[test]
    fn shoelace_is_rotation_invariant() {
        let pts = [(0.1, 0.1), (0.7, 0.2), (0.8, 0.9), (0.3, 0.6)];
        let base = ring(&pts).area();
        for shift in 1..pts.len() {
            let mut rotated = pts.to_vec();
            rotated.rotate_left(shift);
            assert!((ring(&rotated).area() - base).abs() < 1e-12);
        }
    }

    #[test]
    fn shoelace_ignores_winding_direction() {
        let ccw = ring(&[(0.0, 0.0), (0.5, 0.0), (0.5, 0.5), (0.0, 0.5)]);
        let cw = ring(&[(0.0, 0.0), (0.0, 0.5), (0.5, 0.5), (0.5, 0.0)]);
        assert!((ccw.area() - 0.25).abs() < 1e-12);
        assert!((cw.area() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn scale_ratio_symmetry_and_zero_area() {
        let small = square(0.0, 0.0, 0.2);
        let large = square(0.1, 0.1, 0.4);
        assert_eq!(scale_ratio(&small, &large), scale_ratio(&large, &small));
        assert!((scale_ratio(&small, &large) - 0.25).abs() < 1e-12);
        assert_eq!(scale_ratio(&large, &square(0.6, 0.6, 0.4)), 1.0);
        assert_eq!(scale_ratio(&small, &square(0.3, 0.3, 0.0)), 0.0);
    }

    #[test]
    fn shape_round_trips_through_tagged_json() {
        let json = r#"{"kind":"box","x":0.1,"y":0.2,"w":0.3,"h":0.4,"label":"cup","labelLocalized":"杯子","confidence":0.9}"#;
        let shape: OverlayShape = serde_json::from_str(json).unwrap();
        assert_eq!(shape.label_localized(), Some("杯子"));
        assert_eq!(shape.label(), "cup");
    }
}
