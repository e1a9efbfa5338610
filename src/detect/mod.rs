mod backend;
mod shape;

pub use backend::{Labeler, ShapeDetector};
pub use shape::{centroid_distance, iou, scale_ratio, shoelace_area, BBox, OverlayShape, Point};
