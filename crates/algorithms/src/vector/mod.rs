//! Vector measurements and overlay
//!
//! - Area, perimeter and compactness, with the degree→metre approximation
//!   for geographic CRSs
//! - Dissolve, buffer and inside/outside area split for lease overlay

mod measurements;
mod overlay;

pub use measurements::{
    area, compactness, is_valid_polygon, multi_area, perimeter, PolygonMetrics, DEGREE_TO_METERS,
    M2_PER_HECTARE,
};
pub use overlay::{buffer, dissolve, intersection_area, split_area};
