//! Binary morphology for mask cleanup
//!
//! - **Erosion**: keeps pixels whose whole neighborhood is set
//! - **Dilation**: sets pixels reached by any set neighbor
//! - **Opening**: erosion then dilation (removes specks)
//! - **Closing**: dilation then erosion (fills gaps)
//! - **Components**: 4-connected labeling and small-object removal

mod closing;
mod components;
mod dilate;
mod element;
mod erode;
mod opening;

pub use closing::{closing, Closing, ClosingParams};
pub use components::{
    label_components, remove_small_objects, Component, Labeling, RemoveSmallObjects,
    RemoveSmallObjectsParams,
};
pub use dilate::{dilate, Dilate, DilateParams};
pub use element::StructuringElement;
pub use erode::{erode, Border, Erode, ErodeParams};
pub use opening::{opening, Opening, OpeningParams};
