//! Camera and trackball

mod camera;
mod trackball;

pub use camera::*;
pub use trackball::*;
