pub mod canvas;
pub mod compositor;
pub mod dirty;
pub mod pixels;
pub mod surface;
