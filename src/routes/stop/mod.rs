mod handler;
pub mod model;

pub use handler::reorder_stops;
