pub mod message;
pub mod stop;
pub mod trip;
