mod handler;

pub use handler::{health, metrics, root};
