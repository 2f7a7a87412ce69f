mod handler;

pub use handler::{infer, model_info};
