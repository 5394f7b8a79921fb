pub mod task;
pub mod view;
pub mod config;

pub use task::*;
pub use view::*;
pub use config::*;
