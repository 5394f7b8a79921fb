pub mod analytics;
pub mod import;
pub mod task_ops;
pub mod undo;
pub mod view;
