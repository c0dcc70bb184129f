pub mod app;
pub mod config;
pub mod edit;
pub mod logging;
pub mod storage;
pub mod store;
pub mod task;
pub mod ui;
pub mod view;

pub use store::{StoreError, TaskStore};
pub use task::{DueAt, Task, TaskId};
pub use view::{view, Filter};
