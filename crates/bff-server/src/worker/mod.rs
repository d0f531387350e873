//! Background work that must never delay a response.

mod background;

pub use background::{BackgroundTasks, TaskFailure};
