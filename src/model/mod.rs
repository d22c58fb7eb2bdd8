mod event;

pub use event::{EventKind, TaskEvent};
