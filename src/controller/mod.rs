pub mod debounce;
pub mod editor;
pub mod list;

pub use debounce::Debouncer;
pub use editor::{EditorError, RecordEditor};
pub use list::{ListController, ListState, RefreshHandle};
