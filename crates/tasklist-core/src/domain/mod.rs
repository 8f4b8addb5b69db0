//! Domain model (ids, task, view, search, errors).

pub mod errors;
pub mod ids;
pub mod search;
pub mod task;
pub mod view;

pub use self::errors::{ClientError, ErrorKind};
pub use self::ids::TaskId;
pub use self::search::{SearchOptions, SearchQuery, SearchResponse, SearchResult, SortOrder};
pub use self::task::{CreateTaskInput, Task, UpdateTaskInput};
pub use self::view::View;
