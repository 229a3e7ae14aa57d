//! Element-wise operations: task planning and the union kernel.

pub mod add;
pub mod slice;
pub mod task;

pub use add::ewise_add;
pub use slice::ewise_slice;
pub use task::{Task, TaskList};
