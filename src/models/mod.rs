pub mod todo;
pub mod user;

pub use todo::{normalize_title, Todo, MAX_TITLE_CHARS};
pub use user::User;
