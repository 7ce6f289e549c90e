//! Data models for the course catalogue.
//!
//! These models match the REST API's JSON records field for field.

mod course;
mod entity;
mod lesson;
mod module;
mod paginate;
mod question;
mod tag;
mod topic;
mod user;

pub use course::*;
pub use entity::*;
pub use lesson::*;
pub use module::*;
pub use paginate::*;
pub use question::*;
pub use tag::*;
pub use topic::*;
pub use user::*;
