//! Domain entities - the core business objects.

mod category;
mod comment;
mod location;
mod post;
mod user;
mod viewer;

pub use category::{Category, CategoryId, NewCategory};
pub use comment::{Comment, CommentId, CommentView, NewComment};
pub use location::{Location, LocationId, NewLocation};
pub use post::{NewPost, Post, PostId, PostSummary};
pub use user::{NewUser, User, UserId};
pub use viewer::Viewer;
