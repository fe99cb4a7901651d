//! # Blogicum Shared
//!
//! Wire-level types shared by the server and the core: the form payloads the
//! browser submits and the model behind the error pages.

pub mod dto;
pub mod response;

pub use dto::{
    CommentFormData, LoginFormData, PageQuery, PostFormData, ProfileFormData, RegisterFormData,
};
pub use response::ErrorPage;
