//! # Blogicum Core
//!
//! The domain layer of the blog: entities, the visibility and ownership
//! policies, listing queries, pagination, form validation and the service that
//! orchestrates them. No infrastructure lives here; storage, identity and the
//! moderation channel are reached through the traits in [`ports`].

pub mod domain;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod policy;
pub mod ports;
pub mod query;
pub mod service;

pub use error::{DomainError, FormErrors, RepoError};
pub use service::BlogService;
