//! Authorization predicates. Every handler goes through these two modules;
//! none re-derives the rules inline.

pub mod ownership;
pub mod visibility;

pub use ownership::{Authored, can_mutate, ensure_owner};
pub use visibility::{Visibility, is_public, is_visible, visible_posts};
