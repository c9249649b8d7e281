//! HTML rendering.
//!
//! Every view is a pure function from fetched data to a [`node::Element`]
//! tree. Serialising the tree escapes all text, so nothing from the backend
//! reaches the page as markup.

pub mod coverage;
pub mod dashboard;
pub mod format;
pub mod node;
pub mod page;
pub mod session;

pub use node::{Element, Node, el, text};
