//! Routing of the active operator view.

pub mod selector;

pub use selector::ViewSelector;
