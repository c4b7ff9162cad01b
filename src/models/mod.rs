//! Data models for the photo organizer.
//!
//! - [`Item`]: one photo, identified by its path, with its load index, sort
//!   attributes and rendered thumbnail
//! - [`DisplayKey`]: the attribute the Available list is ordered by
//! - [`OrderedSelection`]: the two disjoint ordered lists (Available and
//!   Selected) and the operations that move items between them
//! - [`AppState`]: the selection model plus view state (picture size,
//!   highlighted rows, export progress)
//!
//! # Architecture Note
//!
//! The models are plain owned data. [`StateManager`](crate::state::StateManager)
//! keeps the single `AppState` behind `Rc<RefCell<>>` and is the only place it
//! is mutated from, always between checkpoints of the thumbnail task.

pub mod app_state;
pub mod item;
pub mod selection;

pub use app_state::{AppState, DEFAULT_PICTURE_SIZE, MAX_PICTURE_SIZE, MIN_PICTURE_SIZE};
pub use item::{DisplayKey, Item, ParseDisplayKeyError, Thumbnail};
pub use selection::{Direction, OrderedSelection, Revisions, Side, Transfer};
