// State management module
//
// This module provides the StateManager which owns AppState on the UI thread
// and emits change events for listeners (the controller and any view).

use crate::models::{AppState, DisplayKey, Revisions};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::broadcast;

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// New items were added to Available
    ItemsLoaded { total: usize },

    /// Items moved between Available and Selected, or were removed
    SelectionChanged { available: usize, selected: usize },

    /// Selected was reordered or re-sequenced
    OrderChanged,

    /// Available is now sorted by another key
    DisplayKeyChanged { key: DisplayKey },

    /// Thumbnails must be rendered at a new size
    PictureSizeChanged { size: u32 },

    /// Thumbnails were stored or cleared
    ThumbnailsUpdated { rendered: usize, total: usize },

    /// An export batch has started
    ExportStarted { total: usize },

    /// An export batch has ended (completed or aborted)
    ExportFinished { exported: usize, remaining: usize },
}

impl StateChange {
    /// Whether rendered thumbnails may be stale after this change.
    pub fn invalidates_thumbnails(&self) -> bool {
        matches!(
            self,
            StateChange::ItemsLoaded { .. }
                | StateChange::SelectionChanged { .. }
                | StateChange::OrderChanged
                | StateChange::DisplayKeyChanged { .. }
                | StateChange::PictureSizeChanged { .. }
        )
    }
}

/// The fields change detection looks at, cheap to copy.
#[derive(Clone, Copy, PartialEq)]
struct Fingerprint {
    revisions: Revisions,
    display_key: DisplayKey,
    picture_size: u32,
    is_exporting: bool,
}

impl Fingerprint {
    fn of(state: &AppState) -> Self {
        Self {
            revisions: state.selection.revisions(),
            display_key: state.selection.display_key(),
            picture_size: state.picture_size,
            is_exporting: state.is_exporting,
        }
    }
}

/// Single-threaded state owner with event emission
///
/// - Owns [`AppState`] via `Rc<RefCell<T>>`; every access happens on the UI thread
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Borrowing rule
///
/// `read()` and `update()` borrow the state for the duration of the closure.
/// Never call a cooperative checkpoint from inside one: event handlers run at
/// checkpoints and update the state themselves.
pub struct StateManager {
    state: Rc<RefCell<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(state: AppState) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Rc::new(RefCell::new(state)),
            state_tx,
        }
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let selected = state_manager.read(|state| state.selection.selected().len());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.borrow();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Returns the closure's result together with the events that were emitted.
    pub fn update<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let (result, changes) = {
            let mut state = self.state.borrow_mut();
            let before = Fingerprint::of(&state);
            let result = update_fn(&mut state);
            state.clamp_highlights();
            let changes = Self::detect_changes(&before, &state);
            (result, changes)
        };

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        (result, changes)
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &Fingerprint, new_state: &AppState) -> Vec<StateChange> {
        let new = Fingerprint::of(new_state);
        let selection = &new_state.selection;
        let mut changes = Vec::new();

        if old.revisions.loaded != new.revisions.loaded {
            changes.push(StateChange::ItemsLoaded {
                total: selection.len(),
            });
        }

        if old.revisions.moved != new.revisions.moved {
            changes.push(StateChange::SelectionChanged {
                available: selection.available().len(),
                selected: selection.selected().len(),
            });
        }

        if old.revisions.reordered != new.revisions.reordered {
            changes.push(StateChange::OrderChanged);
        }

        if old.display_key != new.display_key {
            changes.push(StateChange::DisplayKeyChanged {
                key: new.display_key,
            });
        }

        if old.picture_size != new.picture_size {
            changes.push(StateChange::PictureSizeChanged {
                size: new.picture_size,
            });
        }

        if old.revisions.thumbnails != new.revisions.thumbnails {
            changes.push(StateChange::ThumbnailsUpdated {
                rendered: selection.rendered_count(new.picture_size),
                total: selection.len(),
            });
        }

        if old.is_exporting != new.is_exporting {
            if new.is_exporting {
                changes.push(StateChange::ExportStarted {
                    total: new_state.export_total,
                });
            } else {
                changes.push(StateChange::ExportFinished {
                    exported: new_state.export_done,
                    remaining: selection.selected().len(),
                });
            }
        }

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same state and channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
