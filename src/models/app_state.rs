use super::item::DisplayKey;
use super::selection::OrderedSelection;
use std::collections::BTreeSet;

/// Smallest and largest picture sizes accepted for thumbnails.
pub const MIN_PICTURE_SIZE: u32 = 32;
pub const MAX_PICTURE_SIZE: u32 = 1024;

/// Picture size used when nothing is configured.
pub const DEFAULT_PICTURE_SIZE: u32 = 100;

/// Application state: the two-list model plus the view state around it.
///
/// Owned by [`StateManager`](crate::state::StateManager); mutate it through
/// `StateManager::update()` so change events are emitted.
#[derive(Debug, Clone)]
pub struct AppState {
    pub selection: OrderedSelection,

    /// Edge length of the square box thumbnails are fitted into
    pub picture_size: u32,

    /// Highlighted rows of the Available list
    pub available_highlight: BTreeSet<usize>,

    /// Highlighted rows of the Selected list
    pub selected_highlight: BTreeSet<usize>,

    /// Whether directory loads descend into subdirectories
    pub recursive: bool,

    pub is_exporting: bool,
    pub export_done: usize,
    pub export_total: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            selection: OrderedSelection::new(DisplayKey::default()),
            picture_size: DEFAULT_PICTURE_SIZE,
            available_highlight: BTreeSet::new(),
            selected_highlight: BTreeSet::new(),
            recursive: false,
            is_exporting: false,
            export_done: 0,
            export_total: 0,
        }
    }
}

impl AppState {
    /// Row of Selected that newly selected items are inserted before.
    pub fn selection_anchor(&self) -> Option<usize> {
        self.selected_highlight.first().copied()
    }

    /// Drop highlighted rows that no longer exist.
    pub fn clamp_highlights(&mut self) {
        let available = self.selection.available().len();
        let selected = self.selection.selected().len();
        self.available_highlight.retain(|&row| row < available);
        self.selected_highlight.retain(|&row| row < selected);
    }

    /// Replace a highlight with a single row, or clear it.
    pub fn focus(highlight: &mut BTreeSet<usize>, row: Option<usize>) {
        highlight.clear();
        highlight.extend(row);
    }

    pub fn clamp_picture_size(size: u32) -> u32 {
        size.clamp(MIN_PICTURE_SIZE, MAX_PICTURE_SIZE)
    }

    /// Export progress as `(done, total)`.
    pub fn export_progress(&self) -> (usize, usize) {
        (self.export_done, self.export_total)
    }
}
