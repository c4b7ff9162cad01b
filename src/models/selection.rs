//! Two disjoint ordered lists: photos still available and photos chosen for export.
//!
//! Available is always sorted by the active [`DisplayKey`]. Selected keeps the
//! order the user gives it and is never touched by display-key changes.
//! Every loaded identity lives in exactly one of the two lists; moves transfer
//! ownership of the [`Item`] itself.
//!
//! Operations are forgiving about stale input. Identities that are unknown or
//! on the wrong side, and rows out of range, are ignored, because a click can
//! be handled after the list it refers to has already changed.

use super::item::{DisplayKey, Item, Thumbnail};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

/// Which list an item currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Available,
    Selected,
}

/// Direction for [`OrderedSelection::reorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Outcome of moving items between the lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Rows the moved items occupy in the destination list, ascending
    pub moved: Vec<usize>,

    /// Row to focus next in the source list: the one right after the gap
    /// left by the moved items, clamped. `None` when the source is empty.
    pub next_focus: Option<usize>,
}

impl Transfer {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
    }
}

/// Change counters, cheap to compare for change detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    /// Items added by a bulk load
    pub loaded: u64,
    /// Items moved between lists or removed
    pub moved: u64,
    /// Selected list reordered or re-sequenced
    pub reordered: u64,
    /// Thumbnails stored or cleared
    pub thumbnails: u64,
}

/// Where an item lives: its list and its row there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    side: Side,
    row: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OrderedSelection {
    available: Vec<Item>,
    selected: Vec<Item>,
    /// Kept in step with both lists after every reordering operation
    slots: HashMap<Utf8PathBuf, Slot>,
    /// Number of stored thumbnails per rendered size
    rendered: HashMap<u32, usize>,
    display_key: DisplayKey,
    next_index: u64,
    revisions: Revisions,
}

impl OrderedSelection {
    pub fn new(display_key: DisplayKey) -> Self {
        Self {
            display_key,
            ..Self::default()
        }
    }

    pub fn available(&self) -> &[Item] {
        &self.available
    }

    pub fn selected(&self) -> &[Item] {
        &self.selected
    }

    pub fn display_key(&self) -> DisplayKey {
        self.display_key
    }

    pub fn revisions(&self) -> Revisions {
        self.revisions
    }

    /// Number of loaded items across both lists.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.slots.contains_key(path)
    }

    pub fn side_of(&self, path: &Utf8Path) -> Option<Side> {
        self.slots.get(path).map(|slot| slot.side)
    }

    /// Current row of an item in its list.
    pub fn row_of(&self, path: &Utf8Path) -> Option<usize> {
        self.slots.get(path).map(|slot| slot.row)
    }

    /// Identities of every loaded item.
    pub fn ids(&self) -> impl Iterator<Item = &Utf8Path> {
        self.slots.keys().map(Utf8PathBuf::as_path)
    }

    pub fn get(&self, path: &Utf8Path) -> Option<&Item> {
        let slot = self.slots.get(path)?;
        let list = match slot.side {
            Side::Available => &self.available,
            Side::Selected => &self.selected,
        };
        list.get(slot.row)
    }

    fn get_mut(&mut self, path: &Utf8Path) -> Option<&mut Item> {
        let slot = *self.slots.get(path)?;
        let list = match slot.side {
            Side::Available => &mut self.available,
            Side::Selected => &mut self.selected,
        };
        list.get_mut(slot.row)
    }

    /// Add new items to Available, assigning insertion indices in the given
    /// order. Identities already loaded are skipped. Returns how many were added.
    pub fn load(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
        let mut added = 0;
        for mut item in items {
            if self.slots.contains_key(&item.path) {
                tracing::debug!("Skipping already loaded item: {}", item.path);
                continue;
            }
            item.index = self.next_index;
            self.next_index += 1;
            let side = Side::Available;
            let row = self.available.len();
            self.slots.insert(item.path.clone(), Slot { side, row });
            self.track_thumbnail(None, item.thumbnail.as_ref().map(|t| t.size));
            self.available.push(item);
            added += 1;
        }

        if added > 0 {
            self.sort_available();
            self.revisions.loaded += 1;
        }
        added
    }

    /// Move items from Available to Selected.
    ///
    /// Moved items keep their Available order and are inserted before row
    /// `anchor` of Selected (typically the first highlighted row there), or
    /// appended when there is no anchor.
    pub fn select(&mut self, ids: &[Utf8PathBuf], anchor: Option<usize>) -> Transfer {
        let rows = self.rows_on(Side::Available, ids);
        if rows.is_empty() {
            return Transfer::default();
        }

        let moving = take_rows(&mut self.available, &rows);
        let position = anchor.map_or(self.selected.len(), |a| a.min(self.selected.len()));
        let count = moving.len();
        self.selected.splice(position..position, moving);
        self.reindex(Side::Available);
        self.reindex(Side::Selected);
        self.revisions.moved += 1;

        Transfer {
            moved: (position..position + count).collect(),
            next_focus: focus_after_gap(&rows, self.available.len()),
        }
    }

    /// Move items from Selected back to Available, which is re-sorted.
    pub fn deselect(&mut self, ids: &[Utf8PathBuf]) -> Transfer {
        let rows = self.rows_on(Side::Selected, ids);
        if rows.is_empty() {
            return Transfer::default();
        }

        let moving = take_rows(&mut self.selected, &rows);
        let moved_ids: Vec<Utf8PathBuf> = moving.iter().map(|i| i.path.clone()).collect();
        self.available.extend(moving);
        self.sort_available();
        self.reindex(Side::Selected);
        self.revisions.moved += 1;

        let moved = self.rows_on(Side::Available, &moved_ids);

        Transfer {
            moved,
            next_focus: focus_after_gap(&rows, self.selected.len()),
        }
    }

    /// Shift rows of Selected by one position, keeping their relative order.
    ///
    /// Returns the new rows of the shifted items, or `None` when the request
    /// is rejected: no rows, a row out of range, or a shift past either end.
    pub fn reorder(&mut self, rows: &[usize], direction: Direction) -> Option<Vec<usize>> {
        let mut rows = rows.to_vec();
        rows.sort_unstable();
        rows.dedup();

        let (&first, &last) = (rows.first()?, rows.last()?);
        if last >= self.selected.len() {
            return None;
        }

        let shifted = match direction {
            Direction::Up => {
                if first == 0 {
                    return None;
                }
                for &row in &rows {
                    self.selected.swap(row - 1, row);
                }
                rows.iter().map(|r| r - 1).collect()
            }
            Direction::Down => {
                if last + 1 == self.selected.len() {
                    return None;
                }
                for &row in rows.iter().rev() {
                    self.selected.swap(row, row + 1);
                }
                rows.iter().map(|r| r + 1).collect()
            }
        };

        self.reindex(Side::Selected);
        self.revisions.reordered += 1;
        Some(shifted)
    }

    /// Change the key Available is ordered by and re-sort it.
    pub fn set_display_key(&mut self, key: DisplayKey) {
        self.display_key = key;
        self.sort_available();
    }

    /// Sort Selected once by `key`. Later display-key changes leave it alone.
    pub fn resequence_selected(&mut self, key: DisplayKey) {
        self.selected.sort_by(|a, b| key.compare(a, b));
        self.reindex(Side::Selected);
        self.revisions.reordered += 1;
    }

    /// Remove an item that has been committed by an export.
    pub fn remove_committed(&mut self, path: &Utf8Path) -> Option<Item> {
        if self.side_of(path) != Some(Side::Selected) {
            return None;
        }
        let slot = self.slots.remove(path)?;
        let item = self.selected.remove(slot.row);
        self.reindex(Side::Selected);
        self.track_thumbnail(item.thumbnail.as_ref().map(|t| t.size), None);
        self.revisions.moved += 1;
        Some(item)
    }

    /// Store a rendered thumbnail. Returns false if the item is gone.
    pub fn set_thumbnail(&mut self, path: &Utf8Path, thumbnail: Option<Thumbnail>) -> bool {
        let Some(item) = self.get_mut(path) else {
            return false;
        };
        let old = item.thumbnail.as_ref().map(|t| t.size);
        let new = thumbnail.as_ref().map(|t| t.size);
        item.thumbnail = thumbnail;

        self.track_thumbnail(old, new);
        self.revisions.thumbnails += 1;
        true
    }

    /// Items whose thumbnail is missing or was rendered at another size,
    /// Selected first, each list in display order.
    pub fn needing_thumbnail(&self, size: u32) -> Vec<Utf8PathBuf> {
        self.selected
            .iter()
            .chain(&self.available)
            .filter(|item| !item.has_thumbnail_at(size))
            .map(|item| item.path.clone())
            .collect()
    }

    /// Number of items holding a thumbnail rendered at `size`.
    pub fn rendered_count(&self, size: u32) -> usize {
        self.rendered.get(&size).copied().unwrap_or(0)
    }

    fn sort_available(&mut self) {
        let key = self.display_key;
        self.available.sort_by(|a, b| key.compare(a, b));
        self.reindex(Side::Available);
    }

    /// Rewrite the slot of every item in one list.
    fn reindex(&mut self, side: Side) {
        let list = match side {
            Side::Available => &self.available,
            Side::Selected => &self.selected,
        };
        for (row, item) in list.iter().enumerate() {
            if let Some(slot) = self.slots.get_mut(&item.path) {
                *slot = Slot { side, row };
            }
        }
    }

    /// Rows (ascending, unique) of the given identities that live on `side`.
    fn rows_on(&self, side: Side, ids: &[Utf8PathBuf]) -> Vec<usize> {
        let mut rows: Vec<usize> = ids
            .iter()
            .filter_map(|path| self.slots.get(path))
            .filter(|slot| slot.side == side)
            .map(|slot| slot.row)
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    fn track_thumbnail(&mut self, old: Option<u32>, new: Option<u32>) {
        if let Some(size) = old {
            if let Some(count) = self.rendered.get_mut(&size) {
                *count -= 1;
                if *count == 0 {
                    self.rendered.remove(&size);
                }
            }
        }
        if let Some(size) = new {
            *self.rendered.entry(size).or_default() += 1;
        }
    }
}

/// Remove `rows` (ascending) from `list`, returning the items in list order.
fn take_rows(list: &mut Vec<Item>, rows: &[usize]) -> Vec<Item> {
    let mut taken: Vec<Item> = rows.iter().rev().map(|&row| list.remove(row)).collect();
    taken.reverse();
    taken
}

/// The row that follows the last removed one, after removal, clamped to the
/// remaining length.
fn focus_after_gap(removed_rows: &[usize], remaining: usize) -> Option<usize> {
    let last = *removed_rows.last()?;
    if remaining == 0 {
        return None;
    }
    let after = last + 1 - removed_rows.len();
    Some(after.min(remaining - 1))
}
