// Controller - connects user actions to the selection model and the thumbnail task
//
// This module contains the Controller which coordinates between:
// - StateManager (the two lists and the view state)
// - SettingsStore (persisted preferences)
// - The thumbnail CooperativeTask (rendering between user events)
// - The service collaborators (scanner, metadata, thumbnails, export)
//
// Every operation takes &self and runs on the host loop thread, so callbacks
// posted to the EventQueue can call back into the controller while a
// thumbnail pass is yielding at a checkpoint.

use crate::config::{SettingsStore, keys};
use crate::metrics::Metrics;
use crate::models::{AppState, Direction, DisplayKey, Item, Thumbnail, Transfer};
use crate::services::{
    DirectoryLister, ExifReader, ExportPlan, FsLister, ImageThumbnailer, MetadataReader,
    NamingTemplate, ThumbnailProvider, export_item, suggest_template,
};
use crate::state::{StateChange, StateManager};
use crate::task::{
    Checkpoint, CooperativeTask, HostLoop, RerunPolicy, TaskError, TaskStats, TaskStep,
};
use crate::ui::bridge::EventQueue;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;
use std::time::Instant;

/// Digit count offered when nothing is configured
const DEFAULT_DECIMALS: u32 = 4;

/// One pass of the thumbnail task: render every item that lacks a thumbnail
/// at the current picture size, Selected first.
struct ThumbnailPass {
    state: StateManager,
    provider: Rc<dyn ThumbnailProvider>,
    metrics: Rc<Metrics>,
}

impl ThumbnailPass {
    fn render_one(&self, path: &Utf8Path, size: u32) {
        // The item may have been removed or rendered by an earlier yield
        let needed = self.state.read(|s| {
            s.picture_size == size
                && s.selection
                    .get(path)
                    .is_some_and(|item| !item.has_thumbnail_at(size))
        });
        if !needed {
            return;
        }

        match self.provider.render(path, size) {
            Some(image) => {
                self.metrics.record_thumbnail_rendered();
                self.state.update(|s| {
                    s.selection
                        .set_thumbnail(path, Some(Thumbnail { size, image }))
                });
            }
            None => {
                self.metrics.record_thumbnail_failed();
                // Do not keep showing a picture rendered at another size
                self.state.update(|s| {
                    let stale = s.selection.get(path).is_some_and(|i| i.thumbnail.is_some());
                    if stale {
                        s.selection.set_thumbnail(path, None);
                    }
                });
            }
        }
    }
}

impl TaskStep for ThumbnailPass {
    fn step(&mut self, checkpoint: &Checkpoint<'_>) -> Result<(), TaskError> {
        let (size, pending) = self
            .state
            .read(|s| (s.picture_size, s.selection.needing_thumbnail(s.picture_size)));
        tracing::debug!("Rendering {} thumbnails at {}px", pending.len(), size);

        for path in &pending {
            self.render_one(path, size);
            checkpoint.check()?;
        }
        Ok(())
    }
}

/// Controller that wires user actions to application state and services
///
/// This is the main coordinator of the application. It:
/// - Applies user actions to the [`StateManager`] and keeps row highlights
///   pointing at the same items across re-sorts
/// - Restarts the thumbnail task whenever a change may leave thumbnails stale
/// - Runs export batches and reports the first failure
/// - Records preferences in the [`SettingsStore`] and persists them on shutdown
///
/// # Example
/// ```ignore
/// let queue = Rc::new(EventQueue::new());
/// let settings = SettingsStore::load(config_dir)?;
/// let controller = Rc::new(Controller::with_filesystem(queue.clone(), settings));
///
/// controller.load_directory("/photos".into())?;
/// controller.select_highlighted();
/// controller.shutdown();
/// ```
pub struct Controller {
    state: StateManager,
    settings: RefCell<SettingsStore>,
    host: Rc<EventQueue>,

    /// Thumbnail renderer, restarted on every invalidating change
    thumbnails: CooperativeTask,

    lister: Box<dyn DirectoryLister>,
    metadata: Box<dyn MetadataReader>,
    metrics: Rc<Metrics>,
}

impl Controller {
    /// Create a controller with explicit collaborators
    ///
    /// Initial picture size, display key and recursion come from `settings`.
    pub fn new(
        host: Rc<EventQueue>,
        settings: SettingsStore,
        lister: Box<dyn DirectoryLister>,
        metadata: Box<dyn MetadataReader>,
        provider: Rc<dyn ThumbnailProvider>,
    ) -> Self {
        let state = StateManager::with_state(Self::initial_state(&settings));
        let metrics = Rc::new(Metrics::new());

        let pass = ThumbnailPass {
            state: state.clone(),
            provider,
            metrics: Rc::clone(&metrics),
        };
        let host_loop: Rc<dyn HostLoop> = host.clone();
        let thumbnails = CooperativeTask::with_step("thumbnails", host_loop, pass)
            .with_policy(RerunPolicy::Restart);

        tracing::info!("Controller initialized");

        Self {
            state,
            settings: RefCell::new(settings),
            host,
            thumbnails,
            lister,
            metadata,
            metrics,
        }
    }

    /// Create a controller backed by the real file system, EXIF reader and
    /// image decoder
    pub fn with_filesystem(host: Rc<EventQueue>, settings: SettingsStore) -> Self {
        Self::new(
            host,
            settings,
            Box::new(FsLister::new()),
            Box::new(ExifReader),
            Rc::new(ImageThumbnailer::new()),
        )
    }

    fn initial_state(settings: &SettingsStore) -> AppState {
        let mut state = AppState::default();
        state.picture_size =
            AppState::clamp_picture_size(settings.get(keys::PICTURE_SIZE, state.picture_size));
        state
            .selection
            .set_display_key(settings.get(keys::DISPLAY_KEY, DisplayKey::default()));
        state.recursive = settings.get(keys::RECURSIVE, false);
        state
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn host(&self) -> &Rc<EventQueue> {
        &self.host
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn thumbnail_stats(&self) -> TaskStats {
        self.thumbnails.stats()
    }

    pub fn is_rendering(&self) -> bool {
        self.thumbnails.is_running()
    }

    /// Read a setting
    pub fn setting<T: serde::de::DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.settings.borrow().get(key, default)
    }

    /// Record a setting; written on the next persist
    pub fn set_setting<T: serde::Serialize>(&self, key: &str, value: T) {
        self.settings.borrow_mut().set(key, value);
    }

    /// Apply an update, record it and restart the thumbnail task if needed
    fn apply<F, R>(&self, update_fn: F) -> R
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let (result, changes) = self.state.update(update_fn);
        self.metrics.record_state_update(changes.len());
        self.after_update(&changes);
        result
    }

    fn after_update(&self, changes: &[StateChange]) {
        if changes.iter().any(StateChange::invalidates_thumbnails) {
            self.refresh_thumbnails();
        }
    }

    /// Run the thumbnail task, or ask the running pass to start over
    pub fn refresh_thumbnails(&self) {
        if let Err(e) = self.thumbnails.run() {
            tracing::error!("Thumbnail rendering failed: {:#}", e);
        }
    }

    /// Add the images found under `root` to Available
    ///
    /// # Returns
    /// The number of new items
    ///
    /// # Errors
    /// Fails when `root` cannot be listed.
    pub fn load_directory(&self, root: &Utf8Path) -> Result<usize> {
        let (recursive, exclude) = self.state.read(|s| {
            let exclude: HashSet<Utf8PathBuf> =
                s.selection.ids().map(Utf8Path::to_path_buf).collect();
            (s.recursive, exclude)
        });

        let paths = self
            .lister
            .list_images(root, recursive, &exclude)
            .with_context(|| format!("Failed to load directory {}", root))?;

        self.set_setting(keys::LAST_DIR, root.as_str());
        Ok(self.load_paths(paths))
    }

    /// Add individual files to Available, reading their metadata
    ///
    /// # Returns
    /// The number of new items
    pub fn load_paths<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = Utf8PathBuf>,
    {
        let items: Vec<Item> = paths
            .into_iter()
            .map(|path| {
                let capture_date = self.metadata.capture_date(&path);
                Item::new(path, capture_date)
            })
            .collect();

        let added = self.apply(|s| {
            let highlighted = ids_at(s.selection.available(), &s.available_highlight);
            let added = s.selection.load(items);
            s.available_highlight = rows_of(s.selection.available(), &highlighted);
            added
        });

        tracing::info!("Loaded {} new items", added);
        added
    }

    /// Replace the highlighted rows of Available
    pub fn highlight_available(&self, rows: impl IntoIterator<Item = usize>) {
        self.state.update(|s| s.available_highlight = rows.into_iter().collect());
    }

    /// Replace the highlighted rows of Selected
    pub fn highlight_selected(&self, rows: impl IntoIterator<Item = usize>) {
        self.state.update(|s| s.selected_highlight = rows.into_iter().collect());
    }

    /// Move items to Selected, before the first highlighted Selected row
    ///
    /// The moved items become the Selected highlight and focus in Available
    /// moves to the row after the gap they left.
    pub fn select(&self, ids: &[Utf8PathBuf]) -> Transfer {
        self.apply(|s| {
            let anchor = s.selection_anchor();
            let transfer = s.selection.select(ids, anchor);
            if !transfer.is_empty() {
                AppState::focus(&mut s.available_highlight, transfer.next_focus);
                s.selected_highlight = transfer.moved.iter().copied().collect();
            }
            transfer
        })
    }

    pub fn select_highlighted(&self) -> Transfer {
        let ids = self.state.read(|s| {
            paths_at(s.selection.available(), &s.available_highlight)
        });
        self.select(&ids)
    }

    /// Move items back to Available, which re-sorts them into place
    pub fn deselect(&self, ids: &[Utf8PathBuf]) -> Transfer {
        self.apply(|s| {
            let transfer = s.selection.deselect(ids);
            if !transfer.is_empty() {
                AppState::focus(&mut s.selected_highlight, transfer.next_focus);
                s.available_highlight = transfer.moved.iter().copied().collect();
            }
            transfer
        })
    }

    pub fn deselect_highlighted(&self) -> Transfer {
        let ids = self.state.read(|s| {
            paths_at(s.selection.selected(), &s.selected_highlight)
        });
        self.deselect(&ids)
    }

    /// Shift the highlighted Selected rows one position up.
    ///
    /// Returns false when nothing moved.
    pub fn move_up(&self) -> bool {
        self.reorder(Direction::Up)
    }

    /// Shift the highlighted Selected rows one position down.
    ///
    /// Returns false when nothing moved.
    pub fn move_down(&self) -> bool {
        self.reorder(Direction::Down)
    }

    fn reorder(&self, direction: Direction) -> bool {
        self.apply(|s| {
            let rows: Vec<usize> = s.selected_highlight.iter().copied().collect();
            match s.selection.reorder(&rows, direction) {
                Some(shifted) => {
                    s.selected_highlight = shifted.into_iter().collect();
                    true
                }
                None => false,
            }
        })
    }

    /// Order Available by `key`; Selected keeps its manual order
    pub fn set_display_key(&self, key: DisplayKey) {
        self.apply(|s| {
            let highlighted = ids_at(s.selection.available(), &s.available_highlight);
            s.selection.set_display_key(key);
            s.available_highlight = rows_of(s.selection.available(), &highlighted);
        });
    }

    /// Sort Selected once by `key`
    pub fn resequence_selected(&self, key: DisplayKey) {
        self.apply(|s| {
            let highlighted = ids_at(s.selection.selected(), &s.selected_highlight);
            s.selection.resequence_selected(key);
            s.selected_highlight = rows_of(s.selection.selected(), &highlighted);
        });
    }

    /// Change the thumbnail size; the value is clamped to the supported range
    ///
    /// # Returns
    /// The size actually applied
    pub fn set_picture_size(&self, size: u32) -> u32 {
        let size = AppState::clamp_picture_size(size);
        self.apply(|s| s.picture_size = size);
        size
    }

    /// Suggest a naming template for `target_dir` from the remembered prefix
    /// and digit count
    pub fn suggest_export(&self, target_dir: &Utf8Path) -> Result<NamingTemplate> {
        let prefix: String = self.setting(keys::PREFIX, String::new());
        let digits: u32 = self.setting(keys::DECIMALS, DEFAULT_DECIMALS);
        suggest_template(target_dir, &prefix, digits.clamp(1, crate::services::MAX_DIGITS))
    }

    /// Copy or move every Selected item to the plan's target, in list order
    ///
    /// Each exported item is removed from Selected. The first failure aborts
    /// the batch and leaves the remaining items in Selected.
    ///
    /// # Returns
    /// The number of files exported
    ///
    /// # Errors
    /// Fails when the plan is invalid, an export is already running or a file
    /// operation fails.
    pub fn export(&self, plan: &ExportPlan) -> Result<usize> {
        plan.validate()?;
        if self.state.read(|s| s.is_exporting) {
            bail!("An export is already in progress");
        }

        let batch: Vec<Utf8PathBuf> = self
            .state
            .read(|s| s.selection.selected().iter().map(|i| i.path.clone()).collect());
        if batch.is_empty() {
            tracing::info!("Nothing selected, skipping export");
            return Ok(0);
        }

        {
            let mut settings = self.settings.borrow_mut();
            settings.set(keys::LAST_TARGET_DIR, plan.target_dir.as_str());
            settings.set(keys::PREFIX, plan.template.prefix.as_str());
            settings.set(keys::DECIMALS, plan.template.digits);
        }

        tracing::info!(
            "Exporting {} files to {} ({})",
            batch.len(),
            plan.target_dir,
            plan.mode
        );
        let started = Instant::now();
        let total = batch.len();
        let mut changes = Vec::new();

        let (_, begun) = self.state.update(|s| {
            s.is_exporting = true;
            s.export_done = 0;
            s.export_total = total;
        });
        changes.extend(begun);

        let mut failure = None;
        for (offset, path) in batch.iter().enumerate() {
            let target = plan.target_for(offset as u64, path);
            if let Err(e) = export_item(path, &target, plan.mode) {
                self.metrics.record_export_failure();
                tracing::error!("Export aborted: {}", e);
                failure = Some(e);
                break;
            }

            self.metrics.record_item_exported();
            let (_, committed) = self.state.update(|s| {
                s.selection.remove_committed(path);
                s.export_done += 1;
            });
            changes.extend(committed);
        }

        let (exported, finished) = self.state.update(|s| {
            s.is_exporting = false;
            s.export_done
        });
        changes.extend(finished);

        self.metrics.record_export_time(started.elapsed());
        self.metrics.record_state_update(changes.len());
        self.after_update(&changes);

        match failure {
            Some(e) => Err(e).with_context(|| {
                format!("Export stopped after {} of {} files", exported, total)
            }),
            None => {
                tracing::info!("Exported {} files", exported);
                Ok(exported)
            }
        }
    }

    /// Stop rendering, record view preferences and persist settings
    pub fn shutdown(&self) {
        self.thumbnails.stop();

        let (picture_size, display_key, recursive) = self.state.read(|s| {
            (s.picture_size, s.selection.display_key(), s.recursive)
        });
        {
            let mut settings = self.settings.borrow_mut();
            settings.set(keys::PICTURE_SIZE, picture_size);
            settings.set(keys::DISPLAY_KEY, display_key);
            settings.set(keys::RECURSIVE, recursive);
            settings.persist();
        }

        self.metrics.log_summary(&self.thumbnails.stats());
        tracing::info!("Controller shut down");
    }

    /// Toggle whether directory loads descend into subdirectories
    pub fn set_recursive(&self, recursive: bool) {
        self.state.update(|s| s.recursive = recursive);
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("thumbnails", &self.thumbnails)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

fn paths_at(list: &[Item], rows: &BTreeSet<usize>) -> Vec<Utf8PathBuf> {
    rows.iter()
        .filter_map(|&row| list.get(row))
        .map(|item| item.path.clone())
        .collect()
}

fn ids_at(list: &[Item], rows: &BTreeSet<usize>) -> HashSet<Utf8PathBuf> {
    paths_at(list, rows).into_iter().collect()
}

fn rows_of(list: &[Item], ids: &HashSet<Utf8PathBuf>) -> BTreeSet<usize> {
    list.iter()
        .enumerate()
        .filter(|(_, item)| ids.contains(&item.path))
        .map(|(row, _)| row)
        .collect()
}
