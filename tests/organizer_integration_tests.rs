//! End-to-end tests of the controller with the real file system collaborators
//!
//! These tests verify the full workflow:
//! - Scanning a directory tree and rendering thumbnails with the image crate
//! - Picking and ordering photos
//! - Exporting them under a numbered naming scheme that continues the target

use camino::{Utf8Path, Utf8PathBuf};
use image::{Rgba, RgbaImage};
use photo_organizer::services::{ExportMode, ExportPlan, NamingTemplate, suggest_template};
use photo_organizer::{Controller, DisplayKey, EventQueue, SettingsStore, StateChange};
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
}

fn write_png(path: &Utf8Path, width: u32, height: u32) {
    RgbaImage::from_pixel(width, height, Rgba([20, 120, 220, 255]))
        .save(path)
        .unwrap();
}

fn controller() -> (Controller, Rc<EventQueue>) {
    let queue = Rc::new(EventQueue::new());
    let controller = Controller::with_filesystem(Rc::clone(&queue), SettingsStore::in_memory());
    (controller, queue)
}

#[test]
fn test_scan_render_select_export() {
    let photos = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let photos_dir = utf8_dir(&photos);
    let target_dir = utf8_dir(&target);

    write_png(&photos_dir.join("beach.png"), 64, 32);
    write_png(&photos_dir.join("alps.png"), 32, 64);
    fs::create_dir(photos_dir.join("nested")).unwrap();
    write_png(&photos_dir.join("nested").join("city.png"), 40, 40);
    fs::write(photos_dir.join("readme.txt"), "not a photo").unwrap();

    // Existing numbering in the target: next is 13 with 3 digits
    fs::write(target_dir.join("holiday_012.jpg"), "old").unwrap();

    let (controller, _queue) = controller();
    controller.set_recursive(true);
    controller.set_display_key(DisplayKey::Name);
    controller.set_picture_size(48);

    let added = controller.load_directory(&photos_dir).unwrap();
    assert_eq!(added, 3);

    controller.state().read(|s| {
        let names: Vec<&str> = s
            .selection
            .available()
            .iter()
            .map(|i| i.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["alps.png", "beach.png", "city.png"]);
        assert_eq!(s.selection.rendered_count(48), 3);

        let beach = s.selection.get(&photos_dir.join("beach.png")).unwrap();
        let thumb = beach.thumbnail.as_ref().unwrap();
        assert_eq!(thumb.image.dimensions(), (48, 24));
    });

    // Loading the same tree again adds nothing
    assert_eq!(controller.load_directory(&photos_dir).unwrap(), 0);

    controller.highlight_available([2, 0]);
    controller.select_highlighted();
    controller.highlight_selected([1]);
    assert!(controller.move_up());

    let template = suggest_template(&target_dir, "holiday_", 2).unwrap();
    assert_eq!(template, NamingTemplate::new("holiday_", 13, 3).unwrap());

    let mut events = controller.state().subscribe();
    let plan = ExportPlan {
        target_dir: target_dir.clone(),
        template,
        mode: ExportMode::Copy,
    };
    assert_eq!(controller.export(&plan).unwrap(), 2);

    // city was moved above alps
    let city = fs::read(target_dir.join("holiday_013.png")).unwrap();
    let alps = fs::read(target_dir.join("holiday_014.png")).unwrap();
    assert_eq!(city, fs::read(photos_dir.join("nested").join("city.png")).unwrap());
    assert_eq!(alps, fs::read(photos_dir.join("alps.png")).unwrap());
    assert!(photos_dir.join("alps.png").exists());

    let mut saw_started = false;
    let mut saw_finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            StateChange::ExportStarted { total } => {
                assert_eq!(total, 2);
                saw_started = true;
            }
            StateChange::ExportFinished { exported, remaining } => {
                assert_eq!((exported, remaining), (2, 0));
                saw_finished = true;
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_finished);

    let left: Vec<String> = controller
        .state()
        .read(|s| s.selection.available().iter().map(|i| i.file_name.clone()).collect());
    assert_eq!(left, vec!["beach.png"]);
}

#[test]
fn test_corrupt_image_leaves_item_without_thumbnail() {
    let photos = TempDir::new().unwrap();
    let photos_dir = utf8_dir(&photos);
    write_png(&photos_dir.join("good.png"), 20, 20);
    fs::write(photos_dir.join("bad.jpg"), "garbage").unwrap();

    let (controller, _queue) = controller();
    assert_eq!(controller.load_directory(&photos_dir).unwrap(), 2);

    controller.state().read(|s| {
        assert!(s.selection.get(&photos_dir.join("bad.jpg")).unwrap().thumbnail.is_none());
        assert!(s.selection.get(&photos_dir.join("good.png")).unwrap().thumbnail.is_some());
        assert!(s.selection.available().iter().all(|i| i.capture_date.is_none()));
    });
}

#[test]
fn test_flat_scan_ignores_subdirectories() {
    let photos = TempDir::new().unwrap();
    let photos_dir = utf8_dir(&photos);
    write_png(&photos_dir.join("top.png"), 8, 8);
    fs::create_dir(photos_dir.join("sub")).unwrap();
    write_png(&photos_dir.join("sub").join("deep.png"), 8, 8);

    let (controller, _queue) = controller();
    assert_eq!(controller.load_directory(&photos_dir).unwrap(), 1);
}

#[test]
fn test_move_export_removes_sources() {
    let photos = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let photos_dir = utf8_dir(&photos);
    let target_dir = utf8_dir(&target);
    write_png(&photos_dir.join("one.png"), 8, 8);

    let (controller, _queue) = controller();
    controller.load_directory(&photos_dir).unwrap();
    controller.select(&[photos_dir.join("one.png")]);

    let plan = ExportPlan {
        target_dir: target_dir.clone(),
        template: NamingTemplate::new("", 1, 4).unwrap(),
        mode: ExportMode::Move,
    };
    assert_eq!(controller.export(&plan).unwrap(), 1);

    assert!(!photos_dir.join("one.png").exists());
    assert!(target_dir.join("0001.png").exists());
    assert!(controller.state().read(|s| s.selection.is_empty()));
}
