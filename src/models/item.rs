use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A rendered thumbnail and the picture size it was rendered for.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub size: u32,
    pub image: image::RgbaImage,
}

/// One photo.
///
/// The path is the identity; it is unique within an [`OrderedSelection`](super::OrderedSelection).
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub path: Utf8PathBuf,

    /// Load-order counter assigned by the selection model, used as tiebreak
    pub index: u64,

    pub file_name: String,

    /// EXIF capture time, if the file has one
    pub capture_date: Option<NaiveDateTime>,

    pub thumbnail: Option<Thumbnail>,
}

impl Item {
    /// Create an item that has not been loaded into a selection model yet.
    pub fn new(path: impl Into<Utf8PathBuf>, capture_date: Option<NaiveDateTime>) -> Self {
        let path = path.into();
        let file_name = path.file_name().unwrap_or(path.as_str()).to_string();
        Self {
            path,
            index: 0,
            file_name,
            capture_date,
            thumbnail: None,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// True when a thumbnail exists for exactly this picture size.
    pub fn has_thumbnail_at(&self, size: u32) -> bool {
        self.thumbnail.as_ref().is_some_and(|t| t.size == size)
    }
}

/// Attribute that orders the Available list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayKey {
    /// Load order
    #[default]
    Index,
    Name,
    Date,
    DateName,
}

impl DisplayKey {
    pub const ALL: [DisplayKey; 4] = [
        DisplayKey::Index,
        DisplayKey::Name,
        DisplayKey::Date,
        DisplayKey::DateName,
    ];

    /// Total order over items: the key itself, then insertion index.
    ///
    /// A missing capture date orders before every real date.
    pub fn compare(self, a: &Item, b: &Item) -> Ordering {
        let primary = match self {
            DisplayKey::Index => Ordering::Equal,
            DisplayKey::Name => a.file_name.cmp(&b.file_name),
            DisplayKey::Date => a.capture_date.cmp(&b.capture_date),
            DisplayKey::DateName => a
                .capture_date
                .cmp(&b.capture_date)
                .then_with(|| a.file_name.cmp(&b.file_name)),
        };
        primary.then_with(|| a.index.cmp(&b.index))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayKey::Index => "index",
            DisplayKey::Name => "name",
            DisplayKey::Date => "date",
            DisplayKey::DateName => "date-name",
        }
    }
}

impl fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown display key '{0}' (expected index, name, date or date-name)")]
pub struct ParseDisplayKeyError(String);

impl FromStr for DisplayKey {
    type Err = ParseDisplayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplayKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseDisplayKeyError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(name: &str, index: u64, date: Option<(i32, u32, u32)>) -> Item {
        let date = date.map(|(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        });
        let mut item = Item::new(format!("/photos/{name}"), date);
        item.index = index;
        item
    }

    #[test]
    fn test_item_file_name() {
        let item = Item::new("/photos/2024/IMG_0001.JPG", None);
        assert_eq!(item.file_name, "IMG_0001.JPG");
        assert!(!item.has_thumbnail_at(100));
    }

    #[test]
    fn test_index_key_uses_insertion_order() {
        let a = item("z.jpg", 0, None);
        let b = item("a.jpg", 1, None);
        assert_eq!(DisplayKey::Index.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_name_tiebreak_on_index() {
        let a = item("same.jpg", 5, None);
        let b = item("same.jpg", 2, None);
        assert_eq!(DisplayKey::Name.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_missing_date_sorts_first() {
        let dated = item("a.jpg", 0, Some((2020, 1, 1)));
        let undated = item("b.jpg", 1, None);
        assert_eq!(DisplayKey::Date.compare(&undated, &dated), Ordering::Less);
    }

    #[test]
    fn test_date_name_key() {
        let a = item("b.jpg", 0, Some((2020, 1, 1)));
        let b = item("a.jpg", 1, Some((2020, 1, 1)));
        let c = item("a.jpg", 2, Some((2019, 1, 1)));
        assert_eq!(DisplayKey::DateName.compare(&a, &b), Ordering::Greater);
        assert_eq!(DisplayKey::DateName.compare(&c, &b), Ordering::Less);
        // Date alone falls back to the insertion index
        assert_eq!(DisplayKey::Date.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_display_key_parse() {
        assert_eq!("name".parse::<DisplayKey>().unwrap(), DisplayKey::Name);
        assert_eq!("Date-Name".parse::<DisplayKey>().unwrap(), DisplayKey::DateName);
        assert!("size".parse::<DisplayKey>().is_err());

        for key in DisplayKey::ALL {
            assert_eq!(key.to_string().parse::<DisplayKey>().unwrap(), key);
        }
    }
}
