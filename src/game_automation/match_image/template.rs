//! Reference assets: named still images loaded once from the template directory

use super::frame::to_gray;
use super::region::SearchRegion;
use image::{GrayImage, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const START_BUTTON: &str = "btn_start";
pub const RETRY_BUTTON: &str = "btn_retry";
pub const CARD_FRAME: &str = "card_frame";
pub const CHOICE_BOX: &str = "choice_box";
pub const PURCHASE_FAILED: &str = "purchase_failed";
/// Feature-matched: the special reward box circle.
pub const SPECIAL_BOX: &str = "btn_specialbox_circle";
/// Feature-matched: the retry banner in the card screen's corner.
pub const RETRY_BANNER: &str = "btn_retry_banner";

/// Sub-directory holding one glyph per card id.
pub const CARD_NAMESPACE: &str = "cards";

pub type AssetResult<T> = Result<T, AssetError>;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Template directory not found: {path:?}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load template {path:?}: {source}")]
    Load {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Searched for by correlation.
    Correlation,
    /// Matched by invariant keypoints.
    Feature,
    /// One card id glyph.
    CardGlyph,
}

/// A reference image, immutable once loaded.
#[derive(Debug, Clone)]
pub struct ReferenceAsset {
    pub name: String,
    pub path: PathBuf,
    pub kind: AssetKind,
    /// Where in the frame to search; the full frame unless the filename says otherwise.
    pub search_region: SearchRegion,
    pub gray: GrayImage,
}

impl ReferenceAsset {
    pub fn load(path: &Path, in_card_namespace: bool) -> AssetResult<Self> {
        let image = image::open(path).map_err(|source| AssetError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        Ok(Self::from_image(stem, path.to_path_buf(), image.to_rgb8(), in_card_namespace))
    }

    /// Build an asset from an in-memory image. `stem` may carry a
    /// `-[x,y,w,h]` search-region suffix.
    pub fn from_image(stem: &str, path: PathBuf, image: RgbImage, in_card_namespace: bool) -> Self {
        let name = Self::strip_region_suffix(stem);
        let kind = if in_card_namespace {
            AssetKind::CardGlyph
        } else if name == SPECIAL_BOX || name == RETRY_BANNER {
            AssetKind::Feature
        } else {
            AssetKind::Correlation
        };
        let search_region =
            SearchRegion::parse_from_filename(stem).unwrap_or_else(SearchRegion::full_screen);
        Self {
            name,
            path,
            kind,
            search_region,
            gray: to_gray(&image),
        }
    }

    fn strip_region_suffix(stem: &str) -> String {
        match stem.find('[') {
            Some(idx) => stem[..idx].trim_end_matches(['-', '_']).to_string(),
            None => stem.to_string(),
        }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

/// All reference assets, keyed by logical name.
#[derive(Debug, Default)]
pub struct AssetStore {
    templates: HashMap<String, ReferenceAsset>,
    /// Card glyphs, sorted by id for a stable scan order.
    cards: Vec<ReferenceAsset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively load every `*.png` under `directory`. Files inside a
    /// `cards/` sub-directory become card glyphs.
    pub fn load_from_directory(directory: impl AsRef<Path>) -> AssetResult<Self> {
        let directory = directory.as_ref();
        if !directory.exists() {
            return Err(AssetError::DirectoryNotFound {
                path: directory.to_path_buf(),
            });
        }

        let mut store = Self::new();
        store.scan(directory, false)?;
        store.cards.sort_by(|a, b| a.name.cmp(&b.name));
        log::info!(
            "Loaded {} templates and {} card glyphs from {:?}",
            store.templates.len(),
            store.cards.len(),
            directory
        );
        Ok(store)
    }

    fn scan(&mut self, dir: &Path, in_card_namespace: bool) -> AssetResult<()> {
        let entries = std::fs::read_dir(dir).map_err(|source| AssetError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let is_cards = in_card_namespace
                    || path.file_name().and_then(|n| n.to_str()) == Some(CARD_NAMESPACE);
                self.scan(&path, is_cards)?;
                continue;
            }
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if !is_png {
                continue;
            }
            match ReferenceAsset::load(&path, in_card_namespace) {
                Ok(asset) => {
                    log::debug!("Loaded template {} ({:?})", asset.name, asset.kind);
                    self.insert(asset);
                }
                Err(e) => log::warn!("⚠️ Skipping template: {}", e),
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, asset: ReferenceAsset) {
        if asset.kind == AssetKind::CardGlyph {
            self.cards.retain(|c| c.name != asset.name);
            self.cards.push(asset);
        } else {
            self.templates.insert(asset.name.clone(), asset);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceAsset> {
        self.templates.get(name)
    }

    pub fn card_glyphs(&self) -> &[ReferenceAsset] {
        &self.cards
    }

    pub fn count(&self) -> usize {
        self.templates.len() + self.cards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([200, 100, 50]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_region_suffix_is_stripped_from_name() {
        let asset = ReferenceAsset::from_image(
            "btn_start-[700,700,400,150]",
            PathBuf::from("btn_start-[700,700,400,150].png"),
            RgbImage::new(20, 10),
            false,
        );
        assert_eq!(asset.name, START_BUTTON);
        assert_eq!(asset.kind, AssetKind::Correlation);
        assert_eq!(asset.search_region.x, 700);
        assert_eq!((asset.width(), asset.height()), (20, 10));
    }

    #[test]
    fn test_feature_assets_are_recognised_by_name() {
        let asset =
            ReferenceAsset::from_image(SPECIAL_BOX, PathBuf::new(), RgbImage::new(4, 4), false);
        assert_eq!(asset.kind, AssetKind::Feature);
        assert_eq!(asset.search_region, SearchRegion::full_screen());
    }

    #[test]
    fn test_load_directory_recurses_and_separates_cards() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("btn_retry.png"), 30, 20);
        std::fs::create_dir_all(dir.path().join("ui")).unwrap();
        write_png(&dir.path().join("ui").join("choice_box.png"), 30, 20);
        std::fs::create_dir_all(dir.path().join("cards")).unwrap();
        write_png(&dir.path().join("cards").join("132.png"), 40, 20);
        write_png(&dir.path().join("cards").join("017.png"), 40, 20);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = AssetStore::load_from_directory(dir.path()).unwrap();
        assert!(store.get(RETRY_BUTTON).is_some());
        assert!(store.get(CHOICE_BOX).is_some());
        assert!(store.get("132").is_none());
        let ids: Vec<&str> = store.card_glyphs().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(ids, vec!["017", "132"]);
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let err = AssetStore::load_from_directory("/definitely/not/here").unwrap_err();
        assert!(matches!(err, AssetError::DirectoryNotFound { .. }));
    }
}
