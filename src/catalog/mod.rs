//! Region catalog: which rectangle of the frame holds which field.
//!
//! A catalog is built once per target resolution, either from the built-in
//! 1920x1080 layout or from a JSON file produced by calibration tooling, and
//! is read-only afterwards.

pub mod builtin;
pub mod profile;
pub mod region;

pub use builtin::default_catalog;
pub use profile::PreprocessProfile;
pub use region::{ColumnBand, RecognitionHints, Region, RegionRole};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{CatalogError, ExtractError};

/// One region as stored in a catalog file. The name is the map key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionEntry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub role: RegionRole,
    #[serde(default)]
    pub profile: PreprocessProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_band: Option<ColumnBand>,
    #[serde(default, skip_serializing_if = "RecognitionHints::is_empty")]
    pub recognition: RecognitionHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// On-disk catalog document for one resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogFile {
    pub version: String,
    pub resolution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub regions: BTreeMap<String, RegionEntry>,
}

/// Immutable registry from field name to region.
#[derive(Clone, Debug)]
pub struct RegionCatalog {
    resolution: String,
    regions: BTreeMap<String, Region>,
}

impl RegionCatalog {
    /// Builds a catalog, validating every region and rejecting duplicate names.
    pub fn from_regions(
        resolution: &str,
        regions: impl IntoIterator<Item = Region>,
    ) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for region in regions {
            region.validate()?;
            if map.contains_key(&region.name) {
                return Err(CatalogError::DuplicateRegion(region.name));
            }
            map.insert(region.name.clone(), region);
        }
        Ok(Self {
            resolution: resolution.to_string(),
            regions: map,
        })
    }

    /// Builds a catalog from regions known to be valid and uniquely named.
    pub(crate) fn from_trusted(resolution: &str, regions: Vec<Region>) -> Self {
        Self {
            resolution: resolution.to_string(),
            regions: regions.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    /// Looks up a field's region.
    pub fn resolve(&self, field: &str) -> Result<&Region, ExtractError> {
        self.regions
            .get(field)
            .ok_or_else(|| ExtractError::UnknownField(field.to_string()))
    }

    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// All regions in name order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Regions parsed by the scalar field parser, in name order.
    pub fn scalar_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions
            .values()
            .filter(|r| r.role.field_kind().is_some())
    }

    /// First region (in name order) with the given role.
    pub fn find_role(&self, role: RegionRole) -> Option<&Region> {
        self.regions.values().find(|r| r.role == role)
    }

    /// Builds a catalog from its file representation.
    pub fn from_file_format(file: CatalogFile) -> Result<Self, CatalogError> {
        let regions = file.regions.into_iter().map(|(name, entry)| Region {
            name,
            x: entry.x,
            y: entry.y,
            width: entry.width,
            height: entry.height,
            role: entry.role,
            profile: entry.profile,
            column_band: entry.column_band,
            recognition: entry.recognition,
        });
        Self::from_regions(&file.resolution, regions)
    }

    /// Converts back to the file representation.
    pub fn to_file_format(&self) -> CatalogFile {
        let regions = self
            .regions
            .values()
            .map(|r| {
                (
                    r.name.clone(),
                    RegionEntry {
                        x: r.x,
                        y: r.y,
                        width: r.width,
                        height: r.height,
                        role: r.role,
                        profile: r.profile,
                        column_band: r.column_band,
                        recognition: r.recognition.clone(),
                        note: None,
                    },
                )
            })
            .collect();
        CatalogFile {
            version: "1.0.0".to_string(),
            resolution: self.resolution.clone(),
            created: None,
            notes: None,
            regions,
        }
    }

    /// Loads a catalog from a specific JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
        let catalog = Self::from_file_format(file)
            .with_context(|| format!("Invalid catalog file: {}", path.display()))?;

        info!(
            "Loaded catalog {} ({} regions) from {}",
            catalog.resolution,
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Loads the first catalog in `dir` whose file name starts with `WxH`,
    /// e.g. `1920x1080_v1.67.0.json`.
    pub fn load_for_resolution(dir: &Path, width: u32, height: u32) -> Result<Self> {
        let path = find_catalog_file(dir, width, height)?
            .ok_or(CatalogError::NoConfigForResolution { width, height })?;
        Self::load_from_file(&path)
    }
}

/// Scans `dir` for a `WxH*.json` catalog, in file name order.
fn find_catalog_file(dir: &Path, width: u32, height: u32) -> Result<Option<PathBuf>> {
    let resolution = format!("{}x{}", width, height);

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read catalog directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.starts_with(&resolution))
        })
        .collect();
    candidates.sort();

    debug!(
        "Catalog candidates for {}: {:?}",
        resolution,
        candidates
    );
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_catalog(dir: &Path, file_name: &str, catalog: &RegionCatalog) -> PathBuf {
        let path = dir.join(file_name);
        let json = serde_json::to_string_pretty(&catalog.to_file_format()).unwrap();
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let catalog = default_catalog();
        let speed = catalog.resolve("speed").unwrap();
        assert_eq!(speed.as_tuple(), (693, 44, 71, 61));

        let err = catalog.resolve("wattage").unwrap_err();
        assert!(matches!(err, ExtractError::UnknownField(ref name) if name == "wattage"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = RegionCatalog::from_regions(
            "test",
            vec![
                Region::new("speed", (0, 0, 10, 10), RegionRole::Integer),
                Region::new("speed", (5, 5, 10, 10), RegionRole::Integer),
            ],
        );
        assert!(matches!(result, Err(CatalogError::DuplicateRegion(_))));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(dir.path(), "custom.json", &default_catalog());

        let loaded = RegionCatalog::load_from_file(&path).unwrap();
        assert_eq!(loaded.len(), default_catalog().len());
        assert_eq!(
            loaded.resolve("gradient").unwrap(),
            default_catalog().resolve("gradient").unwrap()
        );
    }

    #[test]
    fn test_load_for_resolution() {
        let dir = TempDir::new().unwrap();
        write_catalog(dir.path(), "1920x1080_v1.67.0.json", &default_catalog());
        fs::write(dir.path().join("notes.txt"), "not a catalog").unwrap();

        let loaded = RegionCatalog::load_for_resolution(dir.path(), 1920, 1080).unwrap();
        assert_eq!(loaded.resolution(), "1920x1080");

        let missing = RegionCatalog::load_for_resolution(dir.path(), 2560, 1440);
        assert!(missing.is_err());
    }

    #[test]
    fn test_file_with_minimal_region() {
        let json = r#"{
            "version": "1.0.0",
            "resolution": "1280x720",
            "regions": {
                "power": {"x": 178, "y": 32, "width": 78, "height": 40, "role": "integer"}
            }
        }"#;
        let file: CatalogFile = serde_json::from_str(json).unwrap();
        let catalog = RegionCatalog::from_file_format(file).unwrap();
        let power = catalog.resolve("power").unwrap();
        assert_eq!(power.profile, PreprocessProfile::default());
        assert_eq!(power.column_band, None);
        assert!(power.recognition.is_empty());
    }

    #[test]
    fn test_file_with_recognition_hints() {
        let json = r#"{
            "version": "1.0.0",
            "resolution": "1280x720",
            "regions": {
                "leaderboard": {
                    "x": 1000, "y": 133, "width": 280, "height": 400, "role": "leaderboard",
                    "recognition": {"page_segmentation_mode": 6}
                },
                "gradient": {
                    "x": 1130, "y": 47, "width": 33, "height": 33, "role": "decimal",
                    "recognition": {"char_whitelist": "0123456789.-%"}
                }
            }
        }"#;
        let file: CatalogFile = serde_json::from_str(json).unwrap();
        let catalog = RegionCatalog::from_file_format(file).unwrap();

        let board = catalog.resolve("leaderboard").unwrap();
        assert_eq!(board.recognition.page_segmentation_mode, Some(6));
        assert_eq!(board.recognition.char_whitelist, None);

        let gradient = catalog.resolve("gradient").unwrap();
        assert_eq!(gradient.recognition.char_whitelist.as_deref(), Some("0123456789.-%"));
    }

    #[test]
    fn test_scalar_regions_exclude_structured() {
        let catalog = default_catalog();
        assert!(catalog.scalar_regions().all(|r| r.role.field_kind().is_some()));
        assert!(catalog.find_role(RegionRole::Leaderboard).is_some());
        assert!(catalog.find_role(RegionRole::Silhouette).is_some());
    }
}
