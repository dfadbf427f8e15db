//! Filename-keyed index over a DEM folder tree
//!
//! Walks a folder recursively and keys every plausible HGT source by the
//! `(north, east)` corner encoded in its name. A broken file never stops
//! the walk; it is recorded as a problem string and skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::tile_info::HgtFileInfo;
use crate::dem::{DemEntry, DemFile, DemFolder};
use crate::types::TileKey;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*([ns])(\d{1,2})([ew])(\d{1,3})\.(hgt|zip)$").unwrap()
});

/// Parses a DEM file name into the tile key of its SW corner.
///
/// Accepts the case-insensitive grammar
/// `*[NS]<1-2 digits>[EW]<1-3 digits>.(hgt|zip)`.
pub fn parse_tile_key(name: &str) -> Option<TileKey> {
    let caps = NAME_PATTERN.captures(name)?;

    let north: i32 = caps[2].parse().ok()?;
    let east: i32 = caps[4].parse().ok()?;

    let north = if caps[1].eq_ignore_ascii_case("s") {
        -north
    } else {
        north
    };
    let east = if caps[3].eq_ignore_ascii_case("w") {
        -east
    } else {
        east
    };

    Some(TileKey::new(north, east))
}

/// Immutable index from tile keys to elevation sources
pub struct DemIndex {
    map: HashMap<TileKey, Arc<HgtFileInfo>>,
    problems: Vec<String>,
}

impl DemIndex {
    /// Walks the folder tree and indexes every valid HGT source
    pub fn build(folder: &Arc<dyn DemFolder>) -> Self {
        let mut map: HashMap<TileKey, Arc<HgtFileInfo>> = HashMap::new();
        let mut problems = Vec::new();

        let mut pending: Vec<Arc<dyn DemFolder>> = vec![Arc::clone(folder)];
        while let Some(current) = pending.pop() {
            let entries = match current.entries() {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("DEM folder not readable: {}", e);
                    problems.push(format!("folder not readable: {}", e));
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    DemEntry::Folder(sub) => pending.push(sub),
                    DemEntry::File(file) => {
                        Self::index_file(file, &mut map, &mut problems);
                    }
                }
            }
        }

        Self { map, problems }
    }

    fn index_file(
        file: Arc<dyn DemFile>,
        map: &mut HashMap<TileKey, Arc<HgtFileInfo>>,
        problems: &mut Vec<String>,
    ) {
        let Some(key) = parse_tile_key(file.name()) else {
            problems.push(format!("{}: unrecognised DEM file name", file.name()));
            return;
        };

        let info = match HgtFileInfo::new(file, key) {
            Ok(info) => Arc::new(info),
            Err(e) => {
                log::debug!("skipping DEM file: {}", e);
                problems.push(e.to_string());
                return;
            }
        };

        match map.get(&key) {
            // On duplicate keys the larger file wins.
            Some(existing) if existing.size_bytes() >= info.size_bytes() => {}
            _ => {
                map.insert(key, info);
            }
        }
    }

    /// Looks up the source for a tile
    pub fn get(&self, key: &TileKey) -> Option<&Arc<HgtFileInfo>> {
        self.map.get(key)
    }

    /// Number of indexed tiles
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Problem strings collected while indexing
    pub fn problems(&self) -> &[String] {
        &self.problems
    }
}
