//! Core data types for shadekit

/// Identity of a one-degree DEM tile as encoded in HGT file names.
///
/// The tile covers latitudes `[north - 1, north]` and longitudes
/// `[east, east + 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Latitude of the tile's north edge in whole degrees
    pub north: i32,
    /// Longitude of the tile's west edge in whole degrees
    pub east: i32,
}

impl TileKey {
    /// Creates a tile key from its edge coordinates
    pub fn new(north: i32, east: i32) -> Self {
        Self { north, east }
    }

    /// Returns the key of the tile whose bounding box contains the
    /// given coordinates
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self {
            north: lat.floor() as i32 + 1,
            east: lon.floor() as i32,
        }
    }

    /// Returns the geographic bounding box covered by this tile
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lat: (self.north - 1) as f64,
            min_lon: self.east as f64,
            max_lat: self.north as f64,
            max_lon: (self.east + 1) as f64,
        }
    }
}

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Returns whether the box contains the given point
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}
