//! Geohash tile identifiers.
//!
//! A [`TileId`] is a standard base32 geohash string. Longitude and latitude
//! bits are interleaved starting with longitude, so a hash of `n` characters
//! carries `ceil(5n / 2)` longitude bits and `floor(5n / 2)` latitude bits.
//!
//! Neighbours are computed on the integer cell grid. Both axes wrap, which
//! keeps the "every cell has eight neighbours" property at the poles and the
//! antimeridian and matches the table-driven reference implementations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

pub const MAX_PRECISION: usize = 12;

/// Precision used for spatial data tiles.
pub const TILE_PRECISION: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum GeohashError {
    InvalidCoordinate { lat: f64, lon: f64 },
    InvalidPrecision(usize),
    InvalidCharacter(char),
}

impl fmt::Display for GeohashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeohashError::InvalidCoordinate { lat, lon } => {
                write!(f, "coordinate out of range: lat={lat} lon={lon}")
            }
            GeohashError::InvalidPrecision(p) => {
                write!(f, "geohash precision must be 1..={MAX_PRECISION}, got {p}")
            }
            GeohashError::InvalidCharacter(c) => write!(f, "invalid geohash character {c:?}"),
        }
    }
}

impl std::error::Error for GeohashError {}

/// The eight compass slots, in clockwise ring order starting at north.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    pub const RING: [Compass; 8] = [
        Compass::N,
        Compass::NE,
        Compass::E,
        Compass::SE,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: i64) -> Self {
        Self::RING[index.rem_euclid(Self::RING.len() as i64) as usize]
    }

    /// Rotate clockwise by `steps` eighths of a turn (negative is counter-clockwise).
    pub fn rotate(self, steps: i64) -> Self {
        Self::from_index(self.index() as i64 + steps)
    }

    pub fn opposite(self) -> Self {
        self.rotate(4)
    }

    pub fn label(self) -> &'static str {
        match self {
            Compass::N => "n",
            Compass::NE => "ne",
            Compass::E => "e",
            Compass::SE => "se",
            Compass::S => "s",
            Compass::SW => "sw",
            Compass::W => "w",
            Compass::NW => "nw",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::RING.into_iter().find(|c| c.label() == label)
    }

    /// Cell offset as (east, north).
    fn offset(self) -> (i64, i64) {
        match self {
            Compass::N => (0, 1),
            Compass::NE => (1, 1),
            Compass::E => (1, 0),
            Compass::SE => (1, -1),
            Compass::S => (0, -1),
            Compass::SW => (-1, -1),
            Compass::W => (-1, 0),
            Compass::NW => (-1, 1),
        }
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Geographic extent of a tile in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TileBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl TileBounds {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
            0.0,
        )
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}

/// A geohash cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileId(String);

impl TileId {
    /// Parse an existing geohash string (case-insensitive).
    pub fn parse(hash: &str) -> Result<Self, GeohashError> {
        if hash.is_empty() || hash.len() > MAX_PRECISION {
            return Err(GeohashError::InvalidPrecision(hash.len()));
        }
        let hash = hash.to_ascii_lowercase();
        if let Some(c) = hash.chars().find(|c| base32_value(*c).is_none()) {
            return Err(GeohashError::InvalidCharacter(c));
        }
        Ok(Self(hash))
    }

    /// Encode a position by successive bisection, longitude first.
    pub fn encode(point: GeoPoint, precision: usize) -> Result<Self, GeohashError> {
        if precision == 0 || precision > MAX_PRECISION {
            return Err(GeohashError::InvalidPrecision(precision));
        }
        if !point.is_valid() {
            return Err(GeohashError::InvalidCoordinate {
                lat: point.lat,
                lon: point.lon,
            });
        }

        let (mut lat_min, mut lat_max) = (-90.0_f64, 90.0_f64);
        let (mut lon_min, mut lon_max) = (-180.0_f64, 180.0_f64);
        let mut hash = String::with_capacity(precision);
        let mut idx = 0usize;
        let mut bit = 0;
        let mut even_bit = true;

        while hash.len() < precision {
            if even_bit {
                let mid = (lon_min + lon_max) / 2.0;
                if point.lon >= mid {
                    idx = idx * 2 + 1;
                    lon_min = mid;
                } else {
                    idx *= 2;
                    lon_max = mid;
                }
            } else {
                let mid = (lat_min + lat_max) / 2.0;
                if point.lat >= mid {
                    idx = idx * 2 + 1;
                    lat_min = mid;
                } else {
                    idx *= 2;
                    lat_max = mid;
                }
            }
            even_bit = !even_bit;

            bit += 1;
            if bit == 5 {
                hash.push(BASE32[idx] as char);
                bit = 0;
                idx = 0;
            }
        }

        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn precision(&self) -> usize {
        self.0.len()
    }

    pub fn bounds(&self) -> TileBounds {
        let cell = self.cell();
        let lon_step = 360.0 / (1u64 << cell.lon_bits) as f64;
        let lat_step = 180.0 / (1u64 << cell.lat_bits) as f64;
        let min_lon = -180.0 + cell.lon as f64 * lon_step;
        let min_lat = -90.0 + cell.lat as f64 * lat_step;
        TileBounds {
            min_lat,
            min_lon,
            max_lat: min_lat + lat_step,
            max_lon: min_lon + lon_step,
        }
    }

    pub fn neighbour(&self, direction: Compass) -> TileId {
        let cell = self.cell();
        let (de, dn) = direction.offset();
        let lon_count = 1i64 << cell.lon_bits;
        let lat_count = 1i64 << cell.lat_bits;
        Cell {
            lon: (cell.lon as i64 + de).rem_euclid(lon_count) as u64,
            lat: (cell.lat as i64 + dn).rem_euclid(lat_count) as u64,
            ..cell
        }
        .to_tile(self.precision())
    }

    pub fn neighbours(&self) -> Neighbours {
        Neighbours {
            tiles: Compass::RING.map(|c| self.neighbour(c)),
        }
    }

    fn cell(&self) -> Cell {
        let total_bits = self.0.len() as u32 * 5;
        let mut cell = Cell {
            lon: 0,
            lat: 0,
            lon_bits: total_bits.div_ceil(2),
            lat_bits: total_bits / 2,
        };
        let mut even_bit = true;
        for c in self.0.chars() {
            // Validated on construction.
            let value = base32_value(c).unwrap_or(0);
            for shift in (0..5).rev() {
                let b = ((value >> shift) & 1) as u64;
                if even_bit {
                    cell.lon = (cell.lon << 1) | b;
                } else {
                    cell.lat = (cell.lat << 1) | b;
                }
                even_bit = !even_bit;
            }
        }
        cell
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TileId {
    type Error = GeohashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TileId::parse(&value)
    }
}

impl From<TileId> for String {
    fn from(value: TileId) -> Self {
        value.0
    }
}

/// The eight neighbours of a tile, indexed by [`Compass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbours {
    tiles: [TileId; 8],
}

impl Neighbours {
    pub fn get(&self, direction: Compass) -> &TileId {
        &self.tiles[direction.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Compass, &TileId)> {
        Compass::RING.into_iter().zip(self.tiles.iter())
    }
}

#[derive(Debug, Copy, Clone)]
struct Cell {
    lon: u64,
    lat: u64,
    lon_bits: u32,
    lat_bits: u32,
}

impl Cell {
    fn to_tile(self, precision: usize) -> TileId {
        let mut hash = String::with_capacity(precision);
        let mut lon_left = self.lon_bits;
        let mut lat_left = self.lat_bits;
        let mut even_bit = true;
        let mut idx = 0usize;
        for emitted in 1..=precision * 5 {
            let b = if even_bit {
                lon_left -= 1;
                (self.lon >> lon_left) & 1
            } else {
                lat_left -= 1;
                (self.lat >> lat_left) & 1
            };
            idx = (idx << 1) | b as usize;
            even_bit = !even_bit;
            if emitted % 5 == 0 {
                hash.push(BASE32[idx] as char);
                idx = 0;
            }
        }
        TileId(hash)
    }
}

fn base32_value(c: char) -> Option<u8> {
    BASE32.iter().position(|b| *b as char == c).map(|p| p as u8)
}
