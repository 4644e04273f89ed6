use std::fmt;

use foundation::Compass;

/// Coarse viewing direction derived from a compass bearing.
///
/// `None` when the bearing is not a finite number. Discovery treats that case
/// as facing north.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Direction(Option<Compass>);

impl Direction {
    pub const UNKNOWN: Direction = Direction(None);

    pub fn new(compass: Compass) -> Self {
        Self(Some(compass))
    }

    /// Classify a bearing in degrees (clockwise from north).
    ///
    /// Bearings are normalised into `[0, 360)` first. The north band is
    /// `(292.5, 360) ∪ [0, 67.5]`, south `(112.5, 247.5]`, east `(22.5, 157.5]`
    /// and west `(202.5, 337.5]`. Overlapping bands produce the diagonals.
    pub fn from_bearing(bearing: f64) -> Self {
        if !bearing.is_finite() {
            return Self::UNKNOWN;
        }
        let b = bearing.rem_euclid(360.0);

        let north = b > 292.5 || b <= 67.5;
        let south = b > 112.5 && b <= 247.5;
        let east = b > 22.5 && b <= 157.5;
        let west = b > 202.5 && b <= 337.5;

        let compass = match (north, south, east, west) {
            (true, _, true, _) => Compass::NE,
            (true, _, _, true) => Compass::NW,
            (true, _, _, _) => Compass::N,
            (_, true, true, _) => Compass::SE,
            (_, true, _, true) => Compass::SW,
            (_, true, _, _) => Compass::S,
            (_, _, true, _) => Compass::E,
            (_, _, _, true) => Compass::W,
            _ => return Self::UNKNOWN,
        };
        Self(Some(compass))
    }

    pub fn compass(self) -> Option<Compass> {
        self.0
    }

    /// `""` for an unknown direction, otherwise the compass label.
    pub fn label(self) -> &'static str {
        self.0.map(Compass::label).unwrap_or("")
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
