//! Hex grid geometry with axial coordinates

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Default distance from a hex center to any corner, in pixels
pub const HEX_SIZE: f64 = 20.0;

/// Axial hex coordinates. The implicit cube coordinate is `s = -q - r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

/// Direction vectors in axial coordinates (dq, dr)
/// Index: 0=E, 1=NE, 2=NW, 3=W, 4=SW, 5=SE
pub const DIRECTIONS: [(i32, i32); 6] = [
    (1, 0),   // E
    (1, -1),  // NE
    (0, -1),  // NW
    (-1, 0),  // W
    (-1, 1),  // SW
    (0, 1),   // SE
];

impl Hex {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    #[inline]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Distance between two hexes
    pub fn distance_to(self, other: Hex) -> u32 {
        let dq = (self.q - other.q).unsigned_abs();
        let dr = (self.r - other.r).unsigned_abs();
        let ds = (self.s() - other.s()).unsigned_abs();
        (dq + dr + ds) / 2
    }

    /// Get neighbor in direction (0-5)
    pub fn neighbor(self, direction: usize) -> Hex {
        let (dq, dr) = DIRECTIONS[direction % 6];
        Hex::new(self.q + dq, self.r + dr)
    }

    /// All six adjacent coordinates, whether or not they are on any map
    pub fn adjacent(self) -> impl Iterator<Item = Hex> {
        (0..6).map(move |dir| self.neighbor(dir))
    }

    /// Adjacent coordinates that are present in `valid`
    pub fn neighbors(self, valid: &FxHashSet<Hex>) -> impl Iterator<Item = Hex> + '_ {
        self.adjacent().filter(move |n| valid.contains(n))
    }
}

/// Hex distance between `a` and `b`
pub fn distance(a: Hex, b: Hex) -> u32 {
    a.distance_to(b)
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Error parsing a `q,r` coordinate pair
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a coordinate pair like `3,-2`, got `{0}`")]
pub struct ParseHexError(String);

impl FromStr for Hex {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let (q, r) = trimmed
            .split_once(',')
            .ok_or_else(|| ParseHexError(s.to_string()))?;
        let q = q.trim().parse().map_err(|_| ParseHexError(s.to_string()))?;
        let r = r.trim().parse().map_err(|_| ParseHexError(s.to_string()))?;
        Ok(Hex::new(q, r))
    }
}

// ============================================================================
// SCREEN CONVERSION
// ============================================================================

/// Camera and screen parameters for pixel conversion
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub hex_size: f64,
    pub zoom: f64,
    pub camera_x: f64,
    pub camera_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            hex_size: HEX_SIZE,
            zoom: 1.0,
            camera_x: 0.0,
            camera_y: 0.0,
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Unzoomed, uncentred center of a hex (flat-top layout)
fn world_center(hex: Hex, hex_size: f64) -> (f64, f64) {
    let q = f64::from(hex.q);
    let r = f64::from(hex.r);
    (hex_size * 1.5 * q, hex_size * 3f64.sqrt() * (r + q / 2.0))
}

/// Screen pixel of a hex center
pub fn hex_to_pixel(hex: Hex, view: &Viewport) -> (i32, i32) {
    let (wx, wy) = world_center(hex, view.hex_size);
    let x = wx * view.zoom + view.camera_x + view.width / 2.0;
    let y = wy * view.zoom + view.camera_y + view.height / 2.0;
    (x as i32, y as i32)
}

/// Hex under a screen pixel.
///
/// Searches `grid` for the nearest center; returns `None` when that center
/// is one hex size or more away.
pub fn pixel_to_hex<I>(x: f64, y: f64, view: &Viewport, grid: I) -> Option<Hex>
where
    I: IntoIterator<Item = Hex>,
{
    let world_x = (x - view.width / 2.0 - view.camera_x) / view.zoom;
    let world_y = (y - view.height / 2.0 - view.camera_y) / view.zoom;

    let mut closest = None;
    let mut min_dist = f64::INFINITY;
    for hex in grid {
        let (cx, cy) = world_center(hex, view.hex_size);
        let dist = (cx - world_x).hypot(cy - world_y);
        if dist < min_dist {
            min_dist = dist;
            closest = Some(hex);
        }
    }

    if min_dist < view.hex_size {
        closest
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn disc(radius: i32) -> FxHashSet<Hex> {
        let mut set = FxHashSet::default();
        for q in -radius..=radius {
            for r in -radius..=radius {
                let h = Hex::new(q, r);
                if h.distance_to(Hex::new(0, 0)) <= radius as u32 {
                    set.insert(h);
                }
            }
        }
        set
    }

    #[test]
    fn test_distance() {
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(0, 0)), 0);
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(1, 0)), 1);
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(2, 2)), 4);
        assert_eq!(Hex::new(-1, 3).distance_to(Hex::new(2, -1)), 4);
    }

    #[test]
    fn test_neighbors_filtered_at_edge() {
        let grid = disc(1);
        assert_eq!(Hex::new(0, 0).neighbors(&grid).count(), 6);
        // Corner of a radius-1 disc touches the center and two ring hexes
        assert_eq!(Hex::new(1, 0).neighbors(&grid).count(), 3);
        assert!(Hex::new(0, 0).neighbors(&grid).all(|n| n.distance_to(Hex::new(0, 0)) == 1));
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!("3,-2".parse::<Hex>(), Ok(Hex::new(3, -2)));
        assert_eq!("(0, 4)".parse::<Hex>(), Ok(Hex::new(0, 4)));
        assert!("nope".parse::<Hex>().is_err());
    }

    #[test]
    fn test_pixel_round_trip_on_centers() {
        let view = Viewport { zoom: 1.5, camera_x: -40.0, camera_y: 12.0, ..Viewport::default() };
        let grid = disc(4);
        for &hex in &grid {
            let (x, y) = hex_to_pixel(hex, &view);
            assert_eq!(pixel_to_hex(f64::from(x), f64::from(y), &view, grid.iter().copied()), Some(hex));
        }
    }

    #[test]
    fn test_pixel_outside_map_is_none() {
        let view = Viewport::default();
        let grid = disc(1);
        // Far corner of the screen is nowhere near a radius-1 map
        assert_eq!(pixel_to_hex(0.0, 0.0, &view, grid.iter().copied()), None);
    }

    proptest! {
        #[test]
        fn prop_distance_is_a_metric(
            aq in -30..30i32, ar in -30..30i32,
            bq in -30..30i32, br in -30..30i32,
            cq in -30..30i32, cr in -30..30i32,
        ) {
            let a = Hex::new(aq, ar);
            let b = Hex::new(bq, br);
            let c = Hex::new(cq, cr);
            prop_assert_eq!(distance(a, a), 0);
            prop_assert_eq!(distance(a, b), distance(b, a));
            prop_assert!(distance(a, c) <= distance(a, b) + distance(b, c));
        }

        #[test]
        fn prop_neighbors_are_at_distance_one(q in -30..30i32, r in -30..30i32) {
            let h = Hex::new(q, r);
            for n in h.adjacent() {
                prop_assert_eq!(h.distance_to(n), 1);
            }
        }
    }
}
