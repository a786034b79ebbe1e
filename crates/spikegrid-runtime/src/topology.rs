//! Lattice layout of a neuron population

use core::fmt;

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Three-dimensional lattice with unit spacing, centred on the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid3D {
    width: u32,
    height: u32,
    depth: u32,
}

impl Grid3D {
    /// Create a new grid; every extent must be positive
    pub fn new(width: u32, height: u32, depth: u32) -> Result<Self> {
        for (name, extent) in [("width", width), ("height", height), ("depth", depth)] {
            if extent == 0 {
                return Err(RuntimeError::invalid_parameter(name, "0", "> 0"));
            }
        }
        // Neuron indices are u32 throughout the engine
        let total = width as u64 * height as u64 * depth as u64;
        if total > u32::MAX as u64 {
            return Err(RuntimeError::invalid_parameter(
                "grid",
                format!("{}x{}x{}", width, height, depth),
                "at most u32::MAX neurons",
            ));
        }
        Ok(Self {
            width,
            height,
            depth,
        })
    }

    /// Extent along x
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Extent along y
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Extent along z
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Total number of neurons on the lattice
    pub fn num_neurons(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Integer lattice coordinates of a neuron; x varies fastest
    pub fn coordinates(&self, index: usize) -> Option<(u32, u32, u32)> {
        if index >= self.num_neurons() {
            return None;
        }
        let w = self.width as usize;
        let plane = w * self.height as usize;
        let x = index % w;
        let y = (index / w) % self.height as usize;
        let z = index / plane;
        Some((x as u32, y as u32, z as u32))
    }

    /// Spatial position of a neuron with the lattice centred on the origin
    pub fn position(&self, index: usize) -> Option<(f32, f32, f32)> {
        let (x, y, z) = self.coordinates(index)?;
        let centre = |coord: u32, extent: u32| coord as f32 - (extent as f32 - 1.0) / 2.0;
        Some((
            centre(x, self.width),
            centre(y, self.height),
            centre(z, self.depth),
        ))
    }
}

impl fmt::Display for Grid3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_counts() {
        let grid = Grid3D::new(13, 9, 1).unwrap();
        assert_eq!(grid.num_neurons(), 117);
        assert_eq!(format!("{}", grid), "13x9x1");
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(Grid3D::new(0, 3, 1).is_err());
        assert!(Grid3D::new(3, 0, 1).is_err());
        let err = Grid3D::new(3, 3, 0).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_coordinates_x_fastest() {
        let grid = Grid3D::new(3, 2, 2).unwrap();
        assert_eq!(grid.coordinates(0), Some((0, 0, 0)));
        assert_eq!(grid.coordinates(1), Some((1, 0, 0)));
        assert_eq!(grid.coordinates(3), Some((0, 1, 0)));
        assert_eq!(grid.coordinates(6), Some((0, 0, 1)));
        assert_eq!(grid.coordinates(11), Some((2, 1, 1)));
        assert_eq!(grid.coordinates(12), None);
    }

    #[test]
    fn test_positions_centred() {
        let grid = Grid3D::new(3, 3, 1).unwrap();
        assert_eq!(grid.position(0), Some((-1.0, -1.0, 0.0)));
        assert_eq!(grid.position(4), Some((0.0, 0.0, 0.0)));
        assert_eq!(grid.position(8), Some((1.0, 1.0, 0.0)));

        let even = Grid3D::new(2, 1, 1).unwrap();
        assert_eq!(even.position(0), Some((-0.5, 0.0, 0.0)));
        assert_eq!(even.position(1), Some((0.5, 0.0, 0.0)));
    }
}
