//! Tile grids for block-mapped execution.
//!
//! # Example
//!
//! ```rust
//! use pixsched_compute::backend::{generate_tiles, grid};
//!
//! let tiles = generate_tiles(20, 10, 8, 8);
//! assert_eq!(tiles.len(), 6); // 3 x 2 grid
//! assert_eq!(grid(20, 10, 8, 8), (3, 2));
//! ```

/// A tile region within an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X offset in the image.
    pub x: u32,
    /// Y offset in the image.
    pub y: u32,
    /// Tile width (smaller than requested at the right edge).
    pub width: u32,
    /// Tile height (smaller than requested at the bottom edge).
    pub height: u32,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Full image as single tile.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Number of tiles along each axis.
pub fn grid(width: u32, height: u32, tile_width: u32, tile_height: u32) -> (u32, u32) {
    (width.div_ceil(tile_width), height.div_ceil(tile_height))
}

/// Row-major tiles covering `width` x `height`; edge tiles are clipped.
pub fn generate_tiles(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Vec<Tile> {
    let (nx, ny) = grid(width, height, tile_width, tile_height);
    let mut tiles = Vec::with_capacity(nx as usize * ny as usize);

    let mut y = 0;
    while y < height {
        let th = tile_height.min(height - y);
        let mut x = 0;
        while x < width {
            let tw = tile_width.min(width - x);
            tiles.push(Tile::new(x, y, tw, th));
            x += tile_width;
        }
        y += tile_height;
    }

    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tiles() {
        let tiles = generate_tiles(1000, 1000, 512, 512);
        assert_eq!(tiles.len(), 4); // 2x2 grid

        assert_eq!(tiles[0].x, 0);
        assert_eq!(tiles[0].width, 512);
        assert_eq!(tiles[1].x, 512);
        assert_eq!(tiles[1].width, 488);
    }

    #[test]
    fn test_single_tile() {
        let tiles = generate_tiles(5, 3, 8, 8);
        assert_eq!(tiles, vec![Tile::full(5, 3)]);
    }

    #[test]
    fn test_rectangular_tiles_cover_image() {
        let (w, h) = (17, 9);
        let tiles = generate_tiles(w, h, 8, 4);
        assert_eq!(tiles.len(), 3 * 3);
        let area: u32 = tiles.iter().map(|t| t.width * t.height).sum();
        assert_eq!(area, w * h);
        let last = tiles[tiles.len() - 1];
        assert_eq!((last.x, last.y, last.width, last.height), (16, 8, 1, 1));
    }

    #[test]
    fn test_grid() {
        assert_eq!(grid(1, 1, 8, 8), (1, 1));
        assert_eq!(grid(16, 17, 8, 8), (2, 3));
    }
}
