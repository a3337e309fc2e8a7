use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where the viewport points: a page, an optional point inside that page and
/// the zoom factor in effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLocation {
    pub page: usize,
    pub offset: Option<PointF>,
    pub zoom: f32,
}

impl PageLocation {
    pub fn new(page: usize, offset: Option<PointF>, zoom: f32) -> Self {
        Self { page, offset, zoom }
    }

    pub fn page(page: usize, zoom: f32) -> Self {
        Self::new(page, None, zoom)
    }
}
