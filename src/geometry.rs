//! Geometry and DPI math for the bar
//!
//! Everything here is pure: rectangles in device pixels, conversions between
//! device pixels and logical units, and the edge table that places a bar of a
//! given thickness inside a monitor area.

use serde::{Deserialize, Serialize};

use crate::error::{MenuBarError, MenuBarResult};

/// DPI at which one logical unit equals one device pixel
pub const BASE_DPI: u32 = 96;

/// Rectangle in device pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from Win32-style edges
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when `other` lies entirely inside `self`
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn with_origin(&self, x: i32, y: i32) -> Rect {
        Rect { x, y, ..*self }
    }
}

/// Screen edge a bar docks against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenEdge {
    Top,
    Bottom,
    Left,
    Right,
}

impl ScreenEdge {
    /// Horizontal bars span the full width; vertical ones the full height
    pub fn is_horizontal(self) -> bool {
        matches!(self, ScreenEdge::Top | ScreenEdge::Bottom)
    }
}

/// Device-to-logical scale factor (1.0 at 96 DPI)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpiScale(f64);

impl DpiScale {
    pub const IDENTITY: DpiScale = DpiScale(1.0);

    pub fn new(factor: f64) -> MenuBarResult<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MenuBarError::InvalidGeometry(format!(
                "scale factor must be positive, got {}",
                factor
            )));
        }
        Ok(Self(factor))
    }

    /// Scale for a raw DPI value
    pub fn from_dpi(dpi: u32) -> MenuBarResult<Self> {
        Self::new(dpi as f64 / BASE_DPI as f64)
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    /// Logical units to device pixels
    pub fn to_device(self, logical: i32) -> i32 {
        (logical as f64 * self.0).round() as i32
    }

    /// Device pixels to logical units
    pub fn to_logical(self, device: i32) -> i32 {
        (device as f64 / self.0).round() as i32
    }
}

impl Default for DpiScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// OS monitor identifier (an `HMONITOR` value on Windows)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MonitorId(pub isize);

/// Cached view of the monitor the bar occupies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monitor {
    pub id: MonitorId,
    pub bounds: Rect,
    pub work_area: Rect,
    pub scale: DpiScale,
}

impl Monitor {
    pub fn new(id: MonitorId, bounds: Rect, work_area: Rect, scale: DpiScale) -> Self {
        Self {
            id,
            bounds,
            work_area,
            scale,
        }
    }
}

/// Rectangle for a bar `thickness` logical units thick docked on `edge` of `area`.
///
/// The result is in device pixels and always lies inside `area`.
pub fn compute_bar_rectangle(
    edge: ScreenEdge,
    area: &Rect,
    thickness: i32,
    scale: DpiScale,
) -> MenuBarResult<Rect> {
    if thickness <= 0 {
        return Err(MenuBarError::InvalidGeometry(format!(
            "bar thickness must be positive, got {}",
            thickness
        )));
    }
    if area.is_empty() {
        return Err(MenuBarError::InvalidGeometry(format!(
            "monitor area is empty: {:?}",
            area
        )));
    }

    let span = if edge.is_horizontal() {
        area.height
    } else {
        area.width
    };
    let t = scale.to_device(thickness).clamp(1, span);

    let rect = match edge {
        ScreenEdge::Top => Rect::new(area.x, area.y, area.width, t),
        ScreenEdge::Bottom => Rect::new(area.x, area.bottom() - t, area.width, t),
        ScreenEdge::Left => Rect::new(area.x, area.y, t, area.height),
        ScreenEdge::Right => Rect::new(area.right() - t, area.y, t, area.height),
    };
    debug_assert!(area.contains_rect(&rect));
    Ok(rect)
}

/// Device pixel extents to logical units
pub fn pixels_to_logical(x: u32, y: u32, scale: DpiScale) -> (i32, i32) {
    (scale.to_logical(x as i32), scale.to_logical(y as i32))
}

/// Logical extents to device pixels
pub fn logical_to_pixels(width: i32, height: i32, scale: DpiScale) -> (i32, i32) {
    (scale.to_device(width), scale.to_device(height))
}
