//! Window geometry in device-independent units.

use serde::{Deserialize, Serialize};

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Create a new size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A size that cannot be laid out (zero, negative or not finite).
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Multiply both dimensions by `ratio`.
    pub fn scale(self, ratio: f64) -> Self {
        Self::new(self.width * ratio, self.height * ratio)
    }

    /// Component-wise maximum.
    pub fn max(self, other: Size) -> Self {
        Self::new(self.width.max(other.width), self.height.max(other.height))
    }
}

/// A point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of `size` centred on `center`.
    pub fn centered_at(center: Point, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Shift this rectangle so it lies inside `area` where possible.
    ///
    /// A rectangle larger than `area` is aligned to the area's top-left corner.
    pub fn keep_within(self, area: Rect) -> Self {
        let x = if self.width >= area.width {
            area.x
        } else {
            self.x.clamp(area.x, area.right() - self.width)
        };
        let y = if self.height >= area.height {
            area.y
        } else {
            self.y.clamp(area.y, area.bottom() - self.height)
        };
        Self::new(x, y, self.width, self.height)
    }
}

/// The screen a preview is shown on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Usable desktop area (excluding task bars), device-independent.
    pub work_area: Rect,
}

impl ScreenInfo {
    /// A screen whose work area starts at the origin.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            work_area: Rect::new(0.0, 0.0, width, height),
        }
    }

    pub fn size(&self) -> Size {
        self.work_area.size()
    }

    /// Fit `size` into `max_ratio` of this screen.
    pub fn fit(&self, size: Size, max_ratio: f64) -> Fit {
        fit_to_screen(size, self.size(), max_ratio)
    }
}

impl Default for ScreenInfo {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// Result of [`fit_to_screen`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    /// The scaled size.
    pub size: Size,
    /// The applied ratio, never above 1.
    pub ratio: f64,
}

/// Shrink `size` so it takes at most `max_ratio` of `screen` in both
/// dimensions, keeping its aspect ratio. Never upscales.
///
/// `max_ratio` is clamped to `[0, 1]`; a NaN ratio counts as 0.
pub fn fit_to_screen(size: Size, screen: Size, max_ratio: f64) -> Fit {
    let max_ratio = if max_ratio.is_nan() {
        0.0
    } else {
        max_ratio.clamp(0.0, 1.0)
    };

    let width_ratio = screen.width * max_ratio / size.width;
    let height_ratio = screen.height * max_ratio / size.height;

    let ratio = width_ratio.min(height_ratio).min(1.0);

    Fit {
        size: size.scale(ratio),
        ratio,
    }
}
