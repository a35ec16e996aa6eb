//! Click region resolution.
//!
//! Regions are rectangles in the natural pixel space of a background image.
//! A click arrives in display space, possibly letterboxed, and is mapped
//! back to image space before the lookup. Regions are scanned in declaration
//! order and the first one containing the point wins, so overlapping
//! regions must be declared most specific first.

use serde::{Deserialize, Serialize};

/// Inclusive axis-aligned rectangle in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// A rectangle of the given size anchored at its top-left corner.
    pub const fn sized(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn contains(&self, point: ImagePoint) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    pub fn is_valid(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }
}

/// A point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePoint {
    pub x: i32,
    pub y: i32,
}

/// How an image of natural size is drawn into a display box.
///
/// The image is scaled to fit the box keeping its aspect ratio and centered,
/// leaving bars on two sides when the ratios differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub natural_width: f64,
    pub natural_height: f64,
    pub display_width: f64,
    pub display_height: f64,
}

impl Viewport {
    pub fn new(natural_width: f64, natural_height: f64, display_width: f64, display_height: f64) -> Self {
        Self {
            natural_width,
            natural_height,
            display_width,
            display_height,
        }
    }

    /// A viewport where display and image pixels coincide.
    pub fn identity(width: f64, height: f64) -> Self {
        Self::new(width, height, width, height)
    }

    /// Map a display-space point to image space.
    ///
    /// Returns `None` for degenerate dimensions or when the point falls on a
    /// letterbox bar.
    pub fn to_image(&self, x: f64, y: f64) -> Option<ImagePoint> {
        let dims = [
            self.natural_width,
            self.natural_height,
            self.display_width,
            self.display_height,
        ];
        if dims.iter().any(|d| !d.is_finite() || *d <= 0.0) || !x.is_finite() || !y.is_finite() {
            return None;
        }

        let ratio = (self.natural_width / self.display_width)
            .max(self.natural_height / self.display_height);
        let drawn_width = self.natural_width / ratio;
        let drawn_height = self.natural_height / ratio;
        let offset_x = (self.display_width - drawn_width) / 2.0;
        let offset_y = (self.display_height - drawn_height) / 2.0;

        let local_x = x - offset_x;
        let local_y = y - offset_y;
        if local_x < 0.0 || local_y < 0.0 || local_x > drawn_width || local_y > drawn_height {
            return None;
        }

        Some(ImagePoint {
            x: (local_x * ratio).round() as i32,
            y: (local_y * ratio).round() as i32,
        })
    }
}

/// A named rectangle carrying an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region<A> {
    pub name: String,
    pub rect: Rect,
    pub action: A,
}

impl<A> Region<A> {
    pub fn new(name: impl Into<String>, rect: Rect, action: A) -> Self {
        Self {
            name: name.into(),
            rect,
            action,
        }
    }
}

/// An ordered list of regions over one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionSet<A> {
    regions: Vec<Region<A>>,
}

impl<A> Default for RegionSet<A> {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
        }
    }
}

impl<A> RegionSet<A> {
    pub fn new(regions: Vec<Region<A>>) -> Self {
        Self { regions }
    }

    pub fn push(&mut self, region: Region<A>) {
        self.regions.push(region);
    }

    pub fn regions(&self) -> &[Region<A>] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// First declared region containing `point`.
    pub fn resolve(&self, point: ImagePoint) -> Option<&Region<A>> {
        self.regions.iter().find(|r| r.rect.contains(point))
    }

    /// Map a display-space click through `viewport` and resolve it.
    pub fn hit(&self, viewport: &Viewport, x: f64, y: f64) -> Option<&Region<A>> {
        viewport.to_image(x, y).and_then(|p| self.resolve(p))
    }

    /// Names of regions whose rectangle is inverted.
    pub fn invalid(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|r| !r.rect.is_valid())
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Effects of the evidence screen's regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "slot", rename_all = "snake_case")]
pub enum ScreenAction {
    Slot(usize),
    Present,
    Preview,
    NameLabel,
    DescriptionLabel,
    Close,
}

/// Effects of the map's regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapAction {
    Close,
    SwitchPage {
        page: String,
    },
    Investigate {
        message: String,
        #[serde(default)]
        obtain: Option<String>,
        #[serde(default)]
        background: Option<String>,
    },
}

/// Natural size of every background image.
pub const SCREEN_WIDTH: f64 = 1920.0;
pub const SCREEN_HEIGHT: f64 = 1080.0;

const SLOT_X: [i32; 12] = [
    -88, 92, 272, 452, 632, 812, 991, 1171, 1351, 1531, 1710, 1890,
];
const SLOT_Y: i32 = 890;
const SLOT_SIZE: i32 = 116;

/// The built-in evidence screen layout: twelve slots along the bottom edge,
/// a preview box with the present button beneath it, the two text labels and
/// the close button in the top-right corner.
pub fn evidence_screen_layout() -> RegionSet<ScreenAction> {
    let mut set = RegionSet::default();
    for (slot, &x) in SLOT_X.iter().enumerate() {
        set.push(Region::new(
            format!("slot{slot}"),
            Rect::sized(x, SLOT_Y, SLOT_SIZE, SLOT_SIZE),
            ScreenAction::Slot(slot),
        ));
    }
    set.push(Region::new(
        "preview",
        Rect::new(284, 190, 653, 560),
        ScreenAction::Preview,
    ));
    set.push(Region::new(
        "present",
        Rect::new(276, 640, 655, 750),
        ScreenAction::Present,
    ));
    set.push(Region::new(
        "name",
        Rect::sized(1050, 171, 0, 0),
        ScreenAction::NameLabel,
    ));
    set.push(Region::new(
        "description",
        Rect::sized(1102, 269, 0, 0),
        ScreenAction::DescriptionLabel,
    ));
    set.push(Region::new(
        "close",
        Rect::new(1752, 1, 1917, 142),
        ScreenAction::Close,
    ));
    set
}
