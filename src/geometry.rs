//! Physical paper description and the geometry directives handed to the
//! typesetting engine.
//!
//! Papersizes are stored portrait-canonical. Asking for landscape on a sheet
//! that is taller than (or as tall as) it is wide turns the page a quarter
//! clockwise: width and height swap, and each margin moves to the edge it
//! lands on after the turn. A sheet that is already wider than tall is left
//! alone.

use std::fmt;

/// Margin applied on every edge when a papersize is created without explicit
/// margins, in millimeters.
pub const DEFAULT_MARGIN_MM: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Papersize {
    /// Primary key, zero until stored.
    pub id: i64,
    pub name: String,
    /// All dimensions in millimeters.
    pub width: u32,
    pub height: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
    pub bindingoffset: u32,
}

/// The five margin settings, in the order the engine expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginRole {
    Top,
    Right,
    Bottom,
    Left,
    BindingOffset,
}

impl MarginRole {
    pub const ORDER: [MarginRole; 5] = [
        MarginRole::Top,
        MarginRole::Right,
        MarginRole::Bottom,
        MarginRole::Left,
        MarginRole::BindingOffset,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MarginRole::Top => "top",
            MarginRole::Right => "right",
            MarginRole::Bottom => "bottom",
            MarginRole::Left => "left",
            MarginRole::BindingOffset => "bindingoffset",
        }
    }

    /// Edge this margin ends up on once the sheet is turned a quarter
    /// clockwise. The binding offset does not move.
    pub fn rotated_clockwise(self) -> MarginRole {
        match self {
            MarginRole::Top => MarginRole::Right,
            MarginRole::Right => MarginRole::Bottom,
            MarginRole::Bottom => MarginRole::Left,
            MarginRole::Left => MarginRole::Top,
            MarginRole::BindingOffset => MarginRole::BindingOffset,
        }
    }
}

impl Papersize {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            width,
            height,
            top: DEFAULT_MARGIN_MM,
            right: DEFAULT_MARGIN_MM,
            bottom: DEFAULT_MARGIN_MM,
            left: DEFAULT_MARGIN_MM,
            bindingoffset: 0,
        }
    }

    pub fn with_margins(mut self, top: u32, right: u32, bottom: u32, left: u32) -> Self {
        self.top = top;
        self.right = right;
        self.bottom = bottom;
        self.left = left;
        self
    }

    pub fn with_binding_offset(mut self, bindingoffset: u32) -> Self {
        self.bindingoffset = bindingoffset;
        self
    }

    pub fn margin(&self, role: MarginRole) -> u32 {
        match role {
            MarginRole::Top => self.top,
            MarginRole::Right => self.right,
            MarginRole::Bottom => self.bottom,
            MarginRole::Left => self.left,
            MarginRole::BindingOffset => self.bindingoffset,
        }
    }

    /// Whether a landscape request actually turns this sheet.
    pub fn rotates_for(&self, landscape: bool) -> bool {
        landscape && self.height >= self.width
    }

    /// Width and height of the page as it will be printed.
    pub fn oriented_dimensions(&self, landscape: bool) -> (u32, u32) {
        if self.rotates_for(landscape) {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Ordered geometry settings: paper size, the `asymmetric` marker, then
    /// the four margins and the binding offset.
    pub fn geometry_directives(&self, landscape: bool) -> Vec<String> {
        let rotate = self.rotates_for(landscape);
        let (width, height) = self.oriented_dimensions(landscape);

        let mut geometry = Vec::with_capacity(3 + MarginRole::ORDER.len());
        geometry.push(format!("paperwidth={width}mm"));
        geometry.push(format!("paperheight={height}mm"));
        geometry.push("asymmetric".to_string());

        for role in MarginRole::ORDER {
            let label = if rotate {
                role.rotated_clockwise()
            } else {
                role
            };
            geometry.push(format!("{}={}mm", label.key(), self.margin(role)));
        }

        geometry
    }
}

impl fmt::Display for Papersize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
