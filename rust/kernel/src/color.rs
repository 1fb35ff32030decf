// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display colors with parent inheritance.

use serde::{Deserialize, Serialize};

/// An RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// A color that is either set locally or taken from the parent (the owning
/// layer for geometry, the parent layer for layers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedColor {
    /// The locally stored color. Used when `from_parent` is false, and as the
    /// fallback when there is no parent to inherit from.
    pub color: Color,
    pub from_parent: bool,
}

impl DerivedColor {
    /// A color that overrides the parent.
    pub fn local(color: Color) -> Self {
        Self {
            color,
            from_parent: false,
        }
    }

    /// A color inherited from the parent.
    pub fn inherited() -> Self {
        Self {
            color: Color::default(),
            from_parent: true,
        }
    }

    /// Resolves the effective color given the parent's effective color.
    pub fn resolve(&self, parent: Option<Color>) -> Color {
        match (self.from_parent, parent) {
            (true, Some(parent)) => parent,
            _ => self.color,
        }
    }
}

impl Default for DerivedColor {
    fn default() -> Self {
        Self::inherited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_takes_parent() {
        let red = Color::rgb(255, 0, 0);
        assert_eq!(DerivedColor::inherited().resolve(Some(red)), red);
    }

    #[test]
    fn local_overrides_parent() {
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);
        assert_eq!(DerivedColor::local(blue).resolve(Some(red)), blue);
    }

    #[test]
    fn inherited_without_parent_falls_back() {
        assert_eq!(DerivedColor::inherited().resolve(None), Color::BLACK);
    }
}
