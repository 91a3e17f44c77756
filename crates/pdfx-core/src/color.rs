//! Color values and color space descriptors.
//!
//! [`Color`] models every color a content stream can select: the three device
//! primitives plus the composite Separation, Shading and Pattern colors that
//! refer to another color or color space. [`ColorSpace`] is the resolved form
//! of a color space definition (`/DeviceRGB`, `[/Separation ...]`, ...).

use std::fmt;
use std::hash::{Hash, Hasher};

/// Clamp a component into `[0.0, 1.0]`.
///
/// NaN maps to `0.0` and `-0.0` folds to `0.0`, so the bit patterns compared
/// by [`Color`]'s `Eq`/`Hash` are canonical.
pub fn normalize(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0) + 0.0
}

/// Variant tag of a [`Color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorKind {
    Gray,
    Rgb,
    Cmyk,
    Separation,
    Shading,
    Pattern,
}

impl ColorKind {
    /// Returns `true` for the device primitives Gray, RGB and CMYK.
    pub fn is_device(self) -> bool {
        matches!(self, ColorKind::Gray | ColorKind::Rgb | ColorKind::Cmyk)
    }
}

impl fmt::Display for ColorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColorKind::Gray => "Gray",
            ColorKind::Rgb => "RGB",
            ColorKind::Cmyk => "CMYK",
            ColorKind::Separation => "Separation",
            ColorKind::Shading => "Shading",
            ColorKind::Pattern => "Pattern",
        };
        f.write_str(s)
    }
}

/// A color value selected by a content stream.
///
/// Build values through the constructor functions ([`Color::gray`],
/// [`Color::rgb`], ...), which normalize components into `[0, 1]`.
/// Equality and hashing are structural and exact: no tolerance is applied.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "ColorRepr"))]
pub enum Color {
    /// DeviceGray level.
    Gray(f32),
    /// DeviceRGB components.
    Rgb(f32, f32, f32),
    /// DeviceCMYK components.
    Cmyk(f32, f32, f32, f32),
    /// A named ink with its fallback representation in another space.
    Separation {
        name: String,
        tint: f32,
        alternate: Box<Color>,
    },
    /// Color governed by a shading's declared color space.
    Shading(Box<ColorSpace>),
    /// A pattern carrying a representative color.
    Pattern(Box<Color>),
}

impl Color {
    pub fn gray(g: f32) -> Self {
        Color::Gray(normalize(g))
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color::Rgb(normalize(r), normalize(g), normalize(b))
    }

    pub fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Color::Cmyk(normalize(c), normalize(m), normalize(y), normalize(k))
    }

    pub fn separation(name: impl Into<String>, tint: f32, alternate: Color) -> Self {
        Color::Separation {
            name: name.into(),
            tint: normalize(tint),
            alternate: Box::new(alternate),
        }
    }

    pub fn shading(space: ColorSpace) -> Self {
        Color::Shading(Box::new(space))
    }

    pub fn pattern(default_color: Color) -> Self {
        Color::Pattern(Box::new(default_color))
    }

    /// Black in DeviceGray, the initial color of a graphics state.
    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    /// Classify this color by variant.
    pub fn kind(&self) -> ColorKind {
        match self {
            Color::Gray(_) => ColorKind::Gray,
            Color::Rgb(..) => ColorKind::Rgb,
            Color::Cmyk(..) => ColorKind::Cmyk,
            Color::Separation { .. } => ColorKind::Separation,
            Color::Shading(_) => ColorKind::Shading,
            Color::Pattern(_) => ColorKind::Pattern,
        }
    }

    /// Device components for Gray, RGB and CMYK colors.
    ///
    /// Returns `None` for composite colors.
    pub fn components(&self) -> Option<Vec<f32>> {
        match *self {
            Color::Gray(g) => Some(vec![g]),
            Color::Rgb(r, g, b) => Some(vec![r, g, b]),
            Color::Cmyk(c, m, y, k) => Some(vec![c, m, y, k]),
            _ => None,
        }
    }
}

/// Wire form of [`Color`]; deserialized values pass through the
/// normalizing constructors.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(rename = "Color")]
enum ColorRepr {
    Gray(f32),
    Rgb(f32, f32, f32),
    Cmyk(f32, f32, f32, f32),
    Separation {
        name: String,
        tint: f32,
        alternate: Box<Color>,
    },
    Shading(Box<ColorSpace>),
    Pattern(Box<Color>),
}

#[cfg(feature = "serde")]
impl From<ColorRepr> for Color {
    fn from(repr: ColorRepr) -> Self {
        match repr {
            ColorRepr::Gray(g) => Color::gray(g),
            ColorRepr::Rgb(r, g, b) => Color::rgb(r, g, b),
            ColorRepr::Cmyk(c, m, y, k) => Color::cmyk(c, m, y, k),
            ColorRepr::Separation { name, tint, alternate } => Color::separation(name, tint, *alternate),
            ColorRepr::Shading(space) => Color::Shading(space),
            ColorRepr::Pattern(default_color) => Color::Pattern(default_color),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Color::Gray(a), Color::Gray(b)) => a.to_bits() == b.to_bits(),
            (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
                bits_eq(&[*r1, *g1, *b1], &[*r2, *g2, *b2])
            }
            (Color::Cmyk(c1, m1, y1, k1), Color::Cmyk(c2, m2, y2, k2)) => {
                bits_eq(&[*c1, *m1, *y1, *k1], &[*c2, *m2, *y2, *k2])
            }
            (
                Color::Separation {
                    name: n1,
                    tint: t1,
                    alternate: a1,
                },
                Color::Separation {
                    name: n2,
                    tint: t2,
                    alternate: a2,
                },
            ) => n1 == n2 && t1.to_bits() == t2.to_bits() && a1 == a2,
            (Color::Shading(s1), Color::Shading(s2)) => s1 == s2,
            (Color::Pattern(p1), Color::Pattern(p2)) => p1 == p2,
            _ => false,
        }
    }
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Color::Gray(g) => g.to_bits().hash(state),
            Color::Rgb(r, g, b) => {
                for v in [r, g, b] {
                    v.to_bits().hash(state);
                }
            }
            Color::Cmyk(c, m, y, k) => {
                for v in [c, m, y, k] {
                    v.to_bits().hash(state);
                }
            }
            Color::Separation {
                name,
                tint,
                alternate,
            } => {
                name.hash(state);
                tint.to_bits().hash(state);
                alternate.hash(state);
            }
            Color::Shading(space) => space.hash(state),
            Color::Pattern(default_color) => default_color.hash(state),
        }
    }
}

fn bits_eq(a: &[f32], b: &[f32]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// A resolved PDF color space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    /// CIE-based gray (`[/CalGray <<...>>]`).
    CalGray,
    /// CIE-based RGB (`[/CalRGB <<...>>]`).
    CalRgb,
    /// CIE L*a*b* (`[/Lab <<...>>]`).
    Lab,
    /// ICC-based space with its component count and alternate space.
    IccBased {
        num_components: u32,
        alternate: Box<ColorSpace>,
    },
    /// Palette-based space: `hival + 1` entries of the base space.
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Vec<u8>,
    },
    /// Single named colorant with an alternate space.
    Separation {
        name: String,
        alternate: Box<ColorSpace>,
    },
    /// Multiple named colorants with an alternate space.
    DeviceN {
        names: Vec<String>,
        alternate: Box<ColorSpace>,
    },
    /// Pattern space, optionally with an underlying space for uncolored patterns.
    Pattern { underlying: Option<Box<ColorSpace>> },
}

impl ColorSpace {
    /// Map one of the built-in device color space names.
    ///
    /// Only `DeviceGray`, `DeviceRGB` and `DeviceCMYK` are recognized; every
    /// other name needs the resource dictionary to resolve.
    pub fn from_device_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" => Some(ColorSpace::DeviceGray),
            "DeviceRGB" => Some(ColorSpace::DeviceRgb),
            "DeviceCMYK" => Some(ColorSpace::DeviceCmyk),
            _ => None,
        }
    }

    /// Number of components a color in this space is specified with.
    pub fn num_components(&self) -> u32 {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => 1,
            ColorSpace::DeviceRgb | ColorSpace::CalRgb | ColorSpace::Lab => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::IccBased { num_components, .. } => *num_components,
            ColorSpace::Indexed { .. } | ColorSpace::Separation { .. } => 1,
            ColorSpace::DeviceN { names, .. } => names.len() as u32,
            ColorSpace::Pattern { underlying } => {
                underlying.as_ref().map_or(0, |cs| cs.num_components())
            }
        }
    }

    /// The color a `CS`/`cs` operator selects for this space before any
    /// `SC`/`sc` operator sets components.
    ///
    /// Returns `None` for spaces the color model cannot represent (Lab,
    /// Pattern).
    pub fn initial_color(&self) -> Option<Color> {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => Some(Color::Gray(0.0)),
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => Some(Color::Rgb(0.0, 0.0, 0.0)),
            ColorSpace::DeviceCmyk => Some(Color::Cmyk(0.0, 0.0, 0.0, 1.0)),
            ColorSpace::IccBased { alternate, .. } => alternate.initial_color(),
            ColorSpace::Indexed { .. } => self.color_from(&[0.0]),
            ColorSpace::Separation { .. } => self.color_from(&[1.0]),
            ColorSpace::DeviceN { alternate, .. } => alternate.initial_color(),
            ColorSpace::Lab | ColorSpace::Pattern { .. } => None,
        }
    }

    /// Build a [`Color`] from components given in this space.
    ///
    /// Returns `None` if the space cannot be represented or the component
    /// count does not match.
    pub fn color_from(&self, components: &[f32]) -> Option<Color> {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => match components {
                [g] => Some(Color::gray(*g)),
                _ => None,
            },
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => match components {
                [r, g, b] => Some(Color::rgb(*r, *g, *b)),
                _ => None,
            },
            ColorSpace::DeviceCmyk => match components {
                [c, m, y, k] => Some(Color::cmyk(*c, *m, *y, *k)),
                _ => None,
            },
            ColorSpace::IccBased { alternate, .. } => alternate.color_from(components),
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = (*components.first()? as u32).min(*hival);
                let base_n = base.num_components() as usize;
                let offset = index as usize * base_n;
                let entry = lookup.get(offset..offset + base_n)?;
                let base_components: Vec<f32> = entry.iter().map(|&b| b as f32 / 255.0).collect();
                base.color_from(&base_components)
            }
            ColorSpace::Separation { name, alternate } => match components {
                [tint] => Some(Color::separation(
                    name.clone(),
                    *tint,
                    alternate.initial_color()?,
                )),
                _ => None,
            },
            ColorSpace::DeviceN { names, alternate } => {
                if components.len() != names.len() {
                    return None;
                }
                alternate.initial_color()
            }
            ColorSpace::Lab | ColorSpace::Pattern { .. } => None,
        }
    }
}
