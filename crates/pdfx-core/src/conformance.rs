//! PDF/X conformance levels, checked aspects and policy violations.

use std::fmt;
use std::str::FromStr;

/// The output conformance a document must satisfy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConformanceLevel {
    /// No conformance requested; every check is a no-op.
    #[default]
    None,
    /// PDF/X-1a:2001, CMYK and spot colors only.
    PdfX1a2001,
    /// PDF/X-3:2002, color-managed workflows allowed.
    PdfX32002,
    /// PDF/A-1a (archival, accessible).
    PdfA1a,
    /// PDF/A-1b (archival, basic).
    PdfA1b,
}

impl ConformanceLevel {
    /// Returns `true` if any conformance is requested.
    pub fn is_pdfx(self) -> bool {
        self != ConformanceLevel::None
    }

    /// Returns `true` for the strict PDF/X-1a level, the only one that
    /// restricts color spaces.
    pub fn is_strict(self) -> bool {
        self == ConformanceLevel::PdfX1a2001
    }

    /// Returns `true` for the PDF/A levels.
    pub fn is_archival(self) -> bool {
        matches!(self, ConformanceLevel::PdfA1a | ConformanceLevel::PdfA1b)
    }

    /// The `/GTS_PDFXVersion` string for PDF/X levels.
    pub fn pdfx_version(self) -> Option<&'static str> {
        match self {
            ConformanceLevel::PdfX1a2001 => Some("PDF/X-1:2001"),
            ConformanceLevel::PdfX32002 => Some("PDF/X-3:2002"),
            _ => None,
        }
    }
}

impl fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConformanceLevel::None => "none",
            ConformanceLevel::PdfX1a2001 => "PDF/X-1a:2001",
            ConformanceLevel::PdfX32002 => "PDF/X-3:2002",
            ConformanceLevel::PdfA1a => "PDF/A-1a",
            ConformanceLevel::PdfA1b => "PDF/A-1b",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an unknown conformance selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid conformance level: {}", self.0)
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for ConformanceLevel {
    type Err = UnknownLevel;

    /// Parse a selector such as `PDFX1A`, `PDFX3`, `PDFA1B` or `NONE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(ConformanceLevel::None),
            "PDFX1A" | "PDFX1A2001" => Ok(ConformanceLevel::PdfX1a2001),
            "PDFX3" | "PDFX32002" => Ok(ConformanceLevel::PdfX32002),
            "PDFA1A" => Ok(ConformanceLevel::PdfA1a),
            "PDFA1B" => Ok(ConformanceLevel::PdfA1b),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// An aspect of a document that can be checked for conformance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConformanceKey {
    Color,
    Cmyk,
    Rgb,
    Font,
    Image,
    GraphicsState,
    Layer,
    Content,
}

impl ConformanceKey {
    /// Returns the string tag for this key.
    pub fn as_str(self) -> &'static str {
        match self {
            ConformanceKey::Color => "COLOR",
            ConformanceKey::Cmyk => "CMYK",
            ConformanceKey::Rgb => "RGB",
            ConformanceKey::Font => "FONT",
            ConformanceKey::Image => "IMAGE",
            ConformanceKey::GraphicsState => "GSTATE",
            ConformanceKey::Layer => "LAYER",
            ConformanceKey::Content => "CONTENT",
        }
    }
}

impl fmt::Display for ConformanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A construct that is not allowed under the active conformance level.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyViolation {
    /// The checked aspect that failed.
    pub key: ConformanceKey,
    /// Human-readable reason.
    pub message: String,
}

impl PolicyViolation {
    pub fn new(key: ConformanceKey, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }

    /// `Colorspace RGB is not allowed.`
    pub fn rgb_not_allowed(key: ConformanceKey) -> Self {
        Self::new(key, "Colorspace RGB is not allowed.")
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PDF/X conformance violation [{}]: {}", self.key, self.message)
    }
}

impl std::error::Error for PolicyViolation {}
