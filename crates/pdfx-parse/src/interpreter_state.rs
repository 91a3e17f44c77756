//! Color space state tracked while interpreting a content stream.

/// Which of the two current colors an operator addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintTarget {
    /// Stroking (outline) color: `CS`, `SC`, `SCN`, `G`, `RG`, `K`.
    Stroke,
    /// Non-stroking (fill) color: `cs`, `sc`, `scn`, `g`, `rg`, `k`.
    Fill,
}

impl PaintTarget {
    /// Stroking operators are the upper-case forms.
    pub fn of_operator(name: &str) -> Self {
        if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            PaintTarget::Stroke
        } else {
            PaintTarget::Fill
        }
    }
}

/// The current stroke and fill color space names.
///
/// One instance per interpretation run. Only `CS` and `cs` change it;
/// `SC`, `SCN`, `sc` and `scn` read it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorSpaceState {
    /// Stroke color space name set by `CS`.
    pub stroke: Option<String>,
    /// Fill color space name set by `cs`.
    pub fill: Option<String>,
}

impl ColorSpaceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, target: PaintTarget, name: impl Into<String>) {
        let name = Some(name.into());
        match target {
            PaintTarget::Stroke => self.stroke = name,
            PaintTarget::Fill => self.fill = name,
        }
    }

    pub fn current(&self, target: PaintTarget) -> Option<&str> {
        match target {
            PaintTarget::Stroke => self.stroke.as_deref(),
            PaintTarget::Fill => self.fill.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let state = ColorSpaceState::new();
        assert_eq!(state.current(PaintTarget::Stroke), None);
        assert_eq!(state.current(PaintTarget::Fill), None);
    }

    #[test]
    fn stroke_and_fill_are_independent() {
        let mut state = ColorSpaceState::new();
        state.set(PaintTarget::Fill, "Pattern");
        state.set(PaintTarget::Stroke, "CS0");
        assert_eq!(state.current(PaintTarget::Fill), Some("Pattern"));
        assert_eq!(state.current(PaintTarget::Stroke), Some("CS0"));
        state.set(PaintTarget::Fill, "DeviceCMYK");
        assert_eq!(state.fill.as_deref(), Some("DeviceCMYK"));
        assert_eq!(state.stroke.as_deref(), Some("CS0"));
    }

    #[test]
    fn target_from_operator_case() {
        assert_eq!(PaintTarget::of_operator("SCN"), PaintTarget::Stroke);
        assert_eq!(PaintTarget::of_operator("RG"), PaintTarget::Stroke);
        assert_eq!(PaintTarget::of_operator("scn"), PaintTarget::Fill);
        assert_eq!(PaintTarget::of_operator("k"), PaintTarget::Fill);
    }
}
