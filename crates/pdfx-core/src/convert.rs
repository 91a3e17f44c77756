//! Color conversion engine.
//!
//! Device colors are projected into CIE XYZ (D50) through a reference
//! space, then out of XYZ through the output profile. Only Gray and RGB
//! are converted; CMYK is the target family and passes through, as does
//! every composite color.

use std::fmt;
use std::sync::Arc;

use moxcms::{
    ColorProfile, DataColorSpace, Layout, TransformExecutor, TransformF64BitExecutor, TransformOptions,
};

use crate::color::Color;
use crate::error::PdfError;

/// D50 reference white.
pub const D50_WHITE: [f64; 3] = [0.96422, 1.0, 0.82521];

/// Linear sRGB to XYZ, Bradford-adapted to D50.
const SRGB_TO_XYZ_D50: [[f64; 3]; 3] = [
    [0.4360747, 0.3850649, 0.1430804],
    [0.2225045, 0.7168786, 0.0606169],
    [0.0139322, 0.0971045, 0.7141733],
];

type Matrix3 = [[f64; 3]; 3];

fn mul(m: &Matrix3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn invert(m: &Matrix3) -> Matrix3 {
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0];
    let a = cof(1, 2, 1, 2);
    let b = -cof(1, 2, 0, 2);
    let c = cof(1, 2, 0, 1);
    let det = m[0][0] * a + m[0][1] * b + m[0][2] * c;
    let inv_det = 1.0 / det;
    [
        [
            a * inv_det,
            -cof(0, 2, 1, 2) * inv_det,
            cof(0, 1, 1, 2) * inv_det,
        ],
        [
            b * inv_det,
            cof(0, 2, 0, 2) * inv_det,
            -cof(0, 1, 0, 2) * inv_det,
        ],
        [
            c * inv_det,
            -cof(0, 2, 0, 1) * inv_det,
            cof(0, 1, 0, 1) * inv_det,
        ],
    ]
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn srgb_decode(v: f64) -> f64 {
    let v = clamp01(v);
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn srgb_encode(v: f64) -> f64 {
    let v = clamp01(v);
    if v <= 0.0031308 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// The target of a conversion: maps XYZ (D50) to and from four
/// device components.
///
/// Implementations are shared read-only across threads.
pub trait OutputProfile: Send + Sync {
    /// Project XYZ into device components, each in `[0, 1]`.
    fn from_xyz(&self, xyz: [f64; 3]) -> [f64; 4];

    /// Project device components back into XYZ.
    fn to_xyz(&self, components: [f64; 4]) -> [f64; 3];

    /// Human-readable profile description.
    fn name(&self) -> &str;
}

/// The standard RGB reference space (sRGB, D50-adapted).
#[derive(Debug, Clone)]
pub struct SrgbProfile {
    xyz_to_rgb: Matrix3,
}

impl SrgbProfile {
    pub fn new() -> Self {
        Self {
            xyz_to_rgb: invert(&SRGB_TO_XYZ_D50),
        }
    }

    /// Encoded sRGB components to XYZ.
    pub fn to_xyz(&self, rgb: [f64; 3]) -> [f64; 3] {
        mul(
            &SRGB_TO_XYZ_D50,
            [srgb_decode(rgb[0]), srgb_decode(rgb[1]), srgb_decode(rgb[2])],
        )
    }

    /// XYZ to encoded sRGB components, clipped to the gamut.
    pub fn from_xyz(&self, xyz: [f64; 3]) -> [f64; 3] {
        let lin = mul(&self.xyz_to_rgb, xyz);
        [srgb_encode(lin[0]), srgb_encode(lin[1]), srgb_encode(lin[2])]
    }
}

impl Default for SrgbProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard Gray reference space: linear luminance on the D50 white point.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrayProfile;

impl GrayProfile {
    pub fn to_xyz(&self, gray: f64) -> [f64; 3] {
        let g = clamp01(gray);
        [D50_WHITE[0] * g, D50_WHITE[1] * g, D50_WHITE[2] * g]
    }

    pub fn from_xyz(&self, xyz: [f64; 3]) -> f64 {
        clamp01(xyz[1])
    }
}

/// Uncalibrated CMYK: the complement of sRGB with full gray component
/// replacement. Pure primaries map to pure process inks, so converting
/// and converting back is lossless within rounding.
#[derive(Debug, Clone, Default)]
pub struct DeviceCmykProfile {
    rgb: SrgbProfile,
}

impl DeviceCmykProfile {
    pub fn new() -> Self {
        Self::default()
    }

    fn rgb_to_cmyk(rgb: [f64; 3]) -> [f64; 4] {
        let [r, g, b] = rgb.map(clamp01);
        let k = 1.0 - r.max(g).max(b);
        if k >= 1.0 - f64::EPSILON {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let d = 1.0 - k;
        [
            clamp01((1.0 - r - k) / d),
            clamp01((1.0 - g - k) / d),
            clamp01((1.0 - b - k) / d),
            clamp01(k),
        ]
    }

    fn cmyk_to_rgb(cmyk: [f64; 4]) -> [f64; 3] {
        let [c, m, y, k] = cmyk.map(clamp01);
        [(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]
    }
}

impl OutputProfile for DeviceCmykProfile {
    fn from_xyz(&self, xyz: [f64; 3]) -> [f64; 4] {
        Self::rgb_to_cmyk(self.rgb.from_xyz(xyz))
    }

    fn to_xyz(&self, components: [f64; 4]) -> [f64; 3] {
        self.rgb.to_xyz(Self::cmyk_to_rgb(components))
    }

    fn name(&self) -> &str {
        "DeviceCMYK"
    }
}

/// A CMYK output profile built from ICC calibration data.
///
/// The profile's device-to-PCS and PCS-to-device tables are evaluated by
/// moxcms, with sRGB as the connection space on the XYZ side.
#[derive(Clone)]
pub struct CalibrationProfile {
    description: String,
    size: usize,
    version: (u8, u8),
    rgb: SrgbProfile,
    forward: Arc<TransformF64BitExecutor>,
    inverse: Arc<TransformF64BitExecutor>,
}

impl CalibrationProfile {
    const HEADER_LEN: usize = 128;

    /// Parse ICC profile bytes and build the transforms to and from sRGB.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::ProfileError`] if the header is malformed, the
    /// data space is not CMYK, or the profile lacks the tables needed for
    /// both directions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        if bytes.len() < Self::HEADER_LEN {
            return Err(PdfError::ProfileError(format!(
                "profile too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[36..40] != b"acsp" {
            return Err(PdfError::ProfileError(
                "missing 'acsp' profile signature".to_string(),
            ));
        }
        let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if declared < Self::HEADER_LEN || declared > bytes.len() {
            return Err(PdfError::ProfileError(format!(
                "declared profile size {declared} does not match data length {}",
                bytes.len()
            )));
        }
        let space = &bytes[16..20];
        if space != b"CMYK" {
            return Err(PdfError::ProfileError(format!(
                "output profile must be CMYK, found '{}'",
                String::from_utf8_lossy(space).trim_end()
            )));
        }

        let profile = ColorProfile::new_from_slice(&bytes[..declared])
            .map_err(|e| PdfError::ProfileError(format!("invalid ICC profile: {e}")))?;
        if profile.color_space != DataColorSpace::Cmyk {
            return Err(PdfError::ProfileError(
                "output profile must be CMYK".to_string(),
            ));
        }
        let srgb = ColorProfile::new_srgb();
        let options = TransformOptions::default();
        let forward = srgb
            .create_transform_f64(Layout::Rgb, &profile, Layout::Rgba, options)
            .map_err(|e| PdfError::ProfileError(format!("cannot build RGB to CMYK transform: {e}")))?;
        let inverse = profile
            .create_transform_f64(Layout::Rgba, &srgb, Layout::Rgb, options)
            .map_err(|e| PdfError::ProfileError(format!("cannot build CMYK to RGB transform: {e}")))?;

        let version = (bytes[8], bytes[9] >> 4);
        Ok(Self {
            description: format!("ICC CMYK v{}.{}", version.0, version.1),
            size: declared,
            version,
            rgb: SrgbProfile::new(),
            forward: Arc::from(forward),
            inverse: Arc::from(inverse),
        })
    }

    /// Declared profile size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// ICC major and minor version.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }
}

impl OutputProfile for CalibrationProfile {
    fn from_xyz(&self, xyz: [f64; 3]) -> [f64; 4] {
        let rgb = self.rgb.from_xyz(xyz);
        let mut cmyk = [0.0; 4];
        // one pixel in, one pixel out: the lengths always match the layouts
        match self.forward.transform(&rgb, &mut cmyk) {
            Ok(()) => cmyk.map(clamp01),
            Err(_) => DeviceCmykProfile::rgb_to_cmyk(rgb),
        }
    }

    fn to_xyz(&self, components: [f64; 4]) -> [f64; 3] {
        let cmyk = components.map(clamp01);
        let mut rgb = [0.0; 3];
        match self.inverse.transform(&cmyk, &mut rgb) {
            Ok(()) => self.rgb.to_xyz(rgb),
            Err(_) => self.rgb.to_xyz(DeviceCmykProfile::cmyk_to_rgb(cmyk)),
        }
    }

    fn name(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for CalibrationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationProfile")
            .field("description", &self.description)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Converts Gray and RGB colors into the output profile's CMYK.
///
/// Holds the output profile and the two reference spaces. Immutable after
/// construction and safe to share across threads.
#[derive(Clone)]
pub struct ColorSpaceConverter {
    output: Arc<dyn OutputProfile>,
    rgb: SrgbProfile,
    gray: GrayProfile,
}

impl ColorSpaceConverter {
    pub fn new(output: Arc<dyn OutputProfile>) -> Self {
        Self {
            output,
            rgb: SrgbProfile::new(),
            gray: GrayProfile,
        }
    }

    /// Converter whose output is uncalibrated device CMYK.
    pub fn device_cmyk() -> Self {
        Self::new(Arc::new(DeviceCmykProfile::new()))
    }

    /// Converter built from ICC calibration profile bytes.
    pub fn from_icc(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self::new(Arc::new(CalibrationProfile::from_bytes(bytes)?)))
    }

    pub fn output_profile(&self) -> &dyn OutputProfile {
        self.output.as_ref()
    }

    /// Convert a color into the output family.
    ///
    /// Gray and RGB become CMYK. Everything else is returned unchanged.
    pub fn convert(&self, color: &Color) -> Color {
        let xyz = match *color {
            Color::Gray(g) => self.gray.to_xyz(f64::from(g)),
            Color::Rgb(r, g, b) => self.rgb.to_xyz([f64::from(r), f64::from(g), f64::from(b)]),
            _ => return color.clone(),
        };
        let [c, m, y, k] = self.output.from_xyz(xyz);
        Color::cmyk(c as f32, m as f32, y as f32, k as f32)
    }

    /// Map output CMYK back to RGB through the inverse of the output profile.
    pub fn reverse(&self, c: f32, m: f32, y: f32, k: f32) -> Color {
        let xyz = self.output.to_xyz([f64::from(c), f64::from(m), f64::from(y), f64::from(k)]);
        let [r, g, b] = self.rgb.from_xyz(xyz);
        Color::rgb(r as f32, g as f32, b as f32)
    }
}

impl Default for ColorSpaceConverter {
    fn default() -> Self {
        Self::device_cmyk()
    }
}

impl fmt::Debug for ColorSpaceConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorSpaceConverter")
            .field("output", &self.output.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpace;
    use moxcms::{LutDataType, LutStore, LutType, LutWarehouse, Matrix3d, ProfileClass, WHITE_POINT_D50};

    fn assert_cmyk_close(color: &Color, expected: [f32; 4]) {
        let Color::Cmyk(c, m, y, k) = *color else {
            panic!("expected CMYK, got {color:?}");
        };
        for (got, want) in [c, m, y, k].iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{color:?} vs {expected:?}");
        }
    }

    fn icc_header(space: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0u8; 132];
        bytes[0..4].copy_from_slice(&132u32.to_be_bytes());
        bytes[8] = 2;
        bytes[9] = 0x10;
        bytes[12..16].copy_from_slice(b"prtr");
        bytes[16..20].copy_from_slice(space);
        bytes[20..24].copy_from_slice(b"XYZ ");
        bytes[36..40].copy_from_slice(b"acsp");
        bytes
    }

    #[test]
    fn inverse_matrix_roundtrips() {
        let inv = invert(&SRGB_TO_XYZ_D50);
        let back = mul(&inv, mul(&SRGB_TO_XYZ_D50, [0.2, 0.5, 0.9]));
        for (got, want) in back.iter().zip([0.2, 0.5, 0.9]) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn srgb_white_maps_to_d50() {
        let xyz = SrgbProfile::new().to_xyz([1.0, 1.0, 1.0]);
        assert!((xyz[0] - 0.9642).abs() < 1e-3);
        assert!((xyz[1] - 1.0).abs() < 1e-3);
        assert!((xyz[2] - 0.8249).abs() < 1e-2);
    }

    #[test]
    fn rgb_primaries_to_process_inks() {
        let conv = ColorSpaceConverter::device_cmyk();
        assert_cmyk_close(&conv.convert(&Color::rgb(1.0, 0.0, 0.0)), [0.0, 1.0, 1.0, 0.0]);
        assert_cmyk_close(&conv.convert(&Color::rgb(0.0, 0.0, 1.0)), [1.0, 1.0, 0.0, 0.0]);
        assert_cmyk_close(&conv.convert(&Color::rgb(0.0, 0.0, 0.0)), [0.0, 0.0, 0.0, 1.0]);
        assert_cmyk_close(&conv.convert(&Color::rgb(1.0, 1.0, 1.0)), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn gray_extremes() {
        let conv = ColorSpaceConverter::device_cmyk();
        assert_cmyk_close(&conv.convert(&Color::gray(0.0)), [0.0, 0.0, 0.0, 1.0]);
        assert_cmyk_close(&conv.convert(&Color::gray(1.0)), [0.0, 0.0, 0.0, 0.0]);
        let Color::Cmyk(c, m, y, k) = conv.convert(&Color::gray(0.5)) else {
            panic!("gray must convert to CMYK");
        };
        assert!(c < 1e-2 && m < 1e-2 && y < 1e-2);
        assert!(k > 0.0 && k < 1.0);
    }

    #[test]
    fn cmyk_is_identity() {
        let conv = ColorSpaceConverter::device_cmyk();
        let color = Color::cmyk(0.1, 0.2, 0.3, 0.4);
        assert_eq!(conv.convert(&color), color);
    }

    #[test]
    fn conversion_is_idempotent() {
        let conv = ColorSpaceConverter::device_cmyk();
        for color in [Color::gray(0.3), Color::rgb(0.2, 0.4, 0.6), Color::rgb(0.9, 0.1, 0.5)] {
            let once = conv.convert(&color);
            assert_eq!(conv.convert(&once), once);
        }
    }

    #[test]
    fn composites_pass_through() {
        let conv = ColorSpaceConverter::device_cmyk();
        let sep = Color::separation("Gold", 0.5, Color::rgb(1.0, 0.8, 0.0));
        assert_eq!(conv.convert(&sep), sep);
        let shading = Color::shading(ColorSpace::DeviceRgb);
        assert_eq!(conv.convert(&shading), shading);
    }

    #[test]
    fn red_roundtrips_through_reverse() {
        let conv = ColorSpaceConverter::device_cmyk();
        let Color::Cmyk(c, m, y, k) = conv.convert(&Color::rgb(1.0, 0.0, 0.0)) else {
            panic!("red must convert to CMYK");
        };
        let Color::Rgb(r, g, b) = conv.reverse(c, m, y, k) else {
            panic!("reverse must produce RGB");
        };
        assert!((r - 1.0).abs() < 1e-3);
        assert!(g.abs() < 1e-3);
        assert!(b.abs() < 1e-3);
    }

    /// A lut16 table on a two-point grid with identity input and output curves.
    fn lut16(inputs: u8, outputs: u8, clut: impl Fn(usize) -> u16) -> LutWarehouse {
        let ramp = |channels: u8| -> Vec<u16> { (0..channels).flat_map(|_| [0, u16::MAX]).collect() };
        let entries = 2usize.pow(u32::from(inputs)) * usize::from(outputs);
        LutWarehouse::Lut(LutDataType {
            num_input_channels: inputs,
            num_output_channels: outputs,
            num_clut_grid_points: 2,
            matrix: Matrix3d::IDENTITY,
            num_input_table_entries: 2,
            num_output_table_entries: 2,
            input_table: LutStore::Store16(ramp(inputs)),
            clut_table: LutStore::Store16((0..entries).map(clut).collect()),
            output_table: LutStore::Store16(ramp(outputs)),
            lut_type: LutType::Lut16,
        })
    }

    /// An encoded CMYK output profile whose PCS-to-device table lays down
    /// `ink` on every channel for every input.
    fn cmyk_profile(ink: u16) -> Vec<u8> {
        let mut profile = ColorProfile::default();
        profile.profile_class = ProfileClass::OutputDevice;
        profile.color_space = DataColorSpace::Cmyk;
        profile.pcs = DataColorSpace::Lab;
        profile.white_point = WHITE_POINT_D50.to_xyzd();
        // device to PCS: everything prints as neutral white
        profile.lut_a_to_b_perceptual = Some(lut16(4, 3, |i| if i % 3 == 0 { u16::MAX } else { 0x8080 }));
        profile.lut_b_to_a_perceptual = Some(lut16(3, 4, move |_| ink));
        profile.encode().unwrap()
    }

    fn cmyk_of(color: Color) -> [f32; 4] {
        let Color::Cmyk(c, m, y, k) = color else {
            panic!("expected CMYK, got {color:?}");
        };
        [c, m, y, k]
    }

    #[test]
    fn icc_profile_accepted() {
        let bytes = cmyk_profile(0);
        let profile = CalibrationProfile::from_bytes(&bytes).unwrap();
        assert_eq!(profile.size(), bytes.len());
        assert_eq!(profile.version().0, 4);
        assert!(profile.name().starts_with("ICC CMYK v4."));
        assert!(ColorSpaceConverter::from_icc(&bytes).is_ok());
    }

    #[test]
    fn icc_profile_tables_drive_conversion() {
        let orange = Color::rgb(0.8, 0.3, 0.1);
        let blank = cmyk_of(ColorSpaceConverter::from_icc(&cmyk_profile(0)).unwrap().convert(&orange));
        let half = cmyk_of(ColorSpaceConverter::from_icc(&cmyk_profile(0x8000)).unwrap().convert(&orange));
        let device = cmyk_of(ColorSpaceConverter::device_cmyk().convert(&orange));

        for v in blank {
            assert!(v.abs() < 0.02, "{blank:?}");
        }
        for v in half {
            assert!((v - 0.5).abs() < 0.02, "{half:?}");
        }
        assert_ne!(blank, device);
        assert_ne!(half, device);
    }

    #[test]
    fn icc_reverse_uses_device_to_pcs_table() {
        let conv = ColorSpaceConverter::from_icc(&cmyk_profile(0x8000)).unwrap();
        let Color::Rgb(r, g, b) = conv.reverse(1.0, 1.0, 1.0, 1.0) else {
            panic!("reverse must produce RGB");
        };
        // the table maps every ink combination to paper white
        for v in [r, g, b] {
            assert!(v > 0.9, "({r}, {g}, {b})");
        }
    }

    #[test]
    fn icc_header_rejections() {
        let err = CalibrationProfile::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, PdfError::ProfileError(_)));

        let mut bad_sig = icc_header(b"CMYK");
        bad_sig[36..40].copy_from_slice(b"xxxx");
        assert!(CalibrationProfile::from_bytes(&bad_sig).is_err());

        let err = CalibrationProfile::from_bytes(&icc_header(b"RGB ")).unwrap_err();
        assert_eq!(
            err,
            PdfError::ProfileError("output profile must be CMYK, found 'RGB'".to_string())
        );

        let mut oversized = icc_header(b"CMYK");
        oversized[0..4].copy_from_slice(&4096u32.to_be_bytes());
        assert!(CalibrationProfile::from_bytes(&oversized).is_err());
    }

    #[test]
    fn header_without_tables_is_rejected() {
        let err = CalibrationProfile::from_bytes(&icc_header(b"CMYK")).unwrap_err();
        assert!(matches!(err, PdfError::ProfileError(_)));
    }

    #[test]
    fn converter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ColorSpaceConverter>();
    }
}
