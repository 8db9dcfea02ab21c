//! DPI scaling math against the 96 DPI baseline.

use crate::geometry::NativeRect;

/// DPI at which one logical pixel is one physical pixel.
pub const DEFAULT_DPI: u32 = 96;

pub fn scale_factor(dpi: u32) -> f64 {
    dpi as f64 / DEFAULT_DPI as f64
}

/// Logical → physical.
pub fn scale_with_dpi(value: i32, dpi: u32) -> i32 {
    (value as f64 * scale_factor(dpi)).round() as i32
}

/// Physical → logical.
pub fn unscale_with_dpi(value: i32, dpi: u32) -> i32 {
    if dpi == 0 {
        return value;
    }
    (value as f64 / scale_factor(dpi)).round() as i32
}

pub fn scale_rect(rect: &NativeRect, dpi: u32) -> NativeRect {
    NativeRect::new(
        scale_with_dpi(rect.left, dpi),
        scale_with_dpi(rect.top, dpi),
        scale_with_dpi(rect.right, dpi),
        scale_with_dpi(rect.bottom, dpi),
    )
}
