//! Conversions between points and English Metric Units.

/// EMUs in one typographic point (914 400 per inch / 72).
pub const EMU_PER_POINT: i64 = 12_700;

/// Convert points to EMUs, truncating toward zero.
pub fn points_to_emu(points: f64) -> i64 {
    (points * EMU_PER_POINT as f64) as i64
}

/// Convert EMUs to points.
pub fn emu_to_points(emu: i64) -> f64 {
    emu as f64 / EMU_PER_POINT as f64
}
