use chrono::{Local, NaiveTime, Timelike};
use std::fmt;

/// Time-of-day accent color
///
/// The hue walks once around the color wheel per day; saturation and
/// lightness are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientColor {
    pub hue: u16,
    pub saturation: u8,
    pub lightness: u8,
}

impl AmbientColor {
    pub const SATURATION: u8 = 70;
    pub const LIGHTNESS: u8 = 85;

    /// Color for a wall-clock time
    pub fn at(time: NaiveTime) -> Self {
        let hours = time.hour() as f64 + time.minute() as f64 / 60.0;
        let hue = (hours / 24.0 * 360.0).floor() as u16;
        Self {
            hue,
            saturation: Self::SATURATION,
            lightness: Self::LIGHTNESS,
        }
    }

    /// Color for the current local time
    pub fn now() -> Self {
        Self::at(Local::now().time())
    }

    /// Convert to 8-bit RGB
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        let h = self.hue as f64 / 360.0;
        let s = self.saturation as f64 / 100.0;
        let l = self.lightness as f64 / 100.0;

        if s == 0.0 {
            let v = (l * 255.0).round() as u8;
            return (v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let channel = |t: f64| (hue_to_channel(p, q, t) * 255.0).round() as u8;

        (
            channel(h + 1.0 / 3.0),
            channel(h),
            channel(h - 1.0 / 3.0),
        )
    }
}

fn hue_to_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

impl Default for AmbientColor {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for AmbientColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}, {}%, {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}
