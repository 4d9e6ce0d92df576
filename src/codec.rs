use crate::config::DialConfig;
use crate::types::{Celsius, Degrees};

/// Bidirectional angle/temperature codec
///
/// One whole degree of temperature is `degrees_per_unit` degrees of dial
/// rotation, with `min_temperature` at rotation zero. Rotation is never
/// wrapped to 0..360.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialCodec {
    config: DialConfig,
}

/// One temperature label printed around the dial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialLabel {
    pub temperature: Celsius,
    /// Rotation at which this label sits under the pointer
    pub angle: Degrees,
}

impl DialCodec {
    pub fn new(config: DialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    /// Temperature shown at a rotation. No clamping.
    pub fn angle_to_temperature(&self, angle: Degrees) -> Celsius {
        angle / self.config.degrees_per_unit + self.config.min_temperature
    }

    /// Rotation that shows a temperature. Exact inverse of
    /// [`angle_to_temperature`](Self::angle_to_temperature).
    pub fn temperature_to_angle(&self, temperature: Celsius) -> Degrees {
        (temperature - self.config.min_temperature) * self.config.degrees_per_unit
    }

    /// Snap to the major step (commit value and label emphasis)
    pub fn snap_major(&self, angle: Degrees) -> Degrees {
        snap(angle, self.config.major_step)
    }

    /// Snap to the minor step (haptic ticks)
    pub fn snap_minor(&self, angle: Degrees) -> Degrees {
        snap(angle, self.config.minor_step)
    }

    /// Clamp a temperature into the dial's printed range
    pub fn clamp_temperature(&self, temperature: Celsius) -> Celsius {
        temperature.clamp(self.config.min_temperature, self.config.max_temperature)
    }

    /// Whole-degree labels from min to max temperature
    pub fn labels(&self) -> Vec<DialLabel> {
        let min = self.config.min_temperature.ceil() as i64;
        let max = self.config.max_temperature.floor() as i64;
        (min..=max)
            .map(|t| {
                let temperature = t as Celsius;
                DialLabel {
                    temperature,
                    angle: self.temperature_to_angle(temperature),
                }
            })
            .collect()
    }
}

impl Default for DialCodec {
    fn default() -> Self {
        Self::new(DialConfig::default())
    }
}

/// Round `value` to the nearest multiple of `step`; halves go toward +inf
pub fn snap(value: Degrees, step: Degrees) -> Degrees {
    if step <= 0.0 {
        return value;
    }
    (value / step + 0.5).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let codec = DialCodec::default();
        assert_eq!(codec.angle_to_temperature(0.0), 11.0);
        assert_eq!(codec.temperature_to_angle(26.0), 225.0);
        assert_eq!(codec.angle_to_temperature(225.0), 26.0);
    }

    #[test]
    fn test_round_trip() {
        let codec = DialCodec::default();
        for t in 11..=34 {
            let t = t as Celsius;
            assert_eq!(codec.angle_to_temperature(codec.temperature_to_angle(t)), t);
        }
        for t in [11.5, 20.25, 33.75] {
            assert_eq!(codec.angle_to_temperature(codec.temperature_to_angle(t)), t);
        }
    }

    #[test]
    fn test_no_clamping_in_mapping() {
        let codec = DialCodec::default();
        assert_eq!(codec.angle_to_temperature(-30.0), 9.0);
        assert_eq!(codec.angle_to_temperature(600.0), 51.0);
        assert_eq!(codec.clamp_temperature(9.0), 11.0);
        assert_eq!(codec.clamp_temperature(51.0), 34.0);
        assert_eq!(codec.clamp_temperature(20.0), 20.0);
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap(7.4, 15.0), 0.0);
        assert_eq!(snap(7.5, 15.0), 15.0);
        assert_eq!(snap(-7.5, 15.0), 0.0);
        assert_eq!(snap(-7.6, 15.0), -15.0);
        assert_eq!(snap(4.4, 3.0), 3.0);
        assert_eq!(snap(4.5, 3.0), 6.0);
        assert_eq!(snap(12.0, 0.0), 12.0);
    }

    #[test]
    fn test_labels() {
        let labels = DialCodec::default().labels();
        assert_eq!(labels.len(), 24);
        assert_eq!(labels[0], DialLabel { temperature: 11.0, angle: 0.0 });
        assert_eq!(labels[23], DialLabel { temperature: 34.0, angle: 345.0 });
    }
}
