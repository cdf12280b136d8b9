pub mod dashboard;

use embedded_graphics::pixelcolor::Rgb565;

use crate::layout;
use crate::librelink::{self, GlucoseReading, GlucoseUnits};
use crate::trend_icons::TrendArrow;

/// Fixed message shown while readings cannot be fetched.
pub const ERROR_TEXT: &str = "Failed to read glucose data\nCheck username and password";

/// Everything currently on screen, as values. `project` decides what to
/// show; `dashboard::draw` decides how to draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub value_text: String,
    pub value_color: Rgb565,
    pub units_text: &'static str,
    pub trend: Option<TrendArrow>,
    pub timestamp_text: String,
    pub low_text: String,
    pub high_text: String,
    pub info_text: String,
}

impl DisplayState {
    /// Screen contents before the first reading arrives.
    pub fn new() -> Self {
        Self {
            value_text: "--".to_string(),
            value_color: layout::TEXT_PRIMARY,
            units_text: "",
            trend: None,
            timestamp_text: String::new(),
            low_text: String::new(),
            high_text: String::new(),
            info_text: "Waiting for first reading...".to_string(),
        }
    }
}

/// Project a reading onto the display. Pure function, no hardware involved.
///
/// `convert_mmol` applies the optional mg/dL → mmol/L display conversion;
/// readings already in mmol/L pass through untouched.
pub fn project(reading: &GlucoseReading, convert_mmol: bool) -> DisplayState {
    let (value, units) = if convert_mmol && reading.units == GlucoseUnits::MgPerDl {
        (librelink::mg_dl_to_mmol_l(reading.value), GlucoseUnits::MmolPerL)
    } else {
        (reading.value, reading.units)
    };

    DisplayState {
        value_text: format!("{}", value),
        value_color: layout::measurement_rgb(reading.color),
        units_text: units.label(),
        trend: Some(reading.trend),
        timestamp_text: format!("Last updated: {}", reading.timestamp),
        low_text: format!("{:.1}", reading.target_low),
        high_text: format!("{:.1}", reading.target_high),
        info_text: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::librelink::MeasurementColor;

    fn mmol_reading() -> GlucoseReading {
        GlucoseReading {
            value: 5.6,
            timestamp: "t".to_string(),
            trend: TrendArrow::from_code(3),
            color: MeasurementColor::from_code(1),
            units: GlucoseUnits::from_flag(0),
            target_low: 4.0,
            target_high: 7.8,
        }
    }

    #[test]
    fn projection_renders_the_reading_verbatim() {
        let state = project(&mmol_reading(), false);
        assert_eq!(state.value_text, "5.6");
        assert_eq!(state.value_color, layout::MEASUREMENT_GREEN);
        assert_eq!(state.units_text, "mmol/l");
        assert_eq!(state.trend.unwrap().tile_index(), 0);
        assert_eq!(state.timestamp_text, "Last updated: t");
        assert_eq!(state.low_text, "4.0");
        assert_eq!(state.high_text, "7.8");
        assert!(state.info_text.is_empty());
    }

    #[test]
    fn integral_values_render_without_decimals() {
        let mut reading = mmol_reading();
        reading.value = 100.0;
        reading.units = GlucoseUnits::from_flag(1);
        let state = project(&reading, false);
        assert_eq!(state.value_text, "100");
        assert_eq!(state.units_text, "mg/dL");
    }

    #[test]
    fn conversion_applies_only_to_mg_dl_readings() {
        let mut reading = mmol_reading();
        reading.value = 180.0;
        reading.units = GlucoseUnits::from_flag(1);

        let converted = project(&reading, true);
        assert_eq!(converted.value_text, "9.99");
        assert_eq!(converted.units_text, "mmol/l");

        // Already mmol/L; the flag must not convert twice.
        let unchanged = project(&mmol_reading(), true);
        assert_eq!(unchanged.value_text, "5.6");
        assert_eq!(unchanged.units_text, "mmol/l");
    }

    #[test]
    fn out_of_range_color_code_projects_the_neutral_color() {
        let mut reading = mmol_reading();
        reading.color = MeasurementColor::from_code(9);
        let state = project(&reading, false);
        assert_eq!(state.value_color, layout::MEASUREMENT_NEUTRAL);
    }
}
