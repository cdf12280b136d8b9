use embedded_graphics::{
    mono_font::MonoTextStyle,
    prelude::*,
    text::{Alignment, Text},
};
use profont::{PROFONT_10_POINT, PROFONT_14_POINT, PROFONT_24_POINT};

use crate::framebuffer::Framebuffer;
use crate::layout::*;
use crate::views::DisplayState;

/// Draw the dashboard: value, units, trend arrow, target band, timestamp,
/// and the info/error line when set.
pub fn draw(fb: &mut Framebuffer, state: &DisplayState) {
    fb.clear_color(BG);

    // Info / error line, top-left. Renders both lines of the fixed error
    // message.
    if !state.info_text.is_empty() {
        let info_style = MonoTextStyle::new(&PROFONT_10_POINT, TEXT_INFO);
        Text::new(&state.info_text, Point::new(INFO_X, INFO_Y), info_style)
            .draw(fb)
            .ok();
    }

    // Big value in the measurement color.
    let value_style = MonoTextStyle::new(&PROFONT_24_POINT, state.value_color);
    Text::with_alignment(
        &state.value_text,
        Point::new(VALUE_CENTER_X, VALUE_Y),
        value_style,
        Alignment::Center,
    )
    .draw(fb)
    .ok();

    // Units label under the value.
    let units_style = MonoTextStyle::new(&PROFONT_14_POINT, TEXT_PRIMARY);
    Text::with_alignment(
        state.units_text,
        Point::new(VALUE_CENTER_X, UNITS_Y),
        units_style,
        Alignment::Center,
    )
    .draw(fb)
    .ok();

    // Target band, low on the left, high on the right.
    let target_value_style = MonoTextStyle::new(&PROFONT_14_POINT, TEXT_PRIMARY);

    let low_label_style = MonoTextStyle::new(&PROFONT_10_POINT, TARGET_LOW_LABEL_COLOR);
    Text::new(
        "TARGET LOW",
        Point::new(TARGET_MARGIN, TARGET_LABEL_Y),
        low_label_style,
    )
    .draw(fb)
    .ok();
    Text::new(
        &state.low_text,
        Point::new(TARGET_MARGIN, TARGET_VALUE_Y),
        target_value_style,
    )
    .draw(fb)
    .ok();

    let high_label_style = MonoTextStyle::new(&PROFONT_10_POINT, TARGET_HIGH_LABEL_COLOR);
    Text::with_alignment(
        "TARGET HIGH",
        Point::new(SCREEN_W - TARGET_MARGIN, TARGET_LABEL_Y),
        high_label_style,
        Alignment::Right,
    )
    .draw(fb)
    .ok();
    Text::with_alignment(
        &state.high_text,
        Point::new(SCREEN_W - TARGET_MARGIN, TARGET_VALUE_Y),
        target_value_style,
        Alignment::Right,
    )
    .draw(fb)
    .ok();

    // Trend arrow sprite.
    if let Some(trend) = state.trend {
        trend.draw(fb, TREND_X, TREND_Y);
    }

    // Timestamp along the bottom edge.
    let ts_style = MonoTextStyle::new(&PROFONT_10_POINT, TEXT_PRIMARY);
    Text::with_alignment(
        &state.timestamp_text,
        Point::new(VALUE_CENTER_X, TIMESTAMP_Y),
        ts_style,
        Alignment::Center,
    )
    .draw(fb)
    .ok();
}
