mod config;
mod console;
mod debug_flags;
mod framebuffer;
mod http_client;
mod layout;
mod librelink;
mod trend_icons;
mod views;
mod wifi;

use anyhow::Result;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use log::info;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::framebuffer::{Framebuffer, CHUNK_LINES, FB_HEIGHT, FB_WIDTH};
use crate::librelink::ApiError;

// ── Pins (ST7789 over plain SPI) ────────────────────────────────────
const PIN_LCD_SCLK: i32 = 10;
const PIN_LCD_MOSI: i32 = 11;
const PIN_LCD_CS: i32 = 9;
const PIN_LCD_DC: i32 = 8;
const PIN_LCD_RST: i32 = 12;

// ── SPI ─────────────────────────────────────────────────────────────
const PCLK_HZ: u32 = 24_000_000;

// ── Timing ──────────────────────────────────────────────────────────
const WIFI_RETRY_SECS: u64 = 30;
const FAILURE_WARN_EVERY: u32 = 10;

// ── Helpers ─────────────────────────────────────────────────────────

fn esp_check(res: esp_idf_sys::esp_err_t, msg: &str) -> Result<()> {
    if res != esp_idf_sys::ESP_OK {
        Err(anyhow::anyhow!("{} (err {})", msg, res))
    } else {
        Ok(())
    }
}

// ── Display init ────────────────────────────────────────────────────

struct LcdContext {
    panel: esp_idf_sys::esp_lcd_panel_handle_t,
}

fn init_display() -> Result<LcdContext> {
    let mut bus_cfg = esp_idf_sys::spi_bus_config_t::default();
    bus_cfg.__bindgen_anon_1.mosi_io_num = PIN_LCD_MOSI;
    bus_cfg.__bindgen_anon_2.miso_io_num = -1;
    bus_cfg.__bindgen_anon_3.quadwp_io_num = -1;
    bus_cfg.__bindgen_anon_4.quadhd_io_num = -1;
    bus_cfg.sclk_io_num = PIN_LCD_SCLK;
    bus_cfg.max_transfer_sz = (FB_WIDTH as i32) * CHUNK_LINES * 2;

    let host = esp_idf_sys::spi_host_device_t_SPI2_HOST;
    esp_check(
        unsafe {
            esp_idf_sys::spi_bus_initialize(
                host,
                &bus_cfg,
                esp_idf_sys::spi_common_dma_t_SPI_DMA_CH_AUTO,
            )
        },
        "spi_bus_initialize",
    )?;

    let mut io: esp_idf_sys::esp_lcd_panel_io_handle_t = std::ptr::null_mut();
    let mut io_cfg = esp_idf_sys::esp_lcd_panel_io_spi_config_t::default();
    io_cfg.cs_gpio_num = PIN_LCD_CS;
    io_cfg.dc_gpio_num = PIN_LCD_DC;
    io_cfg.spi_mode = 0;
    io_cfg.pclk_hz = PCLK_HZ;
    io_cfg.trans_queue_depth = 10;
    io_cfg.lcd_cmd_bits = 8;
    io_cfg.lcd_param_bits = 8;
    esp_check(
        unsafe {
            esp_idf_sys::esp_lcd_new_panel_io_spi(
                host as esp_idf_sys::esp_lcd_spi_bus_handle_t,
                &io_cfg,
                &mut io,
            )
        },
        "esp_lcd_new_panel_io_spi",
    )?;

    let mut panel: esp_idf_sys::esp_lcd_panel_handle_t = std::ptr::null_mut();
    let mut panel_cfg = esp_idf_sys::esp_lcd_panel_dev_config_t::default();
    panel_cfg.reset_gpio_num = PIN_LCD_RST;
    panel_cfg.__bindgen_anon_1.rgb_ele_order =
        esp_idf_sys::lcd_rgb_element_order_t_LCD_RGB_ELEMENT_ORDER_RGB;
    panel_cfg.data_endian = esp_idf_sys::lcd_rgb_data_endian_t_LCD_RGB_DATA_ENDIAN_BIG;
    panel_cfg.bits_per_pixel = 16;
    esp_check(
        unsafe { esp_idf_sys::esp_lcd_new_panel_st7789(io, &panel_cfg, &mut panel) },
        "esp_lcd_new_panel_st7789",
    )?;

    esp_check(unsafe { esp_idf_sys::esp_lcd_panel_reset(panel) }, "panel_reset")?;
    esp_check(unsafe { esp_idf_sys::esp_lcd_panel_init(panel) }, "panel_init")?;
    // Landscape: swap axes and mirror so (0,0) lands top-left on the
    // 320x240 canvas the framebuffer renders.
    esp_check(unsafe { esp_idf_sys::esp_lcd_panel_swap_xy(panel, true) }, "panel_swap_xy")?;
    esp_check(unsafe { esp_idf_sys::esp_lcd_panel_mirror(panel, false, true) }, "panel_mirror")?;
    // ST7789 modules want inversion on for correct colors.
    esp_check(
        unsafe { esp_idf_sys::esp_lcd_panel_invert_color(panel, true) },
        "panel_invert_color",
    )?;
    esp_check(
        unsafe { esp_idf_sys::esp_lcd_panel_disp_on_off(panel, true) },
        "disp_on",
    )?;

    info!("Display initialized OK");
    Ok(LcdContext { panel })
}

// ── Boot splash screen ──────────────────────────────────────────────

fn draw_splash(fb: &mut Framebuffer, status: &str) {
    use embedded_graphics::{
        mono_font::MonoTextStyle,
        prelude::*,
        text::{Alignment, Text},
    };
    use profont::{PROFONT_14_POINT, PROFONT_24_POINT};

    fb.clear_color(layout::BG);
    let cx = (fb.size().width as i32) / 2;
    let cy = (fb.size().height as i32) / 2;

    let title_style = MonoTextStyle::new(&PROFONT_24_POINT, layout::TEXT_PRIMARY);
    Text::with_alignment(
        "Glucose Monitor",
        Point::new(cx, cy - 30),
        title_style,
        Alignment::Center,
    )
    .draw(fb)
    .ok();

    let status_style = MonoTextStyle::new(&PROFONT_14_POINT, layout::TEXT_INFO);
    Text::with_alignment(status, Point::new(cx, cy + 20), status_style, Alignment::Center)
        .draw(fb)
        .ok();
}

/// Sleep in one-second steps, returning early when the console requests an
/// immediate refresh.
fn sleep_with_refresh(secs: u32) {
    for _ in 0..secs {
        if debug_flags::REQUEST_REFRESH.swap(false, Ordering::Relaxed) {
            info!("Refresh requested; polling now");
            return;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}

// ── Entry point ─────────────────────────────────────────────────────

fn main() -> Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("BOOT — libre-dash glucose dashboard v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Display init + immediate splash screen ──
    let ctx = init_display()?;
    let mut fb = Framebuffer::new(FB_WIDTH, FB_HEIGHT);
    draw_splash(&mut fb, "Starting...");
    fb.flush_to_panel(ctx.panel);

    // ── 2. Peripherals ──
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 3. NVS config ──
    let nvs = EspNvs::new(nvs_partition.clone(), config::NS, true)?;
    let cfg = config::Config::load(&nvs);
    let wifi_ssid = cfg.wifi_ssid.clone();
    let wifi_pass = cfg.wifi_pass.clone();

    let nvs = Arc::new(Mutex::new(nvs));
    let cfg = Arc::new(Mutex::new(cfg));

    // ── 4. Console (serial interactive) ──
    console::spawn_console(nvs.clone(), cfg.clone());

    // ── 5. WiFi (keep trying until the station has an IP) ──
    if wifi_ssid.is_empty() {
        log::warn!("No WiFi SSID configured (use console: wifi set <ssid> <pass>)");
    }
    draw_splash(&mut fb, &format!("Connecting to '{}'...", wifi_ssid));
    fb.flush_to_panel(ctx.panel);

    let result = wifi::connect_wifi(peripherals.modem, sysloop.clone(), &wifi_ssid, &wifi_pass)?;
    let mut wifi_handle = result.wifi;
    let mut connected = result.connected;
    if let Some(ip) = &result.ip_address {
        info!("Network up ({})", ip);
    }
    while !connected {
        draw_splash(&mut fb, "WiFi failed, retrying...");
        fb.flush_to_panel(ctx.panel);
        std::thread::sleep(Duration::from_secs(WIFI_RETRY_SECS));
        match wifi::reconnect_existing(wifi_handle.as_mut(), sysloop.clone()) {
            Ok(Some(ip)) => {
                info!("Network up ({})", ip);
                connected = true;
            }
            Ok(None) => {}
            Err(e) => log::warn!("WiFi reconnect error: {}", e),
        }
    }

    // ── 6. Sign in ──
    draw_splash(&mut fb, "Signing in...");
    fb.flush_to_panel(ctx.panel);

    let (api_base, api_user, api_pass) = {
        let c = cfg.lock().unwrap();
        (c.api_base.clone(), c.api_user.clone(), c.api_pass.clone())
    };
    if api_user.is_empty() {
        log::warn!("No account configured (use console: account set <email> <pass>)");
    }
    let mut token = match librelink::login(&api_base, &api_user, &api_pass) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("Login failed: {}", e);
            None
        }
    };

    // ── 7. Poll loop ──
    info!("Entering poll loop");
    let mut display = views::DisplayState::new();
    views::dashboard::draw(&mut fb, &display);
    fb.flush_to_panel(ctx.panel);

    let mut consecutive_failures: u32 = 0;
    loop {
        let (api_base, convert_mmol, poll_secs, backoff_secs) = {
            let c = cfg.lock().unwrap();
            (c.api_base.clone(), c.convert_mmol, c.poll_secs, c.backoff_secs)
        };

        let result = match token.as_deref() {
            Some(t) => librelink::fetch_glucose(&api_base, t),
            None => Err(ApiError::Auth),
        };

        match result {
            Ok(reading) => {
                consecutive_failures = 0;
                info!(
                    "Glucose: {} {} ({}) at {}",
                    reading.value,
                    reading.units.label(),
                    reading.trend.label(),
                    reading.timestamp
                );
                display = views::project(&reading, convert_mmol);
                if debug_flags::is_on(&debug_flags::DEBUG_DISPLAY) {
                    info!(
                        "Render: value={} units={} tile={:?}",
                        display.value_text,
                        display.units_text,
                        display.trend.map(|t| t.tile_index())
                    );
                }
                views::dashboard::draw(&mut fb, &display);
                fb.flush_to_panel(ctx.panel);
                sleep_with_refresh(poll_secs);
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                if consecutive_failures == 1
                    || consecutive_failures.is_multiple_of(FAILURE_WARN_EVERY)
                {
                    log::warn!(
                        "Glucose fetch failed ({} consecutive): {}",
                        consecutive_failures,
                        e
                    );
                } else {
                    info!("Glucose fetch failed ({} consecutive)", consecutive_failures);
                }

                // Previous reading stays on screen; only the info line changes.
                display.info_text = views::ERROR_TEXT.to_string();
                views::dashboard::draw(&mut fb, &display);
                fb.flush_to_panel(ctx.panel);

                match e {
                    ApiError::Auth => {
                        // Expired token or changed credentials: sign in again
                        // so the next cycle has a fresh token.
                        let (user, pass) = {
                            let c = cfg.lock().unwrap();
                            (c.api_user.clone(), c.api_pass.clone())
                        };
                        match librelink::login(&api_base, &user, &pass) {
                            Ok(t) => {
                                info!("Re-login OK");
                                token = Some(t);
                            }
                            Err(e2) => log::warn!("Re-login failed: {}", e2),
                        }
                    }
                    ApiError::Network(_) => {
                        if !wifi::is_associated() {
                            info!("WiFi link down; attempting reconnect...");
                            match wifi::reconnect_existing(wifi_handle.as_mut(), sysloop.clone()) {
                                Ok(Some(ip)) => info!("WiFi back up ({})", ip),
                                Ok(None) => info!("WiFi reconnect did not succeed"),
                                Err(e2) => log::warn!("WiFi reconnect error: {}", e2),
                            }
                        }
                    }
                    _ => {}
                }

                sleep_with_refresh(backoff_secs);
            }
        }
    }
}
