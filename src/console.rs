use anyhow::Result;
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use log::{info, warn};
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use crate::config::Config;

pub fn spawn_console(nvs: Arc<Mutex<EspNvs<NvsDefault>>>, config: Arc<Mutex<Config>>) {
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(8192)
        .spawn(move || {
            info!("console: ready (type 'help') — use minicom Ctrl+A E for local echo");
            let stdin = io::stdin();
            let mut reader = stdin.lock();
            let mut line = String::new();
            let mut buf = [0u8; 1];
            let mut in_escape = false;
            loop {
                match reader.read(&mut buf) {
                    Ok(1) => {
                        let ch = buf[0];
                        if in_escape {
                            if (ch as char).is_ascii_alphabetic() || ch == b'~' {
                                in_escape = false;
                            }
                            continue;
                        }
                        if ch == 0x1b {
                            in_escape = true;
                            continue;
                        }
                        if ch == b'\n' || ch == b'\r' {
                            if line.is_empty() {
                                continue;
                            }
                            info!("> {}", line);
                            if let Err(e) = process_line(&line, &nvs, &config) {
                                warn!("console: error: {}", e);
                            }
                            line.clear();
                        } else if ch == 0x7f || ch == 0x08 {
                            line.pop();
                        } else if ch >= 0x20 {
                            line.push(ch as char);
                        }
                    }
                    Ok(_) => {
                        std::thread::sleep(std::time::Duration::from_millis(50));
                    }
                    Err(_) => {
                        std::thread::sleep(std::time::Duration::from_millis(100));
                    }
                }
            }
        })
        .expect("failed to spawn console thread");
}

fn process_line(
    line: &str,
    nvs: &Arc<Mutex<EspNvs<NvsDefault>>>,
    config: &Arc<Mutex<Config>>,
) -> Result<()> {
    let clean = line.trim().trim_end_matches('\\');
    if clean.is_empty() {
        return Ok(());
    }
    let mut parts = clean.splitn(3, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let sub = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match cmd {
        "help" | "?" => print_help(),
        "wifi" => handle_wifi(sub, rest, nvs, config)?,
        "account" => handle_account(sub, rest, nvs, config)?,
        "api" => handle_api(sub, rest, nvs, config)?,
        "poll" => handle_poll(sub, rest, nvs, config)?,
        "units" => handle_units(sub, rest, nvs, config)?,
        "refresh" => {
            info!("refresh requested (will run on next tick)");
            crate::debug_flags::REQUEST_REFRESH
                .store(true, std::sync::atomic::Ordering::Relaxed);
        }
        "debug" => handle_debug(sub),
        "status" => {
            let cfg = config.lock().unwrap();
            info!("wifi: {}", if cfg.wifi_ssid.is_empty() { "not configured" } else { &cfg.wifi_ssid });
            info!("account: {}", if cfg.api_user.is_empty() { "not configured" } else { &cfg.api_user });
            info!("api base: {}", cfg.api_base);
            info!("poll interval: {}s", cfg.poll_secs);
            info!("error backoff: {}s", cfg.backoff_secs);
            info!("convert to mmol/l: {}", if cfg.convert_mmol { "on" } else { "off" });
            let heap_kb = unsafe { esp_idf_sys::esp_get_free_heap_size() } / 1024;
            info!("free heap: {} KB", heap_kb);
            info!("debug: {}", crate::debug_flags::status_line());
        }
        "reboot" => {
            info!("console: rebooting now");
            std::thread::sleep(std::time::Duration::from_millis(100));
            unsafe { esp_idf_sys::esp_restart() };
        }
        _ => {
            warn!("console: unknown command '{}' (type 'help')", cmd);
        }
    }
    Ok(())
}

fn print_help() {
    info!("commands:");
    info!("  wifi show                  - show Wi-Fi config");
    info!("  wifi set <ssid> <pass>     - set Wi-Fi credentials");
    info!("  wifi clear                 - clear Wi-Fi override");
    info!("  account show               - show LibreLinkUp account");
    info!("  account set <email> <pass> - set LibreLinkUp credentials");
    info!("  account clear              - clear account override");
    info!("  api show                   - show API base URL");
    info!("  api set-base <url>         - set API base URL (regional hosts)");
    info!("  api clear                  - restore default API base");
    info!("  poll show                  - show polling intervals");
    info!("  poll interval <secs>       - set success poll interval");
    info!("  poll backoff <secs>        - set failure backoff");
    info!("  units show                 - show unit conversion setting");
    info!("  units mmol on|off          - convert mg/dL readings for display");
    info!("  refresh                    - fetch a reading now");
    info!("  debug <module>             - toggle debug for module");
    info!("    modules: wifi, api, display, all");
    info!("  debug show                 - show debug flag status");
    info!("  status                     - show system status");
    info!("  reboot                     - reboot device");
}

fn handle_debug(sub: &str) {
    use crate::debug_flags::*;
    match sub {
        "show" | "" => {
            info!("debug: {}", status_line());
        }
        "wifi" => {
            let on = toggle(&DEBUG_WIFI);
            info!("debug wifi: {}", if on { "ON" } else { "OFF" });
        }
        "api" => {
            let on = toggle(&DEBUG_API);
            info!("debug api: {}", if on { "ON" } else { "OFF" });
        }
        "display" => {
            let on = toggle(&DEBUG_DISPLAY);
            info!("debug display: {}", if on { "ON" } else { "OFF" });
        }
        "all" => {
            // If any flag is off, turn all on; if all on, turn all off
            let any_off =
                !is_on(&DEBUG_WIFI) || !is_on(&DEBUG_API) || !is_on(&DEBUG_DISPLAY);
            set(&DEBUG_WIFI, any_off);
            set(&DEBUG_API, any_off);
            set(&DEBUG_DISPLAY, any_off);
            info!("debug all: {}", if any_off { "ON" } else { "OFF" });
        }
        _ => {
            info!("unknown module '{}'. options: wifi, api, display, all", sub);
        }
    }
}

fn handle_wifi(
    sub: &str,
    rest: &str,
    nvs: &Arc<Mutex<EspNvs<NvsDefault>>>,
    config: &Arc<Mutex<Config>>,
) -> Result<()> {
    match sub {
        "show" => {
            let cfg = config.lock().unwrap();
            info!("wifi ssid: {}", cfg.wifi_ssid);
            let pass_len = cfg.wifi_pass.len();
            info!(
                "wifi pass: {} ({} chars)",
                if pass_len == 0 { "<empty>" } else { "********" },
                pass_len
            );
        }
        "set" => {
            let (ssid, pass) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            let ssid = ssid.trim_matches('"').trim_matches('\'');
            let pass = pass.trim().trim_matches('"').trim_matches('\'');
            if ssid.is_empty() {
                warn!("usage: wifi set <ssid> <password>");
                return Ok(());
            }
            let mut nvs = nvs.lock().unwrap();
            Config::save_wifi(&mut nvs, ssid, pass)?;
            config.lock().unwrap().wifi_ssid = ssid.to_string();
            config.lock().unwrap().wifi_pass = pass.to_string();
            info!("saved: SSID='{}' pass=******** ({} chars)", ssid, pass.len());
            info!("type 'reboot' to apply");
        }
        "clear" => {
            let mut nvs = nvs.lock().unwrap();
            Config::save_wifi(&mut nvs, "", "")?;
            let mut cfg = config.lock().unwrap();
            cfg.wifi_ssid.clear();
            cfg.wifi_pass.clear();
            info!("Wi-Fi override cleared");
        }
        _ => print_help(),
    }
    Ok(())
}

fn handle_account(
    sub: &str,
    rest: &str,
    nvs: &Arc<Mutex<EspNvs<NvsDefault>>>,
    config: &Arc<Mutex<Config>>,
) -> Result<()> {
    match sub {
        "" | "show" => {
            let cfg = config.lock().unwrap();
            info!("account email: {}", if cfg.api_user.is_empty() { "<unset>" } else { &cfg.api_user });
            let pass_len = cfg.api_pass.len();
            info!(
                "account pass: {} ({} chars)",
                if pass_len == 0 { "<empty>" } else { "********" },
                pass_len
            );
        }
        "set" => {
            let (user, pass) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            let user = user.trim_matches('"').trim_matches('\'');
            let pass = pass.trim().trim_matches('"').trim_matches('\'');
            if user.is_empty() || pass.is_empty() {
                warn!("usage: account set <email> <password>");
                return Ok(());
            }
            let mut nvs = nvs.lock().unwrap();
            Config::save_account(&mut nvs, user, pass)?;
            config.lock().unwrap().api_user = user.to_string();
            config.lock().unwrap().api_pass = pass.to_string();
            info!("saved: email='{}' pass=******** ({} chars)", user, pass.len());
            info!("type 'reboot' to sign in again");
        }
        "clear" => {
            let mut nvs = nvs.lock().unwrap();
            Config::save_account(&mut nvs, "", "")?;
            let mut cfg = config.lock().unwrap();
            cfg.api_user.clear();
            cfg.api_pass.clear();
            info!("account override cleared");
        }
        _ => print_help(),
    }
    Ok(())
}

fn handle_api(
    sub: &str,
    rest: &str,
    nvs: &Arc<Mutex<EspNvs<NvsDefault>>>,
    config: &Arc<Mutex<Config>>,
) -> Result<()> {
    match sub {
        "" | "show" => {
            let cfg = config.lock().unwrap();
            info!("api base: {}", cfg.api_base);
        }
        "set-base" => {
            let base = rest.trim().trim_matches('"').trim_matches('\'').trim_end_matches('/');
            if base.is_empty() || !base.starts_with("https://") {
                warn!("usage: api set-base https://<host>");
                return Ok(());
            }
            let mut nvs = nvs.lock().unwrap();
            Config::save_api_base(&mut nvs, base)?;
            config.lock().unwrap().api_base = base.to_string();
            info!("saved: api base='{}'", base);
        }
        "clear" => {
            let mut nvs = nvs.lock().unwrap();
            Config::save_api_base(&mut nvs, "")?;
            config.lock().unwrap().api_base = "https://api.libreview.io".to_string();
            info!("API base restored to default");
        }
        _ => print_help(),
    }
    Ok(())
}

fn handle_poll(
    sub: &str,
    rest: &str,
    nvs: &Arc<Mutex<EspNvs<NvsDefault>>>,
    config: &Arc<Mutex<Config>>,
) -> Result<()> {
    match sub {
        "" | "show" => {
            let cfg = config.lock().unwrap();
            info!("poll interval: {}s", cfg.poll_secs);
            info!("error backoff: {}s", cfg.backoff_secs);
        }
        "interval" => {
            let Ok(secs) = rest.trim().parse::<u32>() else {
                warn!("usage: poll interval <secs>");
                return Ok(());
            };
            if secs == 0 {
                warn!("poll interval must be at least 1s");
                return Ok(());
            }
            let mut nvs = nvs.lock().unwrap();
            Config::save_poll_secs(&mut nvs, secs)?;
            config.lock().unwrap().poll_secs = secs;
            info!("poll interval: {}s", secs);
        }
        "backoff" => {
            let Ok(secs) = rest.trim().parse::<u32>() else {
                warn!("usage: poll backoff <secs>");
                return Ok(());
            };
            if secs == 0 {
                warn!("poll backoff must be at least 1s");
                return Ok(());
            }
            let mut nvs = nvs.lock().unwrap();
            Config::save_backoff_secs(&mut nvs, secs)?;
            config.lock().unwrap().backoff_secs = secs;
            info!("error backoff: {}s", secs);
        }
        _ => info!("usage: poll show|interval <secs>|backoff <secs>"),
    }
    Ok(())
}

fn handle_units(
    sub: &str,
    rest: &str,
    nvs: &Arc<Mutex<EspNvs<NvsDefault>>>,
    config: &Arc<Mutex<Config>>,
) -> Result<()> {
    match sub {
        "" | "show" => {
            let cfg = config.lock().unwrap();
            info!("convert to mmol/l: {}", if cfg.convert_mmol { "on" } else { "off" });
        }
        "mmol" => {
            let convert = match rest.trim() {
                "on" | "1" | "true" => true,
                "off" | "0" | "false" => false,
                "" | "show" => {
                    let cfg = config.lock().unwrap();
                    info!("convert to mmol/l: {}", if cfg.convert_mmol { "on" } else { "off" });
                    return Ok(());
                }
                _ => {
                    info!("usage: units mmol on|off");
                    return Ok(());
                }
            };
            let mut nvs = nvs.lock().unwrap();
            Config::save_convert_mmol(&mut nvs, convert)?;
            config.lock().unwrap().convert_mmol = convert;
            info!("convert to mmol/l: {}", if convert { "on" } else { "off" });
        }
        _ => info!("usage: units show|mmol on|off"),
    }
    Ok(())
}
