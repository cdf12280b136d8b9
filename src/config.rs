use anyhow::Result;
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use log::info;

pub const NS: &str = "app_cfg";

const KEY_WIFI_SSID: &str = "wifi_ssid";
const KEY_WIFI_PASS: &str = "wifi_pass";
const KEY_API_USER: &str = "api_user";
const KEY_API_PASS: &str = "api_pass";
const KEY_API_BASE: &str = "api_base";
const KEY_POLL_SECS: &str = "poll_secs";
const KEY_BACKOFF_SECS: &str = "backoff_s";
const KEY_CONVERT_MMOL: &str = "conv_mmol";

const DEFAULT_WIFI_SSID: &str = match option_env!("LOCAL_WIFI_SSID") {
    Some(v) => v,
    None => "YOUR_WIFI_SSID",
};
const DEFAULT_WIFI_PASS: &str = match option_env!("LOCAL_WIFI_PASS") {
    Some(v) => v,
    None => "",
};
const DEFAULT_API_USER: &str = match option_env!("LOCAL_API_USER") {
    Some(v) => v,
    None => "",
};
const DEFAULT_API_PASS: &str = match option_env!("LOCAL_API_PASSWORD") {
    Some(v) => v,
    None => "",
};
const DEFAULT_API_BASE: &str = "https://api.libreview.io";

pub const DEFAULT_POLL_SECS: u32 = 60;
pub const DEFAULT_BACKOFF_SECS: u32 = 300;

pub struct Config {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub api_user: String,
    pub api_pass: String,
    pub api_base: String,
    pub poll_secs: u32,
    pub backoff_secs: u32,
    pub convert_mmol: bool,
}

/// Read a string from NVS, returning None if the key is absent or on error.
fn nvs_get_str(nvs: &EspNvs<NvsDefault>, key: &str) -> Option<String> {
    // First call with None to get the required buffer length.
    let len = match nvs.str_len(key) {
        Ok(Some(len)) => len,
        _ => return None,
    };

    let mut buf = vec![0u8; len];
    match nvs.get_str(key, &mut buf) {
        Ok(Some(val)) => {
            let s = val.trim_end_matches('\0').to_string();
            if s.is_empty() { None } else { Some(s) }
        }
        _ => None,
    }
}

impl Config {
    /// Load configuration from NVS, falling back to defaults for any missing
    /// keys.
    pub fn load(nvs: &EspNvs<NvsDefault>) -> Config {
        let wifi_ssid = nvs_get_str(nvs, KEY_WIFI_SSID)
            .unwrap_or_else(|| DEFAULT_WIFI_SSID.to_string());
        info!("NVS wifi_ssid = {:?}", wifi_ssid);

        let wifi_pass = nvs_get_str(nvs, KEY_WIFI_PASS)
            .unwrap_or_else(|| DEFAULT_WIFI_PASS.to_string());
        info!("NVS wifi_pass = <{} chars>", wifi_pass.len());

        let api_user = nvs_get_str(nvs, KEY_API_USER)
            .unwrap_or_else(|| DEFAULT_API_USER.to_string());
        info!("NVS api_user = {:?}", api_user);

        let api_pass = nvs_get_str(nvs, KEY_API_PASS)
            .unwrap_or_else(|| DEFAULT_API_PASS.to_string());
        info!("NVS api_pass = <{} chars>", api_pass.len());

        let api_base = nvs_get_str(nvs, KEY_API_BASE)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        info!("NVS api_base = {:?}", api_base);

        let poll_secs = nvs
            .get_u32(KEY_POLL_SECS)
            .unwrap_or(None)
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_POLL_SECS);
        info!("NVS poll_secs = {}", poll_secs);

        let backoff_secs = nvs
            .get_u32(KEY_BACKOFF_SECS)
            .unwrap_or(None)
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_BACKOFF_SECS);
        info!("NVS backoff_s = {}", backoff_secs);

        let convert_mmol = nvs.get_u8(KEY_CONVERT_MMOL).unwrap_or(None).unwrap_or(0) != 0;
        info!("NVS conv_mmol = {}", convert_mmol);

        Config {
            wifi_ssid,
            wifi_pass,
            api_user,
            api_pass,
            api_base,
            poll_secs,
            backoff_secs,
            convert_mmol,
        }
    }

    pub fn save_wifi(nvs: &mut EspNvs<NvsDefault>, ssid: &str, pass: &str) -> Result<()> {
        nvs.set_str(KEY_WIFI_SSID, ssid)?;
        nvs.set_str(KEY_WIFI_PASS, pass)?;
        info!("NVS saved wifi_ssid={:?}", ssid);
        Ok(())
    }

    pub fn save_account(nvs: &mut EspNvs<NvsDefault>, user: &str, pass: &str) -> Result<()> {
        nvs.set_str(KEY_API_USER, user)?;
        nvs.set_str(KEY_API_PASS, pass)?;
        info!("NVS saved api_user={:?} api_pass=<{} chars>", user, pass.len());
        Ok(())
    }

    pub fn save_api_base(nvs: &mut EspNvs<NvsDefault>, base: &str) -> Result<()> {
        nvs.set_str(KEY_API_BASE, base)?;
        info!("NVS saved api_base={:?}", base);
        Ok(())
    }

    pub fn save_poll_secs(nvs: &mut EspNvs<NvsDefault>, secs: u32) -> Result<()> {
        nvs.set_u32(KEY_POLL_SECS, secs)?;
        info!("NVS saved poll_secs={}", secs);
        Ok(())
    }

    pub fn save_backoff_secs(nvs: &mut EspNvs<NvsDefault>, secs: u32) -> Result<()> {
        nvs.set_u32(KEY_BACKOFF_SECS, secs)?;
        info!("NVS saved backoff_s={}", secs);
        Ok(())
    }

    pub fn save_convert_mmol(nvs: &mut EspNvs<NvsDefault>, convert: bool) -> Result<()> {
        nvs.set_u8(KEY_CONVERT_MMOL, if convert { 1 } else { 0 })?;
        info!("NVS saved conv_mmol={}", convert);
        Ok(())
    }
}
