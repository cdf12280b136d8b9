fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=secrets.local.rs");
    println!("cargo:rerun-if-env-changed=API_USER");
    println!("cargo:rerun-if-env-changed=API_PASSWORD");
    emit_local_secrets();
    embuild::espidf::sysenv::output();
}

/// Bake optional credentials into the binary as compile-time defaults.
///
/// Sources, in order: a git-ignored `secrets.local.rs` with
/// `pub const NAME = "...";` lines, then the build environment
/// (`API_USER` / `API_PASSWORD`). NVS values set from the console
/// override these at runtime.
fn emit_local_secrets() {
    let src = std::fs::read_to_string("secrets.local.rs").unwrap_or_default();

    for (const_name, env_out) in [
        ("WIFI_SSID", "LOCAL_WIFI_SSID"),
        ("WIFI_PASS", "LOCAL_WIFI_PASS"),
        ("API_USER", "LOCAL_API_USER"),
        ("API_PASSWORD", "LOCAL_API_PASSWORD"),
    ] {
        if let Some(v) = extract_rust_str_const(&src, const_name) {
            println!("cargo:rustc-env={}={}", env_out, v);
        } else if let Ok(v) = std::env::var(const_name) {
            println!("cargo:rustc-env={}={}", env_out, v);
        }
    }
}

fn extract_rust_str_const(src: &str, name: &str) -> Option<String> {
    for line in src.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            continue;
        }
        let needle = format!("pub const {}", name);
        if !trimmed.starts_with(&needle) {
            continue;
        }
        let start = trimmed.find('"')?;
        let end = trimmed[start + 1..].find('"')? + start + 1;
        return Some(trimmed[start + 1..end].to_string());
    }
    None
}
