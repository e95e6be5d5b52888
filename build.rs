use std::env;

fn main() {
    // Homebrew keeps the GStreamer and cairo .pc files outside the default search path
    if cfg!(target_os = "macos") {
        let homebrew_prefix = "/opt/homebrew";
        let pkg_config_paths = [
            format!("{}/lib/pkgconfig", homebrew_prefix),
            format!("{}/share/pkgconfig", homebrew_prefix),
        ];

        let existing_path = env::var("PKG_CONFIG_PATH").unwrap_or_default();
        let new_path = if existing_path.is_empty() {
            pkg_config_paths.join(":")
        } else {
            format!("{}:{}", pkg_config_paths.join(":"), existing_path)
        };
        env::set_var("PKG_CONFIG_PATH", &new_path);
        println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    }

    // PLUGIN_VARIANT lets two builds of the element live in one registry
    // (e.g. a "basic" profile build next to the default one)
    let plugin_variant = env::var("PLUGIN_VARIANT").unwrap_or_default();
    println!("cargo:rustc-env=PLUGIN_VARIANT={}", plugin_variant);
    println!("cargo:rerun-if-env-changed=PLUGIN_VARIANT");

    let type_suffix: String = plugin_variant
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                c.to_ascii_uppercase()
            } else if c.is_ascii_alphanumeric() {
                c
            } else {
                '_'
            }
        })
        .collect();

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR should be set by Cargo");
    let type_names_path = std::path::Path::new(&out_dir).join("type_names.rs");
    let type_names_code = format!(
        r#"// Auto-generated type names for variant: {}
pub const MARKER_DETECT_TYPE_NAME: &str = "GstMarkerDetect{}";
"#,
        plugin_variant, type_suffix
    );
    std::fs::write(&type_names_path, type_names_code).expect("Failed to write type names file");

    if !plugin_variant.is_empty() {
        println!("cargo:warning=PLUGIN_VARIANT is set to: {}", plugin_variant);
    }

    gst_plugin_version_helper::info()
}
