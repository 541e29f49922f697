use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a config template next to the target directory if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../h264jpeg.template.toml");

    let template = r#"# h264jpeg configuration template
# Copy this file to 'h264jpeg.toml' in the working directory and adjust

# JPEG quality used when none is given (1-100, out of range falls back to 85)
default_quality = 85

# Upper bound on a single hardware round trip, in milliseconds
timeout_ms = 1000

# Capacity of the decoder input buffer in bytes
input_buffer_size = 524288
"#;

    if !template_path.exists() {
        let _ = fs::write(template_path, template);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
