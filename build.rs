use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");

    let template = r#"# tsplice configuration template
# Copy this file to 'config.toml' and adjust the values

# Packets read per framer refill
buffer_packets = 1000

# Rewrite continuity counters across source boundaries by default
fix_continuity = false
"#;

    if let Err(e) = fs::write(&template_path, template) {
        println!(
            "cargo:warning=could not write config template to {}: {}",
            template_path.display(),
            e
        );
    }
    println!("cargo:rerun-if-changed=build.rs");
}
