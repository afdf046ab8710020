use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Packets buffered per framer refill when nothing else is configured.
pub const DEFAULT_BUFFER_PACKETS: usize = 1000;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Process-wide defaults for sources and compositions.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of 188-byte packets read per framer refill
    pub buffer_packets: usize,
    /// Default of the multiplexer's continuity fixing flag
    pub fix_continuity: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_packets: DEFAULT_BUFFER_PACKETS,
            fix_continuity: false,
        }
    }
}

impl Config {
    fn new() -> Self {
        let mut config = Config::default();

        // Environment variables first
        if let Ok(value) = env::var("TSPLICE_BUFFER_PACKETS") {
            config.apply("buffer_packets", &value);
        }
        if let Ok(value) = env::var("TSPLICE_FIX_CONTINUITY") {
            config.apply("fix_continuity", &value);
        }

        // Then config files
        let config_paths = ["./config.toml", "./tsplice_config.toml"];
        for path in &config_paths {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    config.apply_file(&content);
                }
            }
        }

        config
    }

    /// Applies every recognised `key = value` line of a config file.
    pub fn apply_file(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                self.apply(key.trim(), value);
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "buffer_packets" => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.buffer_packets = n,
                _ => log::warn!("Ignoring invalid buffer_packets value '{}'", value),
            },
            "fix_continuity" => match value.trim() {
                "true" | "1" | "yes" => self.fix_continuity = true,
                "false" | "0" | "no" => self.fix_continuity = false,
                _ => log::warn!("Ignoring invalid fix_continuity value '{}'", value),
            },
            _ => {}
        }
    }

    /// Re-reads environment variables and config files into the global configuration.
    pub fn reload() {
        let new_config = Config::new();
        *CONFIG.write() = new_config;
    }
}

/// Returns the configured framer refill size, in packets
pub fn get_buffer_packets() -> usize {
    CONFIG.read().buffer_packets
}

/// Returns the configured default for continuity fixing
pub fn get_fix_continuity() -> bool {
    CONFIG.read().fix_continuity
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# tsplice configuration

# Packets read per framer refill
buffer_packets = 1000

# Rewrite continuity counters across source boundaries by default
fix_continuity = false
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_file() {
        let mut config = Config::default();
        config.apply_file(
            "# comment\nbuffer_packets = \"250\"\nfix_continuity = true\nunknown = 3\n",
        );
        assert_eq!(
            config,
            Config {
                buffer_packets: 250,
                fix_continuity: true,
            }
        );
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let mut config = Config::default();
        config.apply_file("buffer_packets = 0\nfix_continuity = maybe\n");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let path = std::env::temp_dir().join("tsplice_config_template_test.toml");
        let _ = std::fs::remove_file(&path);
        create_default_config_template(&path).unwrap();

        let mut config = Config {
            buffer_packets: 7,
            fix_continuity: true,
        };
        config.apply_file(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(config, Config::default());
        std::fs::remove_file(&path).unwrap();
    }
}
