use std::{
    collections::HashMap,
    env,
    fs,
    path::PathBuf,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .mscoperc if exists
        if config_path.exists() {
            if let Ok(text) = fs::read_to_string(&config_path) {
                parse_rc(&text, &mut map);
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    #[allow(dead_code)]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn log_storage_path(&self) -> PathBuf {
        PathBuf::from(self.get("LOG_STORAGE_PATH").unwrap())
    }
}

fn parse_rc(text: &str, map: &mut HashMap<String, String>) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or MSCOPE_*/OPENAI_* for forward-compat
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "HARDWARE_CFG_PATH",
        "LOG_STORAGE_PATH",
        "MAX_HEAL_ATTEMPTS",
        "PIP_TIMEOUT",
    ];

    KEYS.contains(&k) || k.starts_with("MSCOPE_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("mscope").join(".mscoperc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    // Paths
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    let mscope_dir = base.join("mscope");

    m.insert(
        "LOG_STORAGE_PATH".into(),
        mscope_dir.join("sessions.jsonl").to_string_lossy().into_owned(),
    );

    // Numbers
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("MAX_HEAL_ATTEMPTS".into(), "8".into());
    m.insert("PIP_TIMEOUT".into(), "300".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("API_BASE_URL".into(), "default".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rc_skips_comments_and_blanks() {
        let mut map = HashMap::new();
        parse_rc("# comment\n\nDEFAULT_MODEL = gpt-4o-mini\nPIP_TIMEOUT=120\n", &mut map);
        assert_eq!(map.get("DEFAULT_MODEL").map(String::as_str), Some("gpt-4o-mini"));
        assert_eq!(map.get("PIP_TIMEOUT").map(String::as_str), Some("120"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn rc_file_overrides_defaults() {
        let mut map = default_map();
        parse_rc("MAX_HEAL_ATTEMPTS=3", &mut map);
        assert_eq!(map.get("MAX_HEAL_ATTEMPTS").map(String::as_str), Some("3"));
    }

    #[test]
    fn known_and_prefixed_keys_accepted() {
        assert!(is_config_key("HARDWARE_CFG_PATH"));
        assert!(is_config_key("OPENAI_API_KEY"));
        assert!(is_config_key("MSCOPE_EXTRA"));
        assert!(!is_config_key("PATH"));
    }
}
