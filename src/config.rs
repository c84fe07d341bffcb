//! Settings read from the environment at startup.
use std::env;
use std::path::Path;

pub const LOG_ENV: &str = "CINDER_LOG";
pub const EDITMODE_ENV: &str = "CINDER_EDITMODE";
pub const PROMPT_ENV: &str = "CINDER_PROMPT";

const DEFAULT_LOG_FILTER: &str = "warn";
const DEFAULT_PROMPT: &str = "cinder> ";
pub const CONTINUATION_PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Emacs,
    Vi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub edit_mode: EditMode,
    pub prompt_template: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let edit_mode = match lookup(EDITMODE_ENV).as_deref() {
            Some("vi") | Some("VI") => EditMode::Vi,
            _ => EditMode::Emacs,
        };
        Self {
            log_filter: lookup(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            edit_mode,
            prompt_template: lookup(PROMPT_ENV).filter(|template| !template.is_empty()),
        }
    }
}

/// Expands `{status}`, `{status?}` (empty on success) and `{cwd}`.
pub fn build_prompt(prompt_template: Option<&str>, last_status: i32, cwd: &Path) -> String {
    let Some(template) = prompt_template else {
        return DEFAULT_PROMPT.to_string();
    };
    let status_str = last_status.to_string();
    let status_opt = if last_status == 0 { "" } else { &status_str };
    template
        .replace("{status?}", status_opt)
        .replace("{status}", &status_str)
        .replace("{cwd}", &cwd.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.edit_mode, EditMode::Emacs);
        assert_eq!(config.prompt_template, None);
    }

    #[test]
    fn reads_overrides() {
        let vars: HashMap<&str, &str> = [
            (LOG_ENV, "debug"),
            (EDITMODE_ENV, "vi"),
            (PROMPT_ENV, "[{status}] {cwd} $ "),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.edit_mode, EditMode::Vi);
        assert_eq!(
            build_prompt(config.prompt_template.as_deref(), 1, Path::new("/tmp")),
            "[1] /tmp $ "
        );
    }

    #[test]
    fn optional_status_hides_success() {
        assert_eq!(build_prompt(Some("{status?}> "), 0, Path::new("/")), "> ");
        assert_eq!(build_prompt(Some("{status?}> "), 2, Path::new("/")), "2> ");
        assert_eq!(build_prompt(None, 2, Path::new("/")), "cinder> ");
    }
}
