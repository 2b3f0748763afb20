//! Whole-document `$NAME` environment-variable expansion, applied to the raw
//! configuration text before it is parsed as YAML. Unlike a per-field
//! `deserialize_with`, this lets any scalar in the document — a URL, a port,
//! a boolean — reference an environment variable without every field needing
//! its own deserializer.

use {crate::error::ConfigError, regex::Regex, std::sync::LazyLock};

static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

pub fn expand(raw: &str) -> Result<String, ConfigError> {
    expand_with(raw, |name| std::env::var(name).ok())
}

fn expand_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = VAR_PATTERN.replace_all(raw, |captures: &regex::Captures| {
        let name = &captures[1];
        match lookup(name) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}
