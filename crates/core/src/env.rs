//! Startup environment files
//!
//! `.env` and `.env.generated` hold `KEY=VALUE` lines that seed the process
//! environment before the command line is parsed, so `WDM_*` flags can live in
//! a file. Variables already present in the environment are never replaced.
//!
//! Both run before logging is set up, so they return what they changed and
//! leave the reporting to the caller.

use std::path::Path;

use crate::configuration::parse_kv_str;

pub const ENV_FILES: &[&str] = &[".env", ".env.generated"];

/// Variables from `path` that are not already set, in file order.
///
/// A missing file yields nothing.
pub fn pending_env_vars(
    path: &Path,
    lookup: impl Fn(&str) -> bool,
) -> Vec<(String, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };

    parse_kv_str(&content, &path.display().to_string())
        .into_iter()
        .filter(|(key, _)| !lookup(key))
        .collect()
}

/// Load every startup env file found in `dir` into the process environment.
///
/// Returns `(file, key, value)` for each variable that was set.
pub fn load_env_files(dir: &Path) -> Vec<(&'static str, String, String)> {
    let mut loaded = Vec::new();
    for name in ENV_FILES {
        let path = dir.join(name);
        for (key, value) in pending_env_vars(&path, |key| std::env::var_os(key).is_some()) {
            std::env::set_var(&key, &value);
            loaded.push((*name, key, value));
        }
    }
    loaded
}

/// Names starting with `prefix` whose value is empty
pub fn empty_vars<I>(prefix: &str, vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(key, value)| key.starts_with(prefix) && value.is_empty())
        .map(|(key, _)| key)
        .collect()
}

/// Unset the `prefix` variables that are exported but empty, so they count as
/// not given. Returns the removed names.
pub fn clear_empty_vars(prefix: &str) -> Vec<String> {
    let vars = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
    let empty = empty_vars(prefix, vars);
    for key in &empty {
        std::env::remove_var(key);
    }
    empty
}
