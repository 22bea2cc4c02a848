//! Expansion of user-supplied storage paths.

use std::env;
use std::path::PathBuf;

/// Replace every `${VAR}` with the value of the environment variable.
///
/// Unset variables expand to the empty string. An unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Expand a leading `~` to the home directory, then `${VAR}` references.
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env_vars(raw);

    let home_relative = expanded
        .strip_prefix("~/")
        .or_else(|| expanded.strip_prefix("~\\"));
    match (home_relative, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        (None, Some(home)) if expanded == "~" => home,
        _ => PathBuf::from(expanded),
    }
}
