//! Secret references in configuration values.
//!
//! `client_id` in `config.toml` may point outside the file:
//!
//! - `pass::path/in/store` reads the first line of `pass show path/in/store`
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is the value itself

use std::process::Command;

/// A configuration value, classified by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    /// An entry in the `pass` password store.
    Pass(&'a str),
    /// An environment variable.
    Env(&'a str),
    /// A literal value.
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    /// Classifies `value` by its prefix.
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else {
            Self::Plain(value)
        }
    }

    /// True for `pass::` and `env::` references.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }

    /// Produces the referenced value.
    pub fn resolve(&self) -> Result<String, String> {
        match *self {
            Self::Pass(path) => resolve_pass(path),
            Self::Env(var) => std::env::var(var)
                .map_err(|_| format!("environment variable `{}` is not set", var)),
            Self::Plain(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, String> {
    SecretRef::parse(value).resolve()
}

fn resolve_pass(path: &str) -> Result<String, String> {
    if path.trim().is_empty() {
        return Err("`pass::` reference has no entry path".to_string());
    }

    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_prefixes() {
        assert_eq!(SecretRef::parse("pass::google/id"), SecretRef::Pass("google/id"));
        assert_eq!(SecretRef::parse("env::GOOGLE_ID"), SecretRef::Env("GOOGLE_ID"));
        assert_eq!(
            SecretRef::parse("x.apps.googleusercontent.com"),
            SecretRef::Plain("x.apps.googleusercontent.com")
        );
        assert!(SecretRef::parse("env::X").is_reference());
        assert!(!SecretRef::parse("env:X").is_reference());
    }

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_CALBRIDGE_TEST_SECRET", "my-secret-value");
        }
        assert_eq!(resolve("env::_CALBRIDGE_TEST_SECRET").unwrap(), "my-secret-value");
        unsafe {
            std::env::remove_var("_CALBRIDGE_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let err = resolve("env::_CALBRIDGE_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(err.contains("not set"));
    }

    #[test]
    fn empty_pass_path_errors() {
        assert!(resolve("pass::").unwrap_err().contains("no entry path"));
    }

    #[test]
    fn pass_prefix_missing_entry_errors() {
        assert!(resolve("pass::nonexistent/entry/that/should/not/exist/12345").is_err());
    }
}
