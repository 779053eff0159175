//! JSON output for CLI commands
//!
//! Every command prints one JSON object with a `success` flag so scripts can
//! consume stdout directly; logs go to stderr.

use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Project root for relative path calculation
    root: PathBuf,
}

impl OutputContext {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Path relative to the project root, or unchanged when outside it
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    /// Print `data`'s fields next to `"success": true`
    pub fn print_success_flat<T: Serialize>(&self, data: T) {
        print_json(&success_flat(data));
    }

    pub fn print_error(&self, message: &str) {
        print_json(&serde_json::json!({
            "success": false,
            "error": message
        }));
    }
}

fn success_flat<T: Serialize>(data: T) -> serde_json::Value {
    let mut response = serde_json::to_value(data).unwrap_or(serde_json::json!({}));
    if let Some(obj) = response.as_object_mut() {
        obj.insert("success".to_string(), serde_json::json!(true));
    }
    response
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let ctx = OutputContext::new(PathBuf::from("/project"));

        assert_eq!(
            ctx.relative_path(Path::new("/project/src/Nat.aya")),
            "src/Nat.aya"
        );
        assert_eq!(ctx.relative_path(Path::new("/other/Nat.aya")), "/other/Nat.aya");
    }

    #[test]
    fn test_success_flag_is_merged() {
        let value = success_flat(serde_json::json!({ "computed": "Nat" }));
        assert_eq!(value["success"], true);
        assert_eq!(value["computed"], "Nat");
    }
}
