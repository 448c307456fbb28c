//! Template rendering collaborator.
//!
//! The core only sees the [`Render`] trait: a template name plus a JSON
//! context in, bytes out. [`Templates`] is the directory-backed
//! implementation used by the demo binary.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, anyhow};
use minijinja::Environment;
use serde_json::Value as JsonValue;

pub trait Render: Send + Sync {
    fn render(&self, template: &str, context: &JsonValue) -> anyhow::Result<Vec<u8>>;
}

/// Renders minijinja templates (`{{ name }}` substitution and friends)
/// stored under a base directory.
#[derive(Debug, Clone)]
pub struct Templates {
    base_dir: PathBuf,
}

impl Templates {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn map_path(&self, name: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(name.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }
}

impl Render for Templates {
    fn render(&self, template: &str, context: &JsonValue) -> anyhow::Result<Vec<u8>> {
        let path = self
            .map_path(template)
            .ok_or_else(|| anyhow!("template name '{}' escapes the template directory", template))?;
        let source = fs::read_to_string(&path).with_context(|| {
            format!(
                "template '{}' not found in {}",
                template,
                self.base_dir.display()
            )
        })?;

        let mut env = Environment::new();
        env.add_template(template, &source)
            .with_context(|| format!("template '{}' failed to compile", template))?;
        let rendered = env
            .get_template(template)?
            .render(context)
            .with_context(|| format!("template '{}' failed to render", template))?;

        Ok(rendered.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_path_prevents_traversal() {
        let t = Templates::new("templates");
        assert!(t.map_path("../Cargo.toml").is_none());
        assert!(t.map_path("a/../../b").is_none());
        assert_eq!(
            t.map_path("./hello.html"),
            Some(PathBuf::from("templates/hello.html"))
        );
    }

    #[test]
    fn renders_context() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hi.html"), "<h1>Hello {{ name }}!</h1>").unwrap();

        let t = Templates::new(dir.path());
        let out = t.render("hi.html", &json!({ "name": "World" })).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<h1>Hello World!</h1>");
    }

    #[test]
    fn missing_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = Templates::new(dir.path());
        let err = t.render("nope.html", &json!({})).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
