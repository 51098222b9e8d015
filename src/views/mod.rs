//! View engine
//!
//! Server-rendered pages use Tera templates compiled into the binary.
//! Templates live under `templates/` and are registered by their relative
//! path, e.g. `tags/index.html`.

use anyhow::Result;
use rust_embed::RustEmbed;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ViewError;

/// Embedded page templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct Templates;

/// Embedded client assets served under `/static`
#[derive(RustEmbed)]
#[folder = "static/"]
pub struct StaticAssets;

/// Template renderer
pub struct ViewEngine {
    tera: Tera,
}

impl ViewEngine {
    /// Compile every embedded template.
    pub fn new() -> Result<Self> {
        let mut templates: Vec<(String, String)> = Vec::new();
        for name in Templates::iter() {
            let file = Templates::get(&name)
                .ok_or_else(|| ViewError::TemplateError(format!("Missing template {}", name)))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ViewError::TemplateError(format!("Template {} is not UTF-8", name)))?;
            templates.push((name.to_string(), content));
        }

        Self::from_templates(templates)
    }

    /// Build an engine from in-memory templates.
    pub fn from_templates(mut templates: Vec<(String, String)>) -> Result<Self> {
        // Layouts first so children can resolve their parent
        templates.sort_by(|a, b| {
            let a_is_layout = a.0 == "layout.html";
            let b_is_layout = b.0 == "layout.html";
            b_is_layout.cmp(&a_is_layout)
        });

        let mut tera = Tera::default();
        for (name, content) in &templates {
            tera.add_raw_template(name, content).map_err(|e| {
                ViewError::TemplateError(format!("Failed to add template {}: {}", name, e))
            })?;
        }
        tera.build_inheritance_chains().map_err(|e| {
            ViewError::TemplateError(format!("Failed to build template inheritance: {}", e))
        })?;

        tracing::debug!("Loaded {} templates", templates.len());
        Ok(Self { tera })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ViewError::TemplateError(error_msg).into()
        })
    }

    /// Names of all registered templates
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }

    /// Minimal page used when nothing else can be rendered
    pub fn simple_error_page(title: &str, message: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{title}</h1>
<p>{message}</p>
<p><a href="/noticias">Back to the news list</a></p>
</body>
</html>"#,
            title = escape_html(title),
            message = escape_html(message),
        )
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_templates_compile() {
        let engine = ViewEngine::new().expect("embedded templates must compile");
        let names = engine.template_names();

        for expected in [
            "layout.html",
            "news/index.html",
            "news/_form.html",
            "tags/index.html",
            "users/edit.html",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_render_with_inheritance() {
        let engine = ViewEngine::from_templates(vec![
            ("child.html".into(), r#"{% extends "layout.html" %}{% block content %}Hi {{ name }}{% endblock %}"#.into()),
            ("layout.html".into(), "<main>{% block content %}{% endblock %}</main>".into()),
        ])
        .unwrap();

        let mut ctx = TeraContext::new();
        ctx.insert("name", "<Ana>");

        let html = engine.render("child.html", &ctx).unwrap();
        assert_eq!(html, "<main>Hi &lt;Ana&gt;</main>");
    }

    #[test]
    fn test_render_unknown_template_fails() {
        let engine = ViewEngine::from_templates(Vec::new()).unwrap();
        let err = engine.render("missing.html", &TeraContext::new()).unwrap_err();
        assert!(err.to_string().contains("missing.html"));
    }

    #[test]
    fn test_simple_error_page_escapes() {
        let html = ViewEngine::simple_error_page("Oops", "<script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_client_script_is_embedded() {
        let js = StaticAssets::get("js/noticias.js").expect("script must be embedded");
        let text = std::str::from_utf8(&js.data).unwrap();
        assert!(text.contains("RequestVerificationToken"));
    }
}
