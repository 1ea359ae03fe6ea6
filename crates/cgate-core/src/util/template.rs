//! Placeholder substitution for embedded file templates.
//!
//! Placeholders are written `{{key}}`. Unknown placeholders are left as-is.

/// Replace every `{{key}}` in `template` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{{{key}}}}}"), value)
    })
}

/// Path text safe to embed in TOML and Rust string literals.
pub fn literal_path(path: &std::path::Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn replaces_all_occurrences() {
        let out = render("{{name}} and {{name}}", &[("name", "token")]);
        assert_eq!(out, "token and token");
    }

    #[test]
    fn leaves_single_braces_and_unknown_keys() {
        let out = render("fn f() {} {{other}} {err}", &[("name", "x")]);
        assert_eq!(out, "fn f() {} {{other}} {err}");
    }

    #[test]
    fn literal_path_uses_forward_slashes() {
        assert_eq!(literal_path(Path::new(r"C:\work\token")), "C:/work/token");
    }
}
