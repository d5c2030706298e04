//! Named email templates and rendering.
//!
//! Templates are compiled into the binary and rendered with simple
//! `{{ key }}` substitution. Unknown keys render as empty strings (the
//! templates tolerate partially-filled contexts); an unknown template
//! *name* is an error and takes the dispatcher's failure path.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown email template: {0}")]
    Unknown(String),
}

const WELCOME_HTML: &str = r#"<html>
<body>
  <h1>Welcome, {{ first_name }}!</h1>
  <p>Your member account is ready. Head over to the
     <a href="{{ portal_link }}">member portal</a> to browse upcoming
     events, surveys and documents.</p>
  <p><small>Sent {{ timestamp }}</small></p>
  {{ tracking_pixel }}
</body>
</html>"#;

const PASSWORD_RESET_HTML: &str = r#"<html>
<body>
  <p>Hello {{ first_name }},</p>
  <p>We received a request to reset your password.
     <a href="{{ reset_url }}">Reset it here</a>.
     The link expires in {{ expiry_hours }} hours.</p>
  <p>If you did not request this, you can ignore this message.</p>
  <p><small>Sent {{ timestamp }}</small></p>
  {{ tracking_pixel }}
</body>
</html>"#;

const EVENT_REGISTRATION_HTML: &str = r#"<html>
<body>
  <p>Hello {{ first_name }},</p>
  <p>Your registration for <strong>{{ event_title }}</strong> is confirmed.</p>
  <p>{{ event_start }} &mdash; {{ event_location }}</p>
  <p><a href="{{ event_details_url }}">Event details</a> &middot;
     <a href="{{ calendar_link }}">Add to calendar</a></p>
  <p><small>Sent {{ timestamp }}</small></p>
  {{ tracking_pixel }}
</body>
</html>"#;

const SURVEY_INVITE_HTML: &str = r#"<html>
<body>
  <p>Hello {{ first_name }},</p>
  <p>We would appreciate your feedback: please fill in
     <a href="{{ survey_url }}">{{ survey_title }}</a>.</p>
  <p><small>Sent {{ timestamp }}</small></p>
  {{ tracking_pixel }}
</body>
</html>"#;

const GENERIC_HTML: &str = r#"<html>
<body>
  <p>{{ body }}</p>
  <p><small>Sent {{ timestamp }}</small></p>
  {{ tracking_pixel }}
</body>
</html>"#;

fn source(name: &str) -> Option<&'static str> {
    match name {
        "welcome" => Some(WELCOME_HTML),
        "password_reset" => Some(PASSWORD_RESET_HTML),
        "event_registration" => Some(EVENT_REGISTRATION_HTML),
        "survey_invite" => Some(SURVEY_INVITE_HTML),
        "generic" => Some(GENERIC_HTML),
        _ => None,
    }
}

pub fn render(name: &str, ctx: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let src = source(name).ok_or_else(|| TemplateError::Unknown(name.to_string()))?;
    Ok(substitute(src, ctx))
}

fn substitute(src: &str, ctx: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = ctx.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder; emit as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Derive the text/plain alternative from rendered HTML: drop tags, decode
/// the entities the templates use, and collapse blank lines.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&mdash;", "\u{2014}")
        .replace("&middot;", "\u{b7}")
        .replace("&quot;", "\"");

    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_keys() {
        let rendered = render("welcome", &ctx(&[("first_name", "Amara")])).unwrap();
        assert!(rendered.contains("Welcome, Amara!"));
    }

    #[test]
    fn unknown_keys_render_empty() {
        let rendered = render("welcome", &ctx(&[])).unwrap();
        assert!(rendered.contains("Welcome, !"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let err = render("no_such_template", &ctx(&[])).unwrap_err();
        assert!(matches!(err, TemplateError::Unknown(_)));
    }

    #[test]
    fn strip_tags_removes_markup_and_decodes_entities() {
        let text = strip_tags("<p>Hello &amp; welcome</p>\n<p><a href=\"x\">link</a></p>");
        assert_eq!(text, "Hello & welcome\nlink");
    }

    #[test]
    fn strip_tags_drops_blank_lines() {
        let text = strip_tags("<html>\n<body>\n  <p>one</p>\n\n  <p>two</p>\n</body>\n</html>");
        assert_eq!(text, "one\ntwo");
    }
}
