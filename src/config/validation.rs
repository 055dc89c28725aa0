//! Template, address and URL validation utilities.

use minijinja::{Environment, UndefinedBehavior};
use reqwest::Url;
use std::net::SocketAddr;

/// Validates Jinja template syntax.
pub(crate) fn validate_jinja_template(source: &str) -> Result<(), String> {
    let mut env = Environment::new();
    env.add_template("_validate", source)
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Validates a Jinja template by performing a test render with empty data.
/// Detects runtime errors like unknown filters.
///
/// # Errors
/// Returns an error string if the template syntax is invalid or uses unknown filters.
pub fn validate_template_render(source: &str) -> Result<(), String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.render_str(source, serde_json::json!({}))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Validates a `host:port` socket address.
pub(crate) fn validate_listen_addr(listen: &str) -> Result<(), String> {
    listen
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| format!("'{}' is not a socket address: {}", listen, e))
}

/// Validates that a base URL is absolute http(s) with a host.
pub(crate) fn validate_base_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("'{}' is not a valid URL: {}", url, e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(format!(
                "'{}' must use http or https, not {}",
                url, other
            ));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("'{}' has no host", url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jinja_syntax_errors_are_reported() {
        assert!(validate_jinja_template("{{ name }}").is_ok());
        assert!(validate_jinja_template("{{ name ").is_err());
        assert!(validate_jinja_template("{% if x %}").is_err());
    }

    #[test]
    fn render_test_catches_unknown_filter() {
        assert!(validate_template_render("{{ name | upper }}").is_ok());
        assert!(validate_template_render("{{ name | no_such_filter }}").is_err());
    }

    #[test]
    fn render_test_allows_undefined_variables() {
        assert!(validate_template_render("{{ labels.instance }}").is_ok());
    }

    #[test]
    fn listen_addr_formats() {
        assert!(validate_listen_addr("0.0.0.0:8080").is_ok());
        assert!(validate_listen_addr("[::1]:80").is_ok());
        assert!(validate_listen_addr("localhost").is_err());
        assert!(validate_listen_addr("0.0.0.0:99999").is_err());
    }

    #[test]
    fn base_url_formats() {
        assert!(validate_base_url("https://qyapi.weixin.qq.com/cgi-bin/webhook").is_ok());
        assert!(validate_base_url("http://127.0.0.1:9000").is_ok());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("https://").is_err());
        assert!(validate_base_url("qyapi.weixin.qq.com").is_err());
        assert!(validate_base_url("mailto:ops@example.com").is_err());
    }

    #[test]
    fn base_url_rejects_malformed_host_and_port() {
        assert!(validate_base_url("http://127.0.0.1:99999/cgi-bin/webhook").is_err());
        assert!(validate_base_url("https://qyapi weixin/cgi-bin").is_err());
        assert!(validate_base_url("http://[::1/webhook").is_err());
        assert!(validate_base_url("http://[::1]:8080/webhook").is_ok());
    }
}
