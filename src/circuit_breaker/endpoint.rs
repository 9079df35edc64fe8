use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Segment written in place of an identifier-like path segment
pub const PARAM_PLACEHOLDER: &str = "{param}";

/// Purely numeric segments and `{name}` templates, raw or percent-encoded
static PARAM_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+|\{\w+\}|(?i:%7B)\w+(?i:%7D))$").unwrap());

/// Collapse an endpoint to its template key.
///
/// `https://a.b/orders/12345?x=1` and `https://a.b/orders/67890` both become
/// `https://a.b/orders/{param}`. Inputs without a scheme and host are handled
/// as bare paths, so `/orders/12345` becomes `/orders/{param}`. Query strings
/// and fragments are dropped. Normalizing a normalized key returns it unchanged.
pub fn normalize_endpoint(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) if url.has_host() && !url.cannot_be_a_base() => {
            let host = url.host_str().unwrap_or_default();
            let authority = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            format!(
                "{}://{}{}",
                url.scheme(),
                authority,
                normalize_path(url.path())
            )
        }
        _ => {
            let path = raw.split(['?', '#']).next().unwrap_or_default();
            normalize_path(path)
        }
    }
}

fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if PARAM_SEGMENT.is_match(segment) {
                PARAM_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_share_a_key() {
        assert_eq!(
            normalize_endpoint("https://a.b/orders/12345?x=1"),
            normalize_endpoint("https://a.b/orders/67890")
        );
        assert_eq!(
            normalize_endpoint("https://a.b/orders/12345?x=1"),
            "https://a.b/orders/{param}"
        );
    }

    #[test]
    fn test_template_segments() {
        assert_eq!(
            normalize_endpoint("https://api.example.com/users/{userId}/orders/42"),
            "https://api.example.com/users/{param}/orders/{param}"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com/users/%7Bid%7D"),
            "https://api.example.com/users/{param}"
        );
    }

    #[test]
    fn test_mixed_segments_are_kept() {
        assert_eq!(
            normalize_endpoint("https://a.b/v2/orders/12ab"),
            "https://a.b/v2/orders/12ab"
        );
    }

    #[test]
    fn test_port_is_kept_and_fragment_dropped() {
        assert_eq!(
            normalize_endpoint("http://localhost:8080/items/7#top"),
            "http://localhost:8080/items/{param}"
        );
    }

    #[test]
    fn test_bare_paths() {
        assert_eq!(normalize_endpoint("/orders/12345"), "/orders/{param}");
        assert_eq!(normalize_endpoint("/orders/12345?page=2"), "/orders/{param}");
        assert_eq!(normalize_endpoint("/orders/{id}/items"), "/orders/{param}/items");
        assert_eq!(normalize_endpoint("/"), "/");
        assert_eq!(normalize_endpoint(""), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://a.b/orders/12345?x=1",
            "https://a.b",
            "HTTPS://A.B/Orders/1/",
            "http://localhost:8080/items/{sku}/7",
            "/orders/12345",
            "/orders/{id}/items/9?x=y",
            "not a url",
        ];

        for input in inputs {
            let once = normalize_endpoint(input);
            assert_eq!(normalize_endpoint(&once), once, "input: {}", input);
        }
    }
}
