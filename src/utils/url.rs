//! Endpoint URL construction for provider base URLs.

/// Join a provider base URL and an endpoint path with exactly one slash.
///
/// Base URLs from the config file are written by hand and often carry a
/// trailing slash; endpoints may carry a leading one.
///
/// ```
/// use juggler::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.anthropic.com/v1/", "/chat/completions"),
///     "https://api.anthropic.com/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_doubling_slashes() {
        for (base, endpoint) in [
            ("https://api.example.com/v1", "chat/completions"),
            ("https://api.example.com/v1/", "chat/completions"),
            ("https://api.example.com/v1///", "/chat/completions"),
            ("https://api.example.com/v1", "///chat/completions"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "https://api.example.com/v1/chat/completions"
            );
        }
    }

    #[test]
    fn keeps_path_prefixes_of_compatible_gateways() {
        assert_eq!(
            construct_api_url(
                "https://generativelanguage.googleapis.com/v1beta/openai",
                "chat/completions"
            ),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }
}
