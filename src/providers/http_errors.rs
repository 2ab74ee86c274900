use anyhow::anyhow;
use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_matches(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

/// Rewrites a transport failure into a message that names the knob to turn.
pub(crate) fn completion_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: Option<u64>,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        let after = timeout_secs
            .map(|secs| format!(" after {secs}s"))
            .unwrap_or_default();
        return anyhow!(
            "Completion request timed out{} while calling '{}'. \
             Increase MODEL_TIMEOUT_SECS or retry later.",
            after,
            api_url
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by completion endpoint at '{}'. \
                 Check OPENROUTER_API_URL.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to completion endpoint at '{}'. \
             Check OPENROUTER_API_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call completion endpoint at '{}': {}", api_url, err)
}
