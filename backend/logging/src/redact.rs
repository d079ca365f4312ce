//! Address redaction.
//!
//! Page addresses regularly carry session tokens in their query, fragment or userinfo.
//! Only scheme, host and path are ever logged.

use regex::Regex;
use std::sync::LazyLock;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*://)(?:[^/?#@]*@)?(?P<rest>[^?#]*)(?P<tail>[?#].*)?$")
        .unwrap()
});
static EMBEDDED_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[A-Za-z][A-Za-z0-9+.\-]*://[^\s"'<>]+"#).unwrap());
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-._~+/]+=*").unwrap());

/// Strip userinfo, query and fragment from `address`. Non-hierarchical addresses
/// (`about:`, `data:`) keep only their scheme.
pub fn redact_address(address: &str) -> String {
    let address = address.trim();
    if let Some(caps) = ADDRESS_RE.captures(address) {
        let mut out = format!("{}{}", &caps["scheme"], &caps["rest"]);
        if caps.name("tail").is_some() {
            out.push_str("?[REDACTED]");
        }
        return out;
    }
    match address.split_once(':') {
        Some((scheme, rest)) if !rest.is_empty() => format!("{scheme}:[REDACTED]"),
        _ => address.to_string(),
    }
}

/// Redact every address and bearer token embedded in free text such as an error message.
pub fn redact_text(input: &str) -> String {
    let redacted = EMBEDDED_URL_RE.replace_all(input, |caps: &regex::Captures| redact_address(&caps[0]));
    BEARER_RE.replace_all(&redacted, "Bearer [REDACTED]").into_owned()
}
