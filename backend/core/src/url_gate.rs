//! Capturability check for target addresses.

/// Address prefixes that can never be captured: browser-internal pages,
/// extension-hosted pages, internal search pages and the extension store.
pub const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "chrome-search://",
    "chrome-untrusted://",
    "devtools://",
    "edge://",
    "extension://",
    "about:",
    "view-source:",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
    "https://microsoftedge.microsoft.com/addons",
];

/// Whether a capture may be attempted on `address`. Empty and missing addresses are not capturable.
pub fn is_capturable(address: Option<&str>) -> bool {
    let Some(address) = address.map(str::trim) else {
        return false;
    };
    if address.is_empty() {
        return false;
    }
    let lower = address.to_ascii_lowercase();
    !RESTRICTED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}
