//! Flat spam-keyword list surfaced next to a verdict. Informational only.

pub const SPAM_KEYWORDS: &[&str] = &[
    "free",
    "win",
    "winner",
    "cash",
    "offer",
    "claim",
    "urgent",
    "prize",
    "money",
    "congratulations",
    "click",
    "link",
    "subscribe",
    "buy",
    "order",
    "limited",
    "verify",
    "account",
];

/// Every list entry appearing in `message` (case-insensitive substring), in list order.
pub fn keywords_found(message: &str) -> Vec<String> {
    let text = message.to_lowercase();
    SPAM_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .map(|k| k.to_string())
        .collect()
}
