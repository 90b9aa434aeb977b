//! Fixed PII scrubbing rules.
//!
//! The rule table is versioned: changing a pattern or placeholder requires
//! bumping `PII_RULESET_VERSION` so downstream consumers can detect the
//! change in their audit trails. Rules are applied in table order — the
//! card pattern runs before the looser phone pattern so 16-digit sequences
//! are consumed first.

use regex::Regex;

/// Version of the rule table below.
pub const PII_RULESET_VERSION: &str = "1";

/// One scrubbing rule: pattern in, placeholder out.
#[derive(Debug, Clone, Copy)]
pub struct PiiRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub placeholder: &'static str,
}

/// The fixed rule set. Order matters.
pub const PII_RULES: &[PiiRule] = &[
    PiiRule {
        name: "email",
        pattern: r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}",
        placeholder: "[EMAIL]",
    },
    PiiRule {
        name: "ssn",
        pattern: r"\b\d{3}-\d{2}-\d{4}\b",
        placeholder: "[SSN]",
    },
    PiiRule {
        name: "card",
        pattern: r"\b(?:\d[ -]?){15}\d\b",
        placeholder: "[CARD]",
    },
    PiiRule {
        name: "phone",
        pattern: r"(?:\+\d{1,3}[- ]?)?(?:\(\d{3}\)[- ]?|\b\d{3}[- ])(?:\d{3}[- ]\d{4}|\d{4})\b",
        placeholder: "[PHONE]",
    },
];

/// Compiled rule table. Construction is infallible because the patterns
/// are fixed and covered by tests.
pub struct PiiScrubber {
    rules: Vec<(Regex, &'static str)>,
}

impl PiiScrubber {
    pub fn new() -> Self {
        let rules = PII_RULES
            .iter()
            .map(|rule| {
                let regex = Regex::new(rule.pattern)
                    .unwrap_or_else(|e| panic!("invalid PII pattern '{}': {e}", rule.name));
                (regex, rule.placeholder)
            })
            .collect();
        Self { rules }
    }

    /// Replace every match of every rule with its placeholder.
    pub fn scrub(&self, text: &str) -> String {
        let mut out = std::borrow::Cow::Borrowed(text);
        for (regex, placeholder) in &self.rules {
            if regex.is_match(&out) {
                out = std::borrow::Cow::Owned(regex.replace_all(&out, *placeholder).into_owned());
            }
        }
        out.into_owned()
    }
}

impl Default for PiiScrubber {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrub(text: &str) -> String {
        PiiScrubber::new().scrub(text)
    }

    #[test]
    fn emails_are_replaced() {
        let out = scrub("Contact me at john.doe@example.com for details");
        assert!(!out.contains("john.doe@example.com"));
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("Contact me at"));
    }

    #[test]
    fn phone_numbers_are_replaced() {
        for text in [
            "Call me at +1-555-123-4567 today",
            "Call me at 555-123-4567 today",
            "Phone: 555-1234",
            "Office 555 123 4567 line",
        ] {
            let out = scrub(text);
            assert!(out.contains("[PHONE]"), "not scrubbed: {text} -> {out}");
            assert!(!out.contains("555-123-4567"));
        }
    }

    #[test]
    fn ssn_is_replaced() {
        let out = scrub("SSN: 123-45-6789");
        assert!(!out.contains("123-45-6789"));
        assert!(out.contains("[SSN]"));
    }

    #[test]
    fn card_numbers_are_replaced() {
        for text in [
            "Card: 4532-1234-5678-9010",
            "Card: 4532 1234 5678 9010",
            "Card: 4532123456789010",
        ] {
            let out = scrub(text);
            assert!(out.contains("[CARD]"), "not scrubbed: {text} -> {out}");
            assert!(!out.contains("9010"));
        }
    }

    #[test]
    fn multiple_pii_kinds_in_one_text() {
        let out = scrub("Email: test@example.com, Phone: 555-1234, SSN: 123-45-6789");
        assert!(!out.contains("test@example.com"));
        assert!(!out.contains("555-1234"));
        assert!(!out.contains("123-45-6789"));
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("[PHONE]"));
        assert!(out.contains("[SSN]"));
    }

    #[test]
    fn non_pii_text_is_untouched() {
        let text = "This is a normal sentence without sensitive data.";
        assert_eq!(scrub(text), text);
    }

    #[test]
    fn email_and_phone_in_one_sentence() {
        let out = scrub("email me at a@b.com or call 555-123-4567");
        assert!(!out.contains("a@b.com"));
        assert!(!out.contains("555-123-4567"));
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("[PHONE]"));
    }
}
