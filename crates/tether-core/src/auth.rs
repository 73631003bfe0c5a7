//! Interactive authentication challenge detection
//!
//! Some game-session clients only announce a pending device sign-in as
//! human-readable diagnostic text ("open the page https://www.microsoft.com/link
//! and use the code AB12CD"). The detector scans that side channel and turns
//! the prompt into a structured [`AuthChallenge`].

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::OperatorId;

/// Recent side-channel text kept to match prompts split across deliveries
const TAIL_LIMIT: usize = 1024;

static LINK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?microsoft\.com/(?:link|devicelogin)\S*").unwrap()
});

static CODE_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcode\b[:\s]+(\S+)").unwrap());

/// A pending interactive sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub verification_url: Option<String>,
    pub user_code: Option<String>,
    /// Operator whose join triggered the sign-in
    pub operator: Option<OperatorId>,
    pub detected_at: DateTime<Utc>,
}

/// Scans side-channel text for sign-in prompts
#[derive(Debug, Default)]
pub struct AuthChallengeDetector {
    tail: String,
    current: Option<AuthChallenge>,
    reported_code: Option<String>,
    operator: Option<OperatorId>,
}

impl AuthChallengeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operator attached to challenges detected from now on
    pub fn set_operator(&mut self, operator: Option<OperatorId>) {
        self.operator = operator;
    }

    /// Feed one fragment of side-channel text.
    ///
    /// Returns a challenge the first time a complete prompt (link marker plus
    /// a well-formed code) is seen. The same code is not reported again until
    /// [`clear`](Self::clear) is called.
    pub fn observe(&mut self, fragment: &str) -> Option<AuthChallenge> {
        if fragment.is_empty() {
            return None;
        }

        self.tail.push_str(fragment);
        self.trim_tail();

        let (url, code) = scan_prompt(&self.tail)?;
        self.tail.clear();

        if self.reported_code.as_deref() == Some(code.as_str()) {
            return None;
        }

        Some(self.install(Some(url), Some(code)))
    }

    /// Record a challenge announced through a typed client event
    pub fn record(&mut self, url: Option<String>, code: Option<String>) -> Option<AuthChallenge> {
        if let Some(current) = &self.current {
            if code.is_none() || current.user_code == code {
                return None;
            }
        }
        if code.is_some() && self.reported_code == code {
            return None;
        }

        Some(self.install(url, code))
    }

    /// The active challenge, if any
    pub fn current(&self) -> Option<&AuthChallenge> {
        self.current.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.current.is_some()
    }

    /// Forget the active challenge and everything seen so far
    pub fn clear(&mut self) {
        self.current = None;
        self.reported_code = None;
        self.tail.clear();
    }

    fn install(&mut self, url: Option<String>, code: Option<String>) -> AuthChallenge {
        let challenge = AuthChallenge {
            verification_url: url,
            user_code: code.clone(),
            operator: self.operator.clone(),
            detected_at: Utc::now(),
        };
        self.reported_code = code;
        self.current = Some(challenge.clone());
        challenge
    }

    fn trim_tail(&mut self) {
        if self.tail.len() <= TAIL_LIMIT {
            return;
        }
        let mut cut = self.tail.len() - TAIL_LIMIT;
        while !self.tail.is_char_boundary(cut) {
            cut += 1;
        }
        self.tail.drain(..cut);
    }
}

/// Find a link marker and a complete, well-formed code in `text`
fn scan_prompt(text: &str) -> Option<(String, String)> {
    let marker = LINK_MARKER.find(text)?;
    let url = normalize_url(marker.as_str());

    for caps in CODE_KEYWORD.captures_iter(text) {
        let token = caps.get(1)?;
        let raw = token.as_str();
        let code = trim_punctuation(raw);
        // An unterminated token at the end of the buffer may still be cut off.
        let terminated = token.end() < text.len()
            || raw.trim_end_matches(is_punctuation).len() < raw.len();
        if !terminated {
            continue;
        }
        if is_valid_code(code) {
            return Some((url, code.to_string()));
        }
    }

    None
}

fn normalize_url(raw: &str) -> String {
    let url = trim_punctuation(raw);
    if url.to_ascii_lowercase().starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '(' | ')' | '"' | '\'')
}

fn trim_punctuation(s: &str) -> &str {
    s.trim_matches(is_punctuation)
}

fn is_valid_code(code: &str) -> bool {
    (6..=12).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
