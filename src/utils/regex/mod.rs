use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Compiled regex patterns shared across the response composer and command
/// interpreter. Centralized here so each pattern is compiled exactly once.
pub struct RegexPatterns;

impl RegexPatterns {
    /// `**bold**` markdown decoration.
    pub fn markdown_bold() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\*\*(.+?)\*\*").expect("Failed to compile markdown bold regex")
        });
        &RE
    }

    /// `~~strike~~` markdown decoration.
    pub fn markdown_strike() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"~~(.+?)~~").expect("Failed to compile markdown strike regex")
        });
        &RE
    }

    /// `[text](url)` markdown link syntax.
    pub fn markdown_link() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("Failed to compile markdown link regex")
        });
        &RE
    }

    /// `_italic_` markdown decoration.
    pub fn markdown_italic() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"_(.+?)_").expect("Failed to compile markdown italic regex")
        });
        &RE
    }

    /// `` `code` `` markdown decoration.
    pub fn markdown_code() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"`([^`]+)`").expect("Failed to compile markdown code regex")
        });
        &RE
    }

    /// Bare `http(s)://...` URLs, stripped before speech synthesis.
    pub fn bare_url() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"https?://\S+").expect("Failed to compile bare URL regex")
        });
        &RE
    }

    /// Emoji codepoints (a conservative block covering the common ranges).
    pub fn emoji() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                "[\u{1F300}-\u{1FAFF}\u{2600}-\u{27BF}\u{2190}-\u{21FF}\u{2B00}-\u{2BFF}\u{FE0F}]",
            )
            .expect("Failed to compile emoji regex")
        });
        &RE
    }

    /// Run of horizontal whitespace.
    pub fn whitespace() -> &'static Regex {
        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"[ \t]+").expect("Failed to compile whitespace regex"));
        &RE
    }

    /// Three or more consecutive newlines, collapsed to two.
    pub fn newlines() -> &'static Regex {
        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\n{3,}").expect("Failed to compile newlines regex"));
        &RE
    }

    /// Reasoning/narration markup: `<think>...</think>`.
    pub fn think_block() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?s)<think>.*?</think>").expect("Failed to compile think-block regex")
        });
        &RE
    }

    /// Data URI: `data:<mime>;base64,<payload>`.
    pub fn data_uri() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^data:([a-zA-Z0-9!#$&\-^_.+/]+);base64,(.+)$")
                .expect("Failed to compile data URI regex")
        });
        &RE
    }

    /// Alphanumeric/underscore words, 2+ characters — used by the calendar
    /// keyword search's prefix-of-four token matching.
    pub fn words() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"[A-Za-z0-9_]{2,}").expect("Failed to compile words regex")
        });
        &RE
    }
}

/// Compile a regex pattern with proper error handling (used for ad-hoc
/// patterns built from user/config input, e.g. per-companion name variants).
pub fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Failed to compile regex pattern: {}", pattern))
}

#[cfg(test)]
mod tests;
