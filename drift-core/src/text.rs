use regex::Regex;
use std::sync::OnceLock;

fn thinking_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<thinking>.*?</thinking>|<think>.*?</think>|<reasoning>.*?</reasoning>")
            .expect("valid thinking regex")
    })
}

fn code_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Keeps only the fenced body; the language tag is optional.
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
    })
}

fn markdown_emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*|__|`").expect("valid emphasis regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace regex"))
}

/// Strips `<think>`-style reasoning blocks from a completion.
pub fn filter_model_output(text: &str) -> String {
    let out = thinking_re().replace_all(text, "");
    out.trim().to_string()
}

/// Returns the body of the first fenced code block, or the input unchanged.
pub fn unfence(text: &str) -> &str {
    code_fence_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text)
}

/// Drops Markdown emphasis markers and collapses runs of spaces.
pub fn strip_markdown(text: &str) -> String {
    let out = markdown_emphasis_re().replace_all(text, "");
    let out = whitespace_re().replace_all(&out, " ");
    out.trim().to_string()
}
