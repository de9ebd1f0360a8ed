//! Post-processing of model text before it reaches the user.

pub const EMPTY_REPLY_FALLBACK: &str =
    "I could not produce an answer this time. Please rephrase the question or try again.";

pub const CONTINUATION_HINT: &str =
    "(The answer may have been cut off. Reply \"continue\" to get the rest.)";

const MARKDOWN_DELIMITERS: &[char] = &['*', '_', '#', '`', '~', '|', '>', '-', '='];
const DANGLING_PUNCTUATION: &[char] = &[',', ':', '-', ';'];
const OPENING_BRACKETS: &[char] = &['(', '[', '{'];

/// Reply used when the follow-up after function calls never produced text.
pub fn follow_up_fallback(functions_run: usize) -> String {
    let noun = if functions_run == 1 { "function" } else { "functions" };
    format!(
        "I ran {functions_run} {noun} for your request but could not summarize the results. \
         Please ask again or narrow the question."
    )
}

/// Heuristic check for a reply that stopped mid-output.
pub fn looks_truncated(text: &str) -> bool {
    let body = text.trim();
    if body.is_empty() {
        return false;
    }
    if body.chars().all(|ch| MARKDOWN_DELIMITERS.contains(&ch) || ch.is_whitespace()) {
        return true;
    }
    if body.ends_with(DANGLING_PUNCTUATION) || body.ends_with(OPENING_BRACKETS) {
        return true;
    }
    body.matches("```").count() % 2 == 1
}

/// Append the continuation hint when the reply looks cut off.
pub fn finalize(text: &str) -> (String, bool) {
    if looks_truncated(text) {
        (format!("{}\n\n{CONTINUATION_HINT}", text.trim_end()), true)
    } else {
        (text.to_string(), false)
    }
}
