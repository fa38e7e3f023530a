//! Display rendering.
//!
//! Turns the outcome of one dispatch into the string that goes into the
//! display region. Everything here is pure; the dispatcher owns the I/O.

use pulldown_cmark::{html, Options, Parser};

use crate::models::AskResponse;

/// Shown while a request is in flight.
pub const LOADING: &str = "🧠 Thinking...";

/// Shown when the backend answered without a usable `response` field.
pub const NO_RESPONSE: &str = "No response.";

/// Shown when the request failed or the body could not be parsed.
pub const FAILURE: &str = "❌ Failed to get a response.";

/// Result of a single dispatch, before rendering.
#[derive(Debug, Clone)]
pub enum Outcome {
    Answer(AskResponse),
    Failed(String),
}

/// Converts Markdown to HTML. The output is not sanitized.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Renders an outcome into display content.
pub fn render(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Answer(answer) => match answer.markdown() {
            Some(md) => markdown_to_html(md),
            None => NO_RESPONSE.to_string(),
        },
        Outcome::Failed(_) => FAILURE.to_string(),
    }
}
