use std::error::Error as StdError;

use reqwest::Response;

/// Maximum characters of a response body echoed into diagnostics.
pub const BODY_SNIPPET_CHARS: usize = 1_500;
/// Maximum lines of an error source chain echoed into diagnostics.
pub const ERROR_CHAIN_LINES: usize = 6;

/// Reads at most enough of `response` to produce a [`BODY_SNIPPET_CHARS`]
/// snippet. The response is consumed.
pub(crate) async fn body_snippet(mut response: Response) -> String {
    // A UTF-8 char is at most 4 bytes.
    let byte_limit = BODY_SNIPPET_CHARS * 4;
    let mut buf = Vec::new();
    while buf.len() < byte_limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(err) => {
                buf.extend_from_slice(format!("<body read failed: {err}>").as_bytes());
                break;
            }
        }
    }
    truncate_chars(&String::from_utf8_lossy(&buf), BODY_SNIPPET_CHARS)
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_owned(),
    }
}

/// Renders `err` and its causes, one per line, capped at [`ERROR_CHAIN_LINES`].
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut lines = Vec::with_capacity(ERROR_CHAIN_LINES);
    let mut current = Some(err);
    while let Some(cause) = current {
        if lines.len() == ERROR_CHAIN_LINES {
            break;
        }
        lines.push(format!("{}: {cause}", lines.len()));
        current = cause.source();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::{fmt, io};

    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("boom", 10), "boom");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        let text = "é".repeat(BODY_SNIPPET_CHARS + 20);
        let snippet = truncate_chars(&text, BODY_SNIPPET_CHARS);
        assert_eq!(snippet.chars().count(), BODY_SNIPPET_CHARS + 1);
        assert!(snippet.ends_with('…'));
    }

    #[derive(Debug)]
    struct Layer(u32, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "layer {}", self.0)
        }
    }

    impl StdError for Layer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.1.as_deref().map(|inner| inner as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn error_chain_is_capped() {
        let mut err = Layer(9, None);
        for depth in (0..9).rev() {
            err = Layer(depth, Some(Box::new(err)));
        }
        let chain = error_chain(&err);
        assert_eq!(chain.lines().count(), ERROR_CHAIN_LINES);
        assert!(chain.starts_with("0: layer 0"));
        assert!(chain.ends_with("5: layer 5"));
    }

    #[test]
    fn error_chain_single_error() {
        let err = io::Error::new(io::ErrorKind::Other, "socket gone");
        assert_eq!(error_chain(&err), "0: socket gone");
    }
}
