use std::sync::OnceLock;

use regex::Regex;

static DA_RESPONSE_RE: OnceLock<Regex> = OnceLock::new();

fn da_response_re() -> &'static Regex {
    DA_RESPONSE_RE.get_or_init(|| {
        // Device attributes responses: optional ESC, "[", "?" or ">",
        // digits/semicolons, terminated by "c". Some terminals leak the
        // sequence with the ESC already stripped, so match both forms.
        Regex::new(r"(?:\x1b\[|\[)[?>][0-9;]*c").expect("device attributes regex")
    })
}

/// Strip terminal "device attributes" identification responses from output.
///
/// These show up in the visible stream when the child process answers an
/// identification query that the viewer-side emulator also answers. All
/// other bytes, including unrelated escape sequences, pass through
/// unchanged.
pub fn strip_terminal_identity_responses(text: &str) -> String {
    da_response_re().replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_da_response_with_esc_prefix() {
        assert_eq!(strip_terminal_identity_responses("\x1b[?1;2c"), "");
        assert_eq!(strip_terminal_identity_responses("hi\x1b[?1;2c\r\n"), "hi\r\n");
    }

    #[test]
    fn removes_da_response_without_esc_prefix() {
        assert_eq!(strip_terminal_identity_responses("[?1;2c"), "");
        assert_eq!(strip_terminal_identity_responses("hi[?1;2c\r\n"), "hi\r\n");
    }

    #[test]
    fn removes_secondary_da_response() {
        assert_eq!(strip_terminal_identity_responses("\x1b[>0;276;0c"), "");
    }

    #[test]
    fn leaves_other_escape_sequences_alone() {
        let colored = "\x1b[31mred\x1b[0m";
        assert_eq!(strip_terminal_identity_responses(colored), colored);
        let cursor = "\x1b[2J\x1b[H prompt $ ";
        assert_eq!(strip_terminal_identity_responses(cursor), cursor);
    }

    #[test]
    fn is_idempotent() {
        for input in ["hi\x1b[?1;2c\r\n", "[?1;2c", "plain text", "\x1b[31mred\x1b[0m"] {
            let once = strip_terminal_identity_responses(input);
            let twice = strip_terminal_identity_responses(&once);
            assert_eq!(once, twice);
        }
    }
}
