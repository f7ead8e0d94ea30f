//! Log-line sanitization (spec §4.1, §7).
//!
//! Every dynamic string interpolated into a `tracing` event — connector
//! error messages, tenant-supplied identifiers, upstream response bodies —
//! MUST pass through [`sanitize`] first. It neutralizes CRLF log injection
//! (forging fake log lines), strips ANSI CSI sequences (terminal escape
//! injection against operators tailing logs), and caps length so one
//! oversized upstream payload can't blow out log storage.

const MAX_LEN: usize = 500;
const TRUNCATION_SUFFIX: &str = "…[truncated]";

/// Sanitize `input` for safe inclusion in a single structured log field.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_LEN + TRUNCATION_SUFFIX.len()));
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if out.chars().count() >= MAX_LEN {
            out.push_str(TRUNCATION_SUFFIX);
            return out;
        }
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\x1b' => {
                // ANSI escape: `ESC [ ... <final byte>` (CSI) is the common
                // injection vector. Consume through the final byte (0x40-0x7e)
                // if this looks like a CSI sequence; otherwise drop just the
                // ESC so we don't desync on a lone escape byte.
                if chars.peek() == Some(&'[') {
                    chars.next();
                    while let Some(&next) = chars.peek() {
                        chars.next();
                        if ('\x40'..='\x7e').contains(&next) {
                            break;
                        }
                    }
                }
            }
            c if c.is_control() && c != '\t' => {}
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_crlf() {
        let s = sanitize("line one\r\nFAKE LOG LINE: admin logged in");
        assert!(!s.contains('\n'));
        assert!(!s.contains('\r'));
        assert!(s.contains("\\r\\n"));
    }

    #[test]
    fn strips_ansi_csi_sequences() {
        let s = sanitize("\x1b[31mred text\x1b[0m normal");
        assert_eq!(s, "red text normal");
    }

    #[test]
    fn truncates_oversized_input() {
        let long = "a".repeat(1000);
        let s = sanitize(&long);
        assert!(s.ends_with("…[truncated]"));
        assert!(s.len() < long.len());
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(sanitize("connection refused: timeout after 30s"), "connection refused: timeout after 30s");
    }

    #[test]
    fn preserves_tabs() {
        assert_eq!(sanitize("a\tb"), "a\tb");
    }

    #[test]
    fn drops_other_control_bytes() {
        let s = sanitize("a\x07b\x00c");
        assert_eq!(s, "abc");
    }
}
