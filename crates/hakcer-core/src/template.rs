//! Replacement template expansion.
//!
//! Templates follow the JavaScript `String.prototype.replace` grammar so
//! rule sets authored for browser engines keep their meaning:
//!
//! | Token | Expands to |
//! |-------|------------|
//! | `$$` | a literal `$` |
//! | `$&` | the whole match |
//! | `` $` `` | text before the match |
//! | `$'` | text after the match |
//! | `$n`, `$nn` | capture group `n` (1-99) |
//! | `$<name>` | named capture group |
//!
//! Anything else after `$` is emitted literally.

use regex::Captures;

/// Append the expansion of `template` for one match to `out`.
pub fn expand(
    template: &str,
    caps: &Captures<'_>,
    haystack: &str,
    has_named_groups: bool,
    out: &mut String,
) {
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let consumed = substitute(tail, caps, haystack, has_named_groups, out);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
}

/// Expand the token following a `$`. Returns the bytes consumed from `tail`.
fn substitute(
    tail: &str,
    caps: &Captures<'_>,
    haystack: &str,
    has_named_groups: bool,
    out: &mut String,
) -> usize {
    let bytes = tail.as_bytes();
    let group_count = caps.len().saturating_sub(1);
    let whole = caps.get(0);

    match bytes.first() {
        Some(b'$') => {
            out.push('$');
            1
        }
        Some(b'&') => {
            if let Some(m) = whole {
                out.push_str(m.as_str());
            }
            1
        }
        Some(b'`') => {
            if let Some(m) = whole {
                out.push_str(&haystack[..m.start()]);
            }
            1
        }
        Some(b'\'') => {
            if let Some(m) = whole {
                out.push_str(&haystack[m.end()..]);
            }
            1
        }
        Some(&d) if d.is_ascii_digit() => {
            let first = usize::from(d - b'0');
            if let Some(&d2) = bytes.get(1).filter(|c| c.is_ascii_digit()) {
                let two = first * 10 + usize::from(d2 - b'0');
                if (1..=group_count).contains(&two) {
                    push_group(caps, two, out);
                    return 2;
                }
            }
            if (1..=group_count).contains(&first) {
                push_group(caps, first, out);
                return 1;
            }
            out.push('$');
            0
        }
        Some(b'<') if has_named_groups => {
            let Some(end) = tail.find('>') else {
                out.push('$');
                return 0;
            };
            if let Some(m) = caps.name(&tail[1..end]) {
                out.push_str(m.as_str());
            }
            end + 1
        }
        _ => {
            out.push('$');
            0
        }
    }
}

/// Unmatched optional groups expand to nothing.
fn push_group(caps: &Captures<'_>, index: usize, out: &mut String) {
    if let Some(m) = caps.get(index) {
        out.push_str(m.as_str());
    }
}
