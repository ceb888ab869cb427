#![forbid(unsafe_code)]

//! Parameter expansion for capability strings.
//!
//! Capability templates use the terminfo parameter language. Only the
//! stack subset that cursor and erase capabilities actually use is
//! evaluated here:
//!
//! | Token | Effect |
//! |-------|--------|
//! | `%%` | literal `%` |
//! | `%i` | add 1 to the first two parameters |
//! | `%p1`..`%p9` | push parameter |
//! | `%{n}` | push integer constant |
//! | `%'c'` | push character constant |
//! | `%+ %- %* %/ %m` | arithmetic on the top two stack entries |
//! | `%d` | pop and print decimal |
//! | `%c` | pop and print as character |
//!
//! Anything else makes the template unusable and [`expand`] returns `None`,
//! which the cost table treats exactly like a missing capability.
//!
//! `$<n>` padding markers are preserved by [`expand`] so the cost model can
//! price them; [`strip_padding`] removes them before bytes hit the wire.

use std::borrow::Cow;

use memchr::{memchr, memchr2};

const MAX_PARAMS: usize = 9;

/// Expand `template` with `params`.
///
/// Missing parameters read as 0 and popping an empty stack yields 0, as in
/// terminfo.
pub fn expand(template: &str, params: &[i32]) -> Option<String> {
    let bytes = template.as_bytes();
    let mut args = [0i32; MAX_PARAMS];
    for (slot, value) in args.iter_mut().zip(params) {
        *slot = *value;
    }

    let mut out = String::with_capacity(template.len() + 8);
    let mut stack: Vec<i32> = Vec::with_capacity(4);
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(rel) = memchr(b'%', &bytes[pos..]) else {
            out.push_str(&template[pos..]);
            break;
        };
        out.push_str(&template[pos..pos + rel]);
        pos += rel + 1;

        let op = *bytes.get(pos)?;
        pos += 1;
        match op {
            b'%' => out.push('%'),
            b'i' => {
                args[0] = args[0].wrapping_add(1);
                args[1] = args[1].wrapping_add(1);
            }
            b'p' => {
                let digit = *bytes.get(pos)?;
                pos += 1;
                let index = match digit {
                    b'1'..=b'9' => usize::from(digit - b'1'),
                    _ => return None,
                };
                stack.push(args[index]);
            }
            b'{' => {
                let close = memchr(b'}', &bytes[pos..])?;
                let value: i32 = template[pos..pos + close].parse().ok()?;
                stack.push(value);
                pos += close + 1;
            }
            b'\'' => {
                let ch = template[pos..].chars().next()?;
                pos += ch.len_utf8();
                if bytes.get(pos) != Some(&b'\'') {
                    return None;
                }
                pos += 1;
                stack.push(ch as i32);
            }
            b'+' | b'-' | b'*' | b'/' | b'm' => {
                let rhs = stack.pop().unwrap_or(0);
                let lhs = stack.pop().unwrap_or(0);
                let value = match op {
                    b'+' => lhs.wrapping_add(rhs),
                    b'-' => lhs.wrapping_sub(rhs),
                    b'*' => lhs.wrapping_mul(rhs),
                    b'/' => lhs.checked_div(rhs).unwrap_or(0),
                    _ => lhs.checked_rem(rhs).unwrap_or(0),
                };
                stack.push(value);
            }
            b'd' => {
                let value = stack.pop().unwrap_or(0);
                out.push_str(&value.to_string());
            }
            b'c' => {
                let value = stack.pop().unwrap_or(0);
                let ch = u32::try_from(value).ok().and_then(char::from_u32)?;
                out.push(ch);
            }
            _ => return None,
        }
    }

    Some(out)
}

/// True when the template contains parameter tokens.
pub fn is_parametrized(template: &str) -> bool {
    let bytes = template.as_bytes();
    let mut pos = 0;
    while let Some(rel) = memchr(b'%', &bytes[pos..]) {
        let next = bytes.get(pos + rel + 1);
        if next != Some(&b'%') {
            return true;
        }
        pos += rel + 2;
    }
    false
}

/// Remove `$<...>` padding markers.
pub fn strip_padding(seq: &str) -> Cow<'_, str> {
    let bytes = seq.as_bytes();
    if !padding_markers(bytes).any(|_| true) {
        return Cow::Borrowed(seq);
    }

    let mut out = String::with_capacity(seq.len());
    let mut pos = 0;
    for (start, end) in padding_markers(bytes) {
        out.push_str(&seq[pos..start]);
        pos = end;
    }
    out.push_str(&seq[pos..]);
    Cow::Owned(out)
}

/// Byte ranges (`start..end`) of each well-formed `$<...>` marker.
pub(crate) fn padding_markers(bytes: &[u8]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < bytes.len() {
            let rel = memchr(b'$', &bytes[pos..])?;
            let start = pos + rel;
            if bytes.get(start + 1) == Some(&b'<')
                && let Some(close) = memchr2(b'>', b'$', &bytes[start + 2..])
                && bytes[start + 2 + close] == b'>'
            {
                let end = start + 2 + close + 1;
                pos = end;
                return Some((start, end));
            }
            pos = start + 1;
        }
        None
    })
}
