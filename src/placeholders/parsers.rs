pub(super) const LINE_COMMENT: &[u8; 2] = b"--";
pub(super) const BLOCK_OPEN: &[u8; 2] = b"/*";
pub(super) const BLOCK_CLOSE: &[u8; 2] = b"*/";

pub(super) fn token_at(bytes: &[u8], idx: usize, token: &[u8; 2]) -> bool {
    bytes.get(idx..idx + 2) == Some(token.as_slice())
}

/// `$tag$` opener at `start` (`$$` included): the tag and the index of its closing `$`.
/// `$1` is a positional parameter, never a tag.
pub(super) fn dollar_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let rest = bytes.get(start + 1..)?;
    if rest.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let len = rest
        .iter()
        .position(|&b| !(b.is_ascii_alphanumeric() || b == b'_'))?;
    if rest[len] != b'$' {
        return None;
    }
    let tag = std::str::from_utf8(&rest[..len]).ok()?.to_owned();
    Some((tag, start + 1 + len))
}

pub(super) fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let Some(rest) = bytes.get(idx..) else {
        return false;
    };
    rest.first() == Some(&b'$')
        && rest[1..].starts_with(tag.as_bytes())
        && rest.get(tag.len() + 1) == Some(&b'$')
}
