/// Redis-style glob match: `*` matches any run, `?` matches one char,
/// `[abc]`, `[a-z]` and `[^x]` match one char from a class, `\` escapes the
/// next char. An unterminated `[` is a literal.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` and the key index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                k += 1;
                continue;
            }
            Some('[') => {
                if let Some((matched, next)) = match_class(&pattern, p, key[k]) {
                    if matched {
                        p = next;
                        k += 1;
                        continue;
                    }
                } else if key[k] == '[' {
                    p += 1;
                    k += 1;
                    continue;
                }
            }
            Some('\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == key[k] {
                    p += 2;
                    k += 1;
                    continue;
                }
            }
            Some(c) if *c == key[k] => {
                p += 1;
                k += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, star_k)) => {
                p = star + 1;
                k = star_k + 1;
                backtrack = Some((star, star_k + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Match `c` against the class opening at `pattern[start]`.
///
/// Returns whether it matched and the index just past the closing `]`, or
/// `None` when the class is unterminated.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    loop {
        let ch = *pattern.get(i)?;
        if ch == ']' {
            break;
        }
        if ch == '\\' {
            matched |= *pattern.get(i + 1)? == c;
            i += 2;
        } else if pattern.get(i + 1) == Some(&'-') && pattern.get(i + 2).is_some_and(|h| *h != ']') {
            let hi = pattern[i + 2];
            let (lo, hi) = if ch <= hi { (ch, hi) } else { (hi, ch) };
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= ch == c;
            i += 1;
        }
    }

    Some((matched != negate, i + 1))
}
