//! Text pipeline applied to outgoing chat bodies
//!
//! Chat text (never command lines) is run through a small series of
//! word-level rewrites before it is persisted and broadcast:
//! - inline directives: `(cap)`, `(up)`, `(low)` re-case the previous word,
//!   `(cap, n)` and friends re-case the previous n words, `(hex)`/`(bin)`
//!   convert the previous word to decimal, and `a` before a vowel becomes
//!   `an`
//! - punctuation spacing and quote padding are normalized
//! - denylisted terms are masked down to their first character

const VOWELISH: &str = "aeiouhAEIOUH";
const PUNCTUATION: &str = ".,!?:;";

/// Run the full pipeline over one chat body.
pub fn refine(text: &str, denylist: &[String], mask_char: char) -> String {
    let text = manipulate(text);
    let text = punctuate(&text);
    let text = fix_quotes(&text);
    mask(&text, denylist, mask_char)
}

/// Strip non-printable bytes, keeping printable ASCII plus a small
/// allow-list of accented letters.
pub fn sanitize(msg: &str) -> String {
    msg.chars()
        .filter(|&c| (' '..='~').contains(&c) || matches!(c, 'ö' | 'ä' | 'å'))
        .collect()
}

/// First alphanumeric character of each word uppercased, the rest lowered.
pub fn capitalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if word_start {
                out.push(c.to_ascii_uppercase());
                word_start = false;
            } else {
                out.push(c.to_ascii_lowercase());
            }
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// Apply the inline word directives and drop the consumed directive tokens.
fn manipulate(text: &str) -> String {
    let mut words: Vec<String> = text.split(' ').map(str::to_string).collect();
    let mut consumed = vec![false; words.len()];

    for i in 0..words.len() {
        match words[i].as_str() {
            "a" | "A" => {
                let vowel_next = words
                    .get(i + 1)
                    .and_then(|next| next.chars().next())
                    .is_some_and(|c| VOWELISH.contains(c));
                if vowel_next {
                    words[i].push('n');
                }
            }
            "(hex)" if i > 0 => {
                words[i - 1] = i64::from_str_radix(&words[i - 1], 16)
                    .unwrap_or(0)
                    .to_string();
                consumed[i] = true;
            }
            "(bin)" if i > 0 => {
                words[i - 1] = i64::from_str_radix(&words[i - 1], 2)
                    .unwrap_or(0)
                    .to_string();
                consumed[i] = true;
            }
            "(cap)" if i > 0 => {
                words[i - 1] = capitalize(&words[i - 1]);
                consumed[i] = true;
            }
            "(up)" if i > 0 => {
                words[i - 1] = words[i - 1].to_uppercase();
                consumed[i] = true;
            }
            "(low)" if i > 0 => {
                words[i - 1] = words[i - 1].to_lowercase();
                consumed[i] = true;
            }
            "(cap," | "(up," | "(low," if i > 0 => {
                let directive = words[i].clone();
                let n = words
                    .get(i + 1)
                    .map(|w| {
                        let digits: String =
                            w.chars().take_while(|&c| c != ')').collect();
                        digits.parse::<usize>().unwrap_or(0)
                    })
                    .unwrap_or(0);
                for j in 1..=n {
                    let Some(target) = i.checked_sub(j) else { break };
                    words[target] = match directive.as_str() {
                        "(cap," => capitalize(&words[target]),
                        "(up," => words[target].to_uppercase(),
                        _ => words[target].to_lowercase(),
                    };
                }
                consumed[i] = true;
                if i + 1 < consumed.len() {
                    consumed[i + 1] = true;
                }
            }
            _ => {}
        }
    }

    let kept: Vec<&str> = words
        .iter()
        .zip(&consumed)
        .filter(|(_, &gone)| !gone)
        .map(|(w, _)| w.as_str())
        .collect();
    kept.join(" ").trim().to_string()
}

/// No space before punctuation, exactly one after.
fn punctuate(input: &str) -> String {
    let mut text = input.to_string();
    for mark in PUNCTUATION.chars() {
        text = text.replace(&format!(" {mark}"), &mark.to_string());
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if PUNCTUATION.contains(c) {
            if let Some(&next) = chars.get(i + 1) {
                if !PUNCTUATION.contains(next) && next != ' ' {
                    out.push(' ');
                }
            }
        }
    }
    out
}

/// Trim padding inside single-quote pairs; an unclosed quote is closed at
/// the end of the text.
fn fix_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quoted = String::new();
    let mut in_quote = false;

    for c in text.chars() {
        if c == '\'' {
            if in_quote {
                out.push('\'');
                out.push_str(quoted.trim());
                out.push('\'');
                quoted.clear();
            }
            in_quote = !in_quote;
        } else if in_quote {
            quoted.push(c);
        } else {
            out.push(c);
        }
    }

    if in_quote {
        out.push('\'');
        out.push_str(quoted.trim());
        out.push('\'');
    }
    out.trim().to_string()
}

/// Replace all but the first character of denylisted words with `mask_char`.
/// Matching is case-insensitive and ignores surrounding punctuation.
fn mask(text: &str, denylist: &[String], mask_char: char) -> String {
    if denylist.is_empty() {
        return text.to_string();
    }

    let masked: Vec<String> = text
        .split(' ')
        .map(|word| {
            let core = word.trim_matches(|c: char| !c.is_alphanumeric());
            let hit = !core.is_empty()
                && denylist.iter().any(|term| term.eq_ignore_ascii_case(core));
            if !hit {
                return word.to_string();
            }
            let mut replacement = String::with_capacity(core.len());
            for (i, c) in core.chars().enumerate() {
                replacement.push(if i == 0 { c } else { mask_char });
            }
            word.replacen(core, &replacement, 1)
        })
        .collect();
    masked.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> String {
        refine(text, &[], '*')
    }

    #[test]
    fn uppercases_previous_word() {
        assert_eq!(run("hello (up)"), "HELLO");
    }

    #[test]
    fn capitalizes_previous_word() {
        assert_eq!(run("welcome home (cap)"), "welcome Home");
    }

    #[test]
    fn lowercases_multiple_words() {
        assert_eq!(run("SO LOUD (low, 2)"), "so loud");
    }

    #[test]
    fn converts_hex_and_binary() {
        assert_eq!(run("1E (hex) files added"), "30 files added");
        assert_eq!(run("10 (bin) years"), "2 years");
    }

    #[test]
    fn article_becomes_an_before_vowel() {
        assert_eq!(run("a elephant"), "an elephant");
        assert_eq!(run("A honest man"), "An honest man");
        assert_eq!(run("a dog"), "a dog");
    }

    #[test]
    fn punctuation_spacing() {
        assert_eq!(run("hello ,world"), "hello, world");
        assert_eq!(run("wait ... what"), "wait... what");
    }

    #[test]
    fn quote_padding_trimmed() {
        assert_eq!(run("he said ' hi there '"), "he said 'hi there'");
        assert_eq!(run("unterminated ' quote"), "unterminated 'quote'");
    }

    #[test]
    fn denylist_masking() {
        let denylist = vec!["rust".to_string()];
        assert_eq!(refine("i love Rust!", &denylist, '*'), "i love R***!");
        assert_eq!(refine("rustling leaves", &denylist, '*'), "rustling leaves");
    }

    #[test]
    fn sanitize_drops_control_bytes() {
        assert_eq!(sanitize("ok\x07\x1bhere"), "okhere");
        assert_eq!(sanitize("smörgås"), "smörgås");
        assert_eq!(sanitize("café"), "caf");
    }
}
