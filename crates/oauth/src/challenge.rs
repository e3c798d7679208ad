//! `WWW-Authenticate` header parsing (RFC 9110 section 11.6.1).

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};

/// One authentication challenge. Scheme and parameter names are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WwwAuthenticateChallenge {
    pub scheme: String,
    pub parameters: BTreeMap<String, String>,
    pub token68: Option<String>,
}

/// Every challenge across all `WWW-Authenticate` headers.
#[must_use]
pub fn from_headers(headers: &HeaderMap) -> Vec<WwwAuthenticateChallenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse)
        .collect()
}

#[must_use]
pub fn parse(header: &str) -> Vec<WwwAuthenticateChallenge> {
    let mut challenges = Vec::new();
    let mut rest = header;

    loop {
        rest = skip_separators(rest);
        if rest.is_empty() {
            break;
        }

        let end = token_end(rest);
        if end == 0 {
            // Not a token; skip one character to guarantee progress.
            let mut chars = rest.chars();
            chars.next();
            rest = chars.as_str();
            continue;
        }
        let mut challenge = WwwAuthenticateChallenge {
            scheme: rest[..end].to_ascii_lowercase(),
            parameters: BTreeMap::new(),
            token68: None,
        };
        rest = &rest[end..];

        loop {
            let candidate = skip_separators(rest);
            let name_end = token_end(candidate);
            let after_name = candidate[name_end..].trim_start();
            if name_end == 0 || !after_name.starts_with('=') {
                break;
            }

            let value_part = after_name[1..].trim_start();
            if challenge.parameters.is_empty()
                && challenge.token68.is_none()
                && (value_part.is_empty()
                    || value_part.starts_with('=')
                    || value_part.starts_with(','))
            {
                // token68 with `=` padding, e.g. `Negotiate abc==`.
                let end = candidate
                    .find(|c: char| c == ',' || c.is_whitespace())
                    .unwrap_or(candidate.len());
                challenge.token68 = Some(candidate[..end].to_string());
                rest = &candidate[end..];
                continue;
            }

            let name = candidate[..name_end].to_ascii_lowercase();
            let (value, remaining) = match value_part.strip_prefix('"') {
                Some(quoted) => parse_quoted(quoted),
                None => {
                    let end = token_end(value_part);
                    (value_part[..end].to_string(), &value_part[end..])
                },
            };
            challenge.parameters.insert(name, value);
            rest = remaining;
        }

        challenges.push(challenge);
    }

    challenges
}

fn skip_separators(s: &str) -> &str {
    s.trim_start_matches(|c: char| c == ',' || c.is_whitespace())
}

fn token_end(s: &str) -> usize {
    s.find(|c: char| c == '=' || c == ',' || c == '"' || c.is_whitespace())
        .unwrap_or(s.len())
}

fn parse_quoted(s: &str) -> (String, &str) {
    let mut value = String::new();
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => {
                value.push(c);
                escaped = false;
            },
            '\\' => escaped = true,
            '"' => return (value, &s[i + 1..]),
            _ => value.push(c),
        }
    }
    (value, "")
}
