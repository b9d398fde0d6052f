use super::error::{ModuleError, Result};
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

/// Parse a whitespace separated list of `key=value` pairs.
///
/// Values may be wrapped in single or double quotes to hold spaces and `=`.
/// Every quote character is dropped from the parsed value, including quotes
/// of the other kind nested inside a quoted run. A later duplicate key wins.
pub fn parse_params(args: &str) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    let mut chars = args.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let key = read_key(&mut chars).ok_or_else(|| invalid(args))?;
        let value = read_value(&mut chars).ok_or_else(|| invalid(args))?;
        params.insert(key, value);
    }

    Ok(params)
}

/// Render params back into the `key="value"` form accepted by [`parse_params`].
pub fn format_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

fn read_key(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut key = String::new();
    loop {
        match chars.next()? {
            '=' => break,
            c if c.is_whitespace() || is_quote(c) => return None,
            c => key.push(c),
        }
    }
    (!key.is_empty()).then_some(key)
}

fn read_value(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut value = String::new();
    let mut open: Option<char> = None;

    loop {
        let Some(&c) = chars.peek() else {
            // unterminated quote
            return open.is_none().then_some(value);
        };
        match open {
            None if c.is_whitespace() => break,
            None if is_quote(c) => open = Some(c),
            Some(q) if c == q => open = None,
            _ if is_quote(c) => {}
            _ => value.push(c),
        }
        chars.next();
    }

    Some(value)
}

fn invalid(args: &str) -> ModuleError {
    ModuleError::InvalidArgs {
        args: args.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple_args() {
        let params = parse_params(r#"cmd="ls -al" foo=bar baz=☃"#).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params["cmd"], "ls -al");
        assert_eq!(params["foo"], "bar");
        assert_eq!(params["baz"], "☃");
    }

    #[test]
    fn test_parse_mixed_quotes() {
        let args = r#"cmd='ls -al' url="http://foo.com/abc" baz='abc-def' test="sed -i 's,store.enable=true,store.enable=false,g'""#;
        let params = parse_params(args).unwrap();
        assert_eq!(params["cmd"], "ls -al");
        assert_eq!(params["url"], "http://foo.com/abc");
        assert_eq!(params["baz"], "abc-def");
        assert_eq!(
            params["test"],
            "sed -i s,store.enable=true,store.enable=false,g"
        );
    }

    #[test]
    fn test_parse_empty_and_blank() {
        assert!(parse_params("").unwrap().is_empty());
        assert!(parse_params("   \t ").unwrap().is_empty());
        assert_eq!(parse_params("key=").unwrap()["key"], "");
    }

    #[test]
    fn test_invalid_args() {
        for args in ["foo", "foo bar=baz", "=bar", "a=\"unterminated", "a\"b=c"] {
            let err = parse_params(args).unwrap_err();
            assert!(
                err.to_string().starts_with("Module args are invalid"),
                "{args}: {err}"
            );
        }
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let params = parse_params("a=1 a=2").unwrap();
        assert_eq!(params["a"], "2");
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_is_identity(
            params in proptest::collection::btree_map(
                "[a-z_][a-z0-9_]{0,8}",
                "[a-zA-Z0-9 =,./-]{0,12}",
                0..6,
            )
        ) {
            let reparsed = parse_params(&format_params(&params)).unwrap();
            prop_assert_eq!(reparsed, params);
        }
    }
}
