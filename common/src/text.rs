use nom::{combinator::fail, IResult as _IResult};

pub type IResult<'a, T> = _IResult<&'a str, T>;

/// Consumes up to the bracket that balances the one already opened by the
/// caller, skipping backslash escapes and brackets inside quoted strings.
///
/// Used to find the end of an entity block (`{ ... }`) in the entities lump
/// even when a value contains a stray brace.
// https://github.com/getreu/parse-hyperlinks/blob/5af034d14aa72ffb9e705da13bf557a564b1bebf/parse-hyperlinks/src/lib.rs#L41
pub fn take_until_unbalanced(
    opening_bracket: char,
    closing_bracket: char,
) -> impl Fn(&str) -> IResult<&str> {
    move |i: &str| {
        let mut index = 0;
        let mut bracket_counter = 0;
        let mut ignore_bracket = false;
        while let Some(n) = &i[index..].find(&[opening_bracket, closing_bracket, '\\', '"'][..]) {
            index += n;
            let mut it = i[index..].chars();
            match it.next() {
                Some('\\') => {
                    index += '\\'.len_utf8();
                    if let Some(c) = it.next() {
                        index += c.len_utf8();
                    }
                }
                Some('"') => {
                    ignore_bracket = !ignore_bracket;
                    index += '"'.len_utf8();
                }
                Some(c) if c == opening_bracket => {
                    if !ignore_bracket {
                        bracket_counter += 1;
                    }
                    index += opening_bracket.len_utf8();
                }
                Some(c) if c == closing_bracket => {
                    if !ignore_bracket {
                        bracket_counter -= 1;
                    }
                    index += closing_bracket.len_utf8();
                }
                _ => unreachable!(),
            };
            if bracket_counter == -1 {
                index -= closing_bracket.len_utf8();
                return Ok((&i[index..], &i[0..index]));
            };
        }

        if bracket_counter == 0 {
            Ok(("", i))
        } else {
            Ok(fail(i)?)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn balanced() {
        let (rest, inner) = take_until_unbalanced('{', '}')("abc}def").unwrap();
        assert_eq!(inner, "abc");
        assert_eq!(rest, "}def");
    }

    #[test]
    fn nested_braces_in_quotes_are_ignored() {
        let (rest, inner) = take_until_unbalanced('{', '}')("\"a{b\"}tail").unwrap();
        assert_eq!(inner, "\"a{b\"");
        assert_eq!(rest, "}tail");
    }
}
