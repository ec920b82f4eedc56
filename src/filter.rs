//! Syntax check for LDAP-style service filters (RFC 1960)
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = "&" filter+ | "|" filter+ | "!" filter | item
//! item       = attr ("=" | "~=" | ">=" | "<=") value | attr "=*"
//! ```

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid filter at offset {offset}: {message}")]
pub struct FilterError {
    pub offset: usize,
    pub message: &'static str,
}

struct Checker<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Checker<'a> {
    fn fail<T>(&self, message: &'static str) -> Result<T, FilterError> {
        Err(FilterError {
            offset: self.pos,
            message,
        })
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn filter(&mut self) -> Result<(), FilterError> {
        self.skip_ws();
        if self.peek() != Some(b'(') {
            return self.fail("missing '('");
        }
        self.pos += 1;
        self.skip_ws();
        match self.peek() {
            Some(b'&') | Some(b'|') => {
                self.pos += 1;
                self.filter_list()?;
            }
            Some(b'!') => {
                self.pos += 1;
                self.filter()?;
            }
            Some(_) => self.item()?,
            None => return self.fail("unexpected end of filter"),
        }
        self.skip_ws();
        if self.peek() != Some(b')') {
            return self.fail("missing ')'");
        }
        self.pos += 1;
        Ok(())
    }

    fn filter_list(&mut self) -> Result<(), FilterError> {
        let mut count = 0;
        loop {
            self.skip_ws();
            if self.peek() != Some(b'(') {
                break;
            }
            self.filter()?;
            count += 1;
        }
        if count == 0 {
            return self.fail("empty filter list");
        }
        Ok(())
    }

    fn item(&mut self) -> Result<(), FilterError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'=' | b'~' | b'<' | b'>' | b'(' | b')') {
                break;
            }
            self.pos += 1;
        }
        let attr = &self.bytes[start..self.pos];
        if attr.iter().all(|b| b.is_ascii_whitespace()) {
            return self.fail("missing attribute name");
        }

        match self.peek() {
            Some(b'=') => self.pos += 1,
            Some(b'~') | Some(b'<') | Some(b'>') => {
                self.pos += 1;
                if self.peek() != Some(b'=') {
                    return self.fail("invalid operator");
                }
                self.pos += 1;
            }
            _ => return self.fail("missing operator"),
        }

        self.value()
    }

    fn value(&mut self) -> Result<(), FilterError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b')' => break,
                b'(' => return self.fail("unescaped '(' in value"),
                b'\\' => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return self.fail("dangling escape");
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        if self.pos == start {
            return self.fail("missing value");
        }
        Ok(())
    }
}

/// Checks `filter` for syntactic validity
pub fn validate(filter: &str) -> Result<(), FilterError> {
    let mut checker = Checker {
        bytes: filter.as_bytes(),
        pos: 0,
    };
    checker.filter()?;
    checker.skip_ws();
    if checker.pos != checker.bytes.len() {
        return checker.fail("trailing characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        simple = { "(objectClass=com.acme.Foo)" },
        presence = { "(service.pid=*)" },
        substring = { "(name=ab*cd*)" },
        approx = { "(name~=foo)" },
        ordered = { "(service.ranking>=10)" },
        and = { "(&(a=1)(b<=2))" },
        nested = { "(|(a=1)(!(b=2)))" },
        escaped = { "(name=a\\(b\\))" },
        spaced = { " ( & (a=1) (b=2) ) " },
    )]
    fn test_valid(filter: &str) {
        assert_eq!(validate(filter), Ok(()));
    }

    #[parameterized(
        empty = { "" },
        no_parens = { "a=1" },
        unclosed = { "(a=1" },
        empty_and = { "(&)" },
        no_attr = { "(=1)" },
        no_value = { "(a=)" },
        bad_op = { "(a<1)" },
        trailing = { "(a=1))" },
        raw_paren = { "(a=(1)" },
    )]
    fn test_invalid(filter: &str) {
        assert!(validate(filter).is_err());
    }
}
