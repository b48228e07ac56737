//! DCT search filter expressions.
//!
//! Grammar: `<field> <OP> <value>` clauses joined by `AND` / `OR`, e.g.
//! `name CONTAINS 'prod' AND status EQ 'RUNNING'`. `IN` and `NOT_IN` take a
//! bracketed list: `status IN ['RUNNING', 'STOPPED']`. Clauses may be grouped
//! with parentheses: `(a EQ 1 OR b EQ 2) AND c EQ 3`.

pub const OPERATORS: [&str; 9] = ["EQ", "NE", "GT", "GE", "LT", "LE", "CONTAINS", "IN", "NOT_IN"];

const CONJUNCTIONS: [&str; 2] = ["AND", "OR"];

/// Checks the expression shape. Returns a human-readable problem on failure.
pub fn validate(expr: &str) -> Result<(), String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("filter expression is empty".to_string());
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    parser.expression()?;
    match parser.peek() {
        None => Ok(()),
        Some(")") => Err("unmatched ')'".to_string()),
        Some(other) => Err(format!("expected AND or OR, found '{}'", other)),
    }
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn advance(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).map(String::as_str);
        self.pos += 1;
        token
    }

    /// term (AND|OR term)*; stops before a closing `)`.
    fn expression(&mut self) -> Result<(), String> {
        loop {
            self.term()?;
            match self.peek() {
                None | Some(")") => return Ok(()),
                Some(conj) if CONJUNCTIONS.contains(&conj.to_ascii_uppercase().as_str()) => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return Err(format!("expression ends with dangling '{}'", conj));
                    }
                }
                Some(other) => return Err(format!("expected AND or OR, found '{}'", other)),
            }
        }
    }

    fn term(&mut self) -> Result<(), String> {
        match self.peek() {
            Some("(") => {
                self.pos += 1;
                self.expression()?;
                match self.advance() {
                    Some(")") => Ok(()),
                    _ => Err("unclosed '('".to_string()),
                }
            }
            Some(")") => Err("expected a clause before ')'".to_string()),
            _ => self.clause(),
        }
    }

    fn clause(&mut self) -> Result<(), String> {
        let field = self.advance().ok_or_else(|| "missing clause".to_string())?;
        if !is_field(field) {
            return Err(format!("'{}' is not a valid field name", field));
        }

        let op = self
            .advance()
            .ok_or_else(|| format!("missing operator after '{}'", field))?;
        let op_upper = op.to_ascii_uppercase();
        if !OPERATORS.contains(&op_upper.as_str()) {
            return Err(format!(
                "unknown operator '{}'; expected one of {}",
                op,
                OPERATORS.join(", ")
            ));
        }

        let value = self
            .advance()
            .ok_or_else(|| format!("missing value after '{} {}'", field, op))?;
        if value == ")" {
            return Err(format!("missing value after '{} {}'", field, op));
        }
        let wants_list = op_upper == "IN" || op_upper == "NOT_IN";
        if wants_list != value.starts_with('[') {
            return Err(if wants_list {
                format!("{} expects a list like ['a', 'b'], found {}", op_upper, value)
            } else {
                format!("{} does not accept a list value", op_upper)
            });
        }
        Ok(())
    }
}

fn is_field(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn tokenize(expr: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '(' || c == ')' {
            chars.next();
            token.push(c);
        } else if c == '\'' || c == '"' {
            chars.next();
            token.push(c);
            let mut closed = false;
            for ch in chars.by_ref() {
                token.push(ch);
                if ch == c {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(format!("unterminated quote in {}", token));
            }
        } else if c == '[' {
            let mut quote: Option<char> = None;
            let mut closed = false;
            for ch in chars.by_ref() {
                token.push(ch);
                match quote {
                    Some(q) if ch == q => quote = None,
                    Some(_) => {}
                    None if ch == '\'' || ch == '"' => quote = Some(ch),
                    None if ch == ']' => {
                        closed = true;
                        break;
                    }
                    None => {}
                }
            }
            if !closed {
                return Err(format!("unterminated list in {}", token));
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '(' || ch == ')' {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_single_clause() {
        assert!(validate("name CONTAINS 'prod'").is_ok());
    }

    #[test]
    fn test_compound_expression() {
        assert!(validate("name CONTAINS 'prod db' AND status EQ 'RUNNING' OR size GT 100").is_ok());
    }

    #[test]
    fn test_list_operators() {
        assert!(validate("status IN ['RUNNING', 'STOPPED']").is_ok());
        assert!(validate("engine_id NOT_IN ['e 1']").is_ok());
        assert!(validate("status IN 'RUNNING'").is_err());
        assert!(validate("status EQ ['RUNNING']").is_err());
    }

    #[test]
    fn test_unknown_operator_named() {
        let err = validate("name LIKE 'prod'").unwrap_err();
        assert!(err.contains("LIKE"));
    }

    #[test]
    fn test_lowercase_operator_accepted() {
        assert!(validate("name eq 'x' and id ne 'y'").is_ok());
    }

    #[test]
    fn test_incomplete_expressions() {
        assert!(validate("").is_err());
        assert!(validate("name").is_err());
        assert!(validate("name EQ").is_err());
        assert!(validate("name EQ 'x' AND").is_err());
        assert!(validate("name EQ 'x' status EQ 'y'").is_err());
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(validate("name EQ 'prod").is_err());
        assert!(validate("status IN ['a', 'b'").is_err());
    }

    #[test]
    fn test_parenthesized_groups() {
        assert!(validate("(name EQ 'a' OR name EQ 'b') AND status EQ 'RUNNING'").is_ok());
        assert!(validate("status EQ 'RUNNING' AND (size GT 1 OR (size LT 0))").is_ok());
        assert!(validate("(status IN ['a', 'b'])").is_ok());
    }

    #[test]
    fn test_unbalanced_groups() {
        assert_eq!(
            validate("(name EQ 'a' OR name EQ 'b'").unwrap_err(),
            "unclosed '('"
        );
        assert_eq!(validate("name EQ 'a')").unwrap_err(), "unmatched ')'");
        assert!(validate("()").is_err());
        assert!(validate("(name EQ)").is_err());
        assert!(validate("(name EQ 'a' AND)").is_err());
    }

    #[test]
    fn test_parenthesis_inside_quotes_is_literal() {
        assert!(validate("name EQ 'db (old)'").is_ok());
    }

    #[test]
    fn test_invalid_field() {
        assert!(validate("1name EQ 'x'").is_err());
        assert!(validate("tags.key EQ 'team'").is_ok());
    }
}
