//! Reader for the boot source syntax.
//!
//! Produces [`Form`]s that keep their delimiter kind and position, so the
//! evaluator can tell a literal `[a b]` from a call and report locations.
//!
//! ```text
//! # comment to end of line
//! (f a b)      call or special form
//! [a b]        tuple literal
//! {k v}        struct literal
//! @[a b]       array literal
//! @{k v}       table literal
//! "str"        string, escapes \n \t \r \0 \" \\
//! @"buf"       buffer
//! 'x           (quote x)
//! :kw  12  0xff  true false nil  sym
//! ```

use crate::scan::scan_number;
use crate::table::{Struct, Table};
use crate::value::Value;
use thiserror::Error;

/// Deepest nesting of delimiters and quotes the reader accepts. The same
/// bound applies when data is read back as code.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    /// nil, booleans, numbers, strings, symbols, keywords.
    Atom(Value),
    Buffer(Vec<u8>),
    List(Vec<Form>),
    Brackets(Vec<Form>),
    Struct(Vec<Form>),
    Array(Vec<Form>),
    Table(Vec<Form>),
    Quote(Box<Form>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub line: u32,
    pub column: u32,
}

impl Form {
    pub fn new(kind: FormKind, line: u32, column: u32) -> Self {
        Self { kind, line, column }
    }

    /// The form as plain data, the way `quote` sees it.
    pub fn to_value(&self) -> Value {
        let all = |items: &[Form]| items.iter().map(Form::to_value).collect::<Vec<_>>();
        let pairs = |items: &[Form]| {
            items
                .chunks(2)
                .map(|kv| (kv[0].to_value(), kv.get(1).map(Form::to_value).unwrap_or_default()))
                .collect::<Vec<_>>()
        };
        match &self.kind {
            FormKind::Atom(v) => v.clone(),
            FormKind::Buffer(b) => Value::buffer(b.clone()),
            FormKind::List(items) | FormKind::Brackets(items) => Value::tuple(all(items)),
            FormKind::Struct(items) => Value::structure(Struct::from_pairs(pairs(items))),
            FormKind::Array(items) => Value::array(all(items)),
            FormKind::Table(items) => Value::table(Table::from_pairs(pairs(items))),
            FormKind::Quote(inner) => {
                Value::tuple(vec![Value::symbol("quote"), inner.to_value()])
            }
        }
    }

    /// Reads data back as code. Tuples become calls; structs, arrays and
    /// tables become their literal forms. Positions are zero. Data nested
    /// deeper than [`MAX_NESTING`], which includes any cyclic structure, is
    /// rejected.
    pub fn from_value(value: &Value) -> Result<Form, ParseError> {
        Self::from_value_at(value, 0)
    }

    fn from_value_at(value: &Value, depth: usize) -> Result<Form, ParseError> {
        if depth > MAX_NESTING {
            return Err(ParseError {
                line: 0,
                column: 0,
                message: format!("data nested deeper than {} levels", MAX_NESTING),
            });
        }
        let one = |v: &Value| Self::from_value_at(v, depth + 1);
        let pairs = |entries: Vec<(&Value, &Value)>| -> Result<Vec<Form>, ParseError> {
            let mut out = Vec::with_capacity(entries.len() * 2);
            for (k, v) in entries {
                out.push(one(k)?);
                out.push(one(v)?);
            }
            Ok(out)
        };
        let kind = match value {
            Value::Tuple(items) => FormKind::List(items.iter().map(one).collect::<Result<_, _>>()?),
            Value::Array(items) => {
                FormKind::Array(items.borrow().iter().map(one).collect::<Result<_, _>>()?)
            }
            Value::Struct(s) => FormKind::Struct(pairs(s.iter().collect())?),
            Value::Table(t) => FormKind::Table(pairs(t.borrow().iter().collect())?),
            Value::Buffer(b) => FormKind::Buffer(b.borrow().clone()),
            other => FormKind::Atom(other.clone()),
        };
        Ok(Form::new(kind, 0, 0))
    }

    /// The symbol name when this form is a bare symbol.
    pub fn symbol_name(&self) -> Option<&[u8]> {
        match &self.kind {
            FormKind::Atom(Value::Symbol(s)) => Some(s),
            _ => None,
        }
    }
}

/// Reads every top-level form in `src`.
pub fn parse_all(src: &str) -> Result<Vec<Form>, ParseError> {
    let mut reader = Reader::new(src);
    let mut forms = Vec::new();
    while let Some(form) = reader.next_form()? {
        forms.push(form);
    }
    Ok(forms)
}

/// Reads the first form in `src`, or `None` for blank input.
pub fn parse(src: &str) -> Result<Option<Form>, ParseError> {
    Reader::new(src).next_form()
}

pub struct Reader<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    depth: usize,
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'"' | b'\'' | b'#')
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn skip_blank(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'#' {
                while !matches!(self.peek(), None | Some(b'\n')) {
                    self.bump();
                }
            } else if b.is_ascii_whitespace() || b == b',' {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Reads the next form, or `None` at end of input.
    pub fn next_form(&mut self) -> Result<Option<Form>, ParseError> {
        self.skip_blank();
        match self.peek() {
            None => Ok(None),
            Some(b')' | b']' | b'}') => Err(self.error("unexpected closing delimiter")),
            Some(_) => self.read_form().map(Some),
        }
    }

    fn read_form(&mut self) -> Result<Form, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("forms nested deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let form = self.read_form_inner();
        self.depth -= 1;
        form
    }

    fn read_form_inner(&mut self) -> Result<Form, ParseError> {
        self.skip_blank();
        let (line, column) = (self.line, self.column);
        let at = |kind| Form::new(kind, line, column);
        let b = self.peek().ok_or_else(|| self.error("unexpected end of input"))?;
        match b {
            b'(' => {
                self.bump();
                Ok(at(FormKind::List(self.read_seq(b')')?)))
            }
            b'[' => {
                self.bump();
                Ok(at(FormKind::Brackets(self.read_seq(b']')?)))
            }
            b'{' => {
                self.bump();
                Ok(at(FormKind::Struct(self.read_seq(b'}')?)))
            }
            b'\'' => {
                self.bump();
                let inner = self.read_form()?;
                Ok(at(FormKind::Quote(Box::new(inner))))
            }
            b'"' => Ok(at(FormKind::Atom(Value::string(self.read_string()?)))),
            b'@' => match self.src.get(self.pos + 1) {
                Some(b'[') => {
                    self.bump();
                    self.bump();
                    Ok(at(FormKind::Array(self.read_seq(b']')?)))
                }
                Some(b'{') => {
                    self.bump();
                    self.bump();
                    Ok(at(FormKind::Table(self.read_seq(b'}')?)))
                }
                Some(b'"') => {
                    self.bump();
                    Ok(at(FormKind::Buffer(self.read_string()?)))
                }
                _ => self.read_atom().map(|v| at(FormKind::Atom(v))),
            },
            b')' | b']' | b'}' => Err(self.error("unexpected closing delimiter")),
            _ => self.read_atom().map(|v| at(FormKind::Atom(v))),
        }
    }

    fn read_seq(&mut self, close: u8) -> Result<Vec<Form>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_blank();
            match self.peek() {
                None => return Err(self.error(format!("unterminated form, expected '{}'", close as char))),
                Some(b) if b == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(b')' | b']' | b'}') => return Err(self.error("mismatched delimiter")),
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_string(&mut self) -> Result<Vec<u8>, ParseError> {
        self.bump();
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => return Ok(out),
                Some(b'\\') => {
                    let escaped = match self.bump() {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(b'0') => 0,
                        Some(b'"') => b'"',
                        Some(b'\\') => b'\\',
                        Some(other) => {
                            return Err(self.error(format!("unknown escape '\\{}'", other as char)))
                        }
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                }
                Some(b) => out.push(b),
            }
        }
    }

    fn read_atom(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if !is_delimiter(b)) {
            self.bump();
        }
        let token = &self.src[start..self.pos];
        if token.is_empty() {
            return Err(self.error("expected a form"));
        }
        Ok(match token {
            b"nil" => Value::Nil,
            b"true" => Value::Boolean(true),
            b"false" => Value::Boolean(false),
            [b':', rest @ ..] => Value::keyword(rest),
            _ => match scan_number(token) {
                Some(n) => Value::Number(n),
                None => Value::symbol(token),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(src: &str) -> Form {
        parse(src).unwrap().unwrap()
    }

    #[test]
    fn test_atoms() {
        assert_eq!(one("nil").to_value(), Value::Nil);
        assert_eq!(one("0x10").to_value(), Value::Number(16.0));
        assert_eq!(one(":doc").to_value(), Value::keyword("doc"));
        assert_eq!(one("array/push").to_value(), Value::symbol("array/push"));
        assert_eq!(one("-").to_value(), Value::symbol("-"));
        assert_eq!(one("\"a\\nb\"").to_value(), Value::string("a\nb"));
    }

    #[test]
    fn test_delimiters_keep_their_kind() {
        assert!(matches!(one("(f 1)").kind, FormKind::List(ref v) if v.len() == 2));
        assert!(matches!(one("[1 2 3]").kind, FormKind::Brackets(ref v) if v.len() == 3));
        assert!(matches!(one("@[1]").kind, FormKind::Array(_)));
        assert!(matches!(one("@{:a 1}").kind, FormKind::Table(_)));
        assert!(matches!(one("@\"raw\"").kind, FormKind::Buffer(ref b) if b == b"raw"));
    }

    #[test]
    fn test_quote_and_data() {
        let v = one("'{:name \"x\" :bytecode [(ret 0)]}").to_value();
        let Value::Tuple(items) = v else { panic!("quote reads as a tuple") };
        assert_eq!(items[0], Value::symbol("quote"));
        let Value::Struct(s) = &items[1] else { panic!("expected struct") };
        assert_eq!(s.get(&Value::keyword("name")), Value::string("x"));
        let code = s.get(&Value::keyword("bytecode"));
        assert_eq!(
            code,
            Value::tuple(vec![Value::tuple(vec![Value::symbol("ret"), 0.into()])])
        );
    }

    #[test]
    fn test_comments_and_positions() {
        let forms = parse_all("# header\n(a)\n  (b) # tail\n").unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!((forms[0].line, forms[0].column), (2, 1));
        assert_eq!((forms[1].line, forms[1].column), (3, 3));
    }

    #[test]
    fn test_errors_carry_position() {
        let err = parse_all("(a\n  (b)").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated"));
        assert!(parse_all("(a]").is_err());
        assert!(parse_all(")").is_err());
        assert!(parse_all("\"open").is_err());
    }

    #[test]
    fn test_from_value_reads_data_as_code() {
        let data = Value::tuple(vec![Value::symbol("f"), 1.into()]);
        let form = Form::from_value(&data).unwrap();
        assert!(matches!(form.kind, FormKind::List(ref v) if v.len() == 2));
        assert_eq!(form.to_value(), data);
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let src = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
        let err = parse(&src).unwrap_err();
        assert!(err.message.contains("nested deeper"));
        assert_eq!((err.line, err.column), (1, MAX_NESTING as u32 + 1));

        let quotes = format!("{}x", "'".repeat(200_000));
        assert!(parse(&quotes).is_err());

        let ok = format!("{}{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(parse(&ok).unwrap().is_some());
    }

    #[test]
    fn test_cyclic_data_is_not_code() {
        let arr = Value::array(vec![]);
        if let Value::Array(cell) = &arr {
            cell.borrow_mut().push(arr.clone());
        }
        let err = Form::from_value(&arr).unwrap_err();
        assert!(err.message.contains("nested deeper"));
        if let Value::Array(cell) = &arr {
            cell.borrow_mut().clear();
        }
    }
}
