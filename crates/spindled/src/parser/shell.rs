//! Shell-style command line tokenizer.

use crate::request::{Request, ShellRequest};

use super::RequestParser;

/// Splits input into a command and arguments using shell quoting rules.
///
/// Unquoted whitespace separates fields and repeated separators collapse.
/// Single and double quotes group text containing whitespace or the other
/// quote character. A backslash copies the following character verbatim,
/// inside quotes as well. Input that ends inside a quoted region is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRequestParser;

impl RequestParser for ShellRequestParser {
    fn parse_request(&self, data: &[u8]) -> Option<Request> {
        tokenize(&String::from_utf8_lossy(data)).map(Request::Shell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Command,
    Arguments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Double,
    Single,
}

impl Quote {
    const fn closes_on(self, ch: char) -> bool {
        matches!((self, ch), (Self::Double, '"') | (Self::Single, '\''))
    }
}

struct Tokenizer {
    field: Field,
    quote: Quote,
    command: String,
    current: String,
    arguments: Vec<String>,
}

impl Tokenizer {
    const fn new() -> Self {
        Self {
            field: Field::Command,
            quote: Quote::None,
            command: String::new(),
            current: String::new(),
            arguments: Vec::new(),
        }
    }

    fn append(&mut self, ch: char) {
        match self.field {
            Field::Command => self.command.push(ch),
            Field::Arguments => self.current.push(ch),
        }
    }

    fn terminate_field(&mut self) {
        match self.field {
            Field::Command => self.field = Field::Arguments,
            Field::Arguments if !self.current.is_empty() => {
                self.arguments.push(std::mem::take(&mut self.current));
            }
            Field::Arguments => {}
        }
    }

    fn separator(&mut self) {
        // Whitespace before the first command character is skipped.
        if self.field == Field::Command && self.command.is_empty() {
            return;
        }
        self.terminate_field();
    }

    fn finish(mut self) -> Option<ShellRequest> {
        self.terminate_field();
        if self.quote != Quote::None {
            return None;
        }
        ShellRequest::new(self.command, self.arguments)
    }
}

fn tokenize(input: &str) -> Option<ShellRequest> {
    let mut tokenizer = Tokenizer::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            // A trailing backslash has nothing to escape and is dropped.
            if let Some(escaped) = chars.next() {
                tokenizer.append(escaped);
            }
            continue;
        }

        if tokenizer.quote != Quote::None {
            if tokenizer.quote.closes_on(ch) {
                tokenizer.quote = Quote::None;
                tokenizer.terminate_field();
            } else {
                tokenizer.append(ch);
            }
            continue;
        }

        match ch {
            '"' => tokenizer.quote = Quote::Double,
            '\'' => tokenizer.quote = Quote::Single,
            ch if ch.is_whitespace() => tokenizer.separator(),
            ch => tokenizer.append(ch),
        }
    }

    tokenizer.finish()
}
