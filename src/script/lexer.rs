//! Tokenizer for the challenge language
//!
//! Line-oriented like Python: leading whitespace becomes `Indent`/`Dedent`
//! tokens, newlines inside brackets are ignored, blank and comment-only lines
//! produce nothing.

use crate::error::{ScriptError, ScriptResult};

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Keywords
    Def,
    Return,
    Pass,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    True,
    False,
    None,
    Break,
    Continue,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token with the 1-based source line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

/// Width a tab advances indentation to (next multiple of this)
const TAB_WIDTH: usize = 4;

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    /// Open (, [ count; newlines are insignificant while > 0
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

/// Tokenize a whole source text
pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        at_line_start: true,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn run(&mut self) -> ScriptResult<()> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.depth == 0 {
                self.at_line_start = false;
                if !self.indentation()? {
                    continue;
                }
            }

            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\r' => self.pos += 1,
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '#' => self.skip_comment(),
                '\n' => {
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        self.at_line_start = true;
                    }
                    self.pos += 1;
                    self.line += 1;
                }
                '0'..='9' => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                '"' | '\'' => self.string(c)?,
                _ => self.operator(c)?,
            }
        }

        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.tok, Tok::Newline))
        {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(())
    }

    /// Measure leading whitespace and emit layout tokens.
    /// Returns false if the line was blank (already consumed).
    fn indentation(&mut self) -> ScriptResult<bool> {
        let mut col = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => col += 1,
                '\t' => col = (col / TAB_WIDTH + 1) * TAB_WIDTH,
                '\r' => {}
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                self.at_line_start = true;
                return Ok(false);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.pos += 1;
                    self.line += 1;
                }
                self.at_line_start = true;
                return Ok(false);
            }
            Some(_) => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if col > current {
            self.indents.push(col);
            self.push(Tok::Indent);
        } else if col < current {
            while self.indents.last().is_some_and(|&level| level > col) {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if self.indents.last().copied() != Some(col) {
                return Err(ScriptError::syntax(
                    self.line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn number(&mut self) -> ScriptResult<()> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.pos += 1;
            } else if c == '.' && !is_float && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
            {
                is_float = true;
                self.pos += 1;
            } else if c == '.' && !is_float {
                // `3.` is a float too
                is_float = true;
                self.pos += 1;
                break;
            } else {
                break;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        let tok = if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| ScriptError::syntax(self.line, format!("invalid number '{text}'")))?
        } else {
            text.parse::<i64>().map(Tok::Int).map_err(|_| {
                ScriptError::syntax(self.line, format!("integer literal '{text}' is too large"))
            })?
        };
        self.push(tok);
        Ok(())
    }

    fn word(&mut self) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let tok = match word.as_str() {
            "def" => Tok::Def,
            "return" => Tok::Return,
            "pass" => Tok::Pass,
            "if" => Tok::If,
            "elif" => Tok::Elif,
            "else" => Tok::Else,
            "while" => Tok::While,
            "for" => Tok::For,
            "in" => Tok::In,
            "not" => Tok::Not,
            "and" => Tok::And,
            "or" => Tok::Or,
            "True" => Tok::True,
            "False" => Tok::False,
            "None" => Tok::None,
            "break" => Tok::Break,
            "continue" => Tok::Continue,
            _ => Tok::Name(word),
        };
        self.push(tok);
    }

    fn string(&mut self, quote: char) -> ScriptResult<()> {
        let start_line = self.line;
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ScriptError::syntax(start_line, "unterminated string literal"));
            };
            if triple {
                if c == quote && self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            } else if c == quote {
                self.pos += 1;
                break;
            } else if c == '\n' {
                return Err(ScriptError::syntax(start_line, "unterminated string literal"));
            }

            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| {
                        ScriptError::syntax(start_line, "unterminated string literal")
                    })?;
                    self.pos += 1;
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        '\\' => text.push('\\'),
                        '\'' => text.push('\''),
                        '"' => text.push('"'),
                        '\n' => self.line += 1,
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                '\n' => {
                    self.line += 1;
                    text.push('\n');
                }
                _ => text.push(c),
            }
        }

        self.tokens.push(Token {
            tok: Tok::Str(text),
            line: start_line,
        });
        Ok(())
    }

    fn operator(&mut self, c: char) -> ScriptResult<()> {
        let next = self.peek_at(1);
        let next2 = self.peek_at(2);
        let (tok, len) = match (c, next, next2) {
            ('/', Some('/'), Some('=')) => (Tok::DoubleSlashAssign, 3),
            ('/', Some('/'), _) => (Tok::DoubleSlash, 2),
            ('/', Some('='), _) => (Tok::SlashAssign, 2),
            ('/', _, _) => (Tok::Slash, 1),
            ('*', Some('*'), _) => (Tok::DoubleStar, 2),
            ('*', Some('='), _) => (Tok::StarAssign, 2),
            ('*', _, _) => (Tok::Star, 1),
            ('+', Some('='), _) => (Tok::PlusAssign, 2),
            ('+', _, _) => (Tok::Plus, 1),
            ('-', Some('='), _) => (Tok::MinusAssign, 2),
            ('-', _, _) => (Tok::Minus, 1),
            ('%', Some('='), _) => (Tok::PercentAssign, 2),
            ('%', _, _) => (Tok::Percent, 1),
            ('=', Some('='), _) => (Tok::EqEq, 2),
            ('=', _, _) => (Tok::Assign, 1),
            ('!', Some('='), _) => (Tok::NotEq, 2),
            ('<', Some('='), _) => (Tok::Le, 2),
            ('<', _, _) => (Tok::Lt, 1),
            ('>', Some('='), _) => (Tok::Ge, 2),
            ('>', _, _) => (Tok::Gt, 1),
            ('(', _, _) => (Tok::LParen, 1),
            (')', _, _) => (Tok::RParen, 1),
            ('[', _, _) => (Tok::LBracket, 1),
            (']', _, _) => (Tok::RBracket, 1),
            (',', _, _) => (Tok::Comma, 1),
            (':', _, _) => (Tok::Colon, 1),
            (';', _, _) => (Tok::Semicolon, 1),
            ('.', _, _) => (Tok::Dot, 1),
            _ => {
                return Err(ScriptError::syntax(
                    self.line,
                    format!("unexpected character '{c}'"),
                ));
            }
        };

        match tok {
            Tok::LParen | Tok::LBracket => self.depth += 1,
            Tok::RParen | Tok::RBracket => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.pos += len;
        self.push(tok);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_indent_dedent() {
        let toks = kinds("def f(n):\n    return n\nx = 1\n");
        assert_eq!(
            toks,
            vec![
                Tok::Def,
                Tok::Name("f".into()),
                Tok::LParen,
                Tok::Name("n".into()),
                Tok::RParen,
                Tok::Colon,
                Tok::Newline,
                Tok::Indent,
                Tok::Return,
                Tok::Name("n".into()),
                Tok::Newline,
                Tok::Dedent,
                Tok::Name("x".into()),
                Tok::Assign,
                Tok::Int(1),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let toks = kinds("x = 1\n\n   # note\n  \ny = 2");
        assert_eq!(toks.iter().filter(|t| **t == Tok::Indent).count(), 0);
        assert_eq!(toks.iter().filter(|t| **t == Tok::Newline).count(), 2);
    }

    #[test]
    fn test_triple_quoted_docstring_spans_lines() {
        let tokens = tokenize("def f():\n  \"\"\"doc\n  more\"\"\"\n  return 1\n").unwrap();
        let doc = tokens
            .iter()
            .find(|t| matches!(t.tok, Tok::Str(_)))
            .unwrap();
        assert_eq!(doc.tok, Tok::Str("doc\n  more".into()));
        assert_eq!(doc.line, 2);
        let ret = tokens.iter().find(|t| t.tok == Tok::Return).unwrap();
        assert_eq!(ret.line, 4);
    }

    #[test]
    fn test_operators() {
        let toks = kinds("a //= b ** 2 != c");
        assert_eq!(
            toks[..6],
            [
                Tok::Name("a".into()),
                Tok::DoubleSlashAssign,
                Tok::Name("b".into()),
                Tok::DoubleStar,
                Tok::Int(2),
                Tok::NotEq,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets() {
        let toks = kinds("x = [1,\n  2]\n");
        assert_eq!(toks.iter().filter(|t| **t == Tok::Newline).count(), 1);
        assert!(!toks.contains(&Tok::Indent));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5")[0], Tok::Float(1.5));
        assert_eq!(kinds("1_000")[0], Tok::Int(1000));
        assert_eq!(kinds("2e3")[0], Tok::Float(2000.0));
    }

    #[test]
    fn test_bad_dedent() {
        let err = tokenize("if x:\n    y = 1\n  z = 2\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("x = 'abc\n").is_err());
    }
}
