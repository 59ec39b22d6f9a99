/// A hand-written swen lexer
///
/// This turns the bytes of a `.swen` document into tagged tokens
/// carrying their source spans. It is the first step of parsing,
/// where we turn flat text into something the recursive descent
/// parser can walk with a peek/advance cursor.
///
/// Austin Shafer - 2025
use crate::ParseError;

use niebla as nb;
use std::fmt;

/// A position in the source text
///
/// Lines and columns are 1-based for error reporting, the offset is
/// the 0-based byte position of the token start.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// What kind of token a literal is
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum TokenTag {
    // keywords
    Root,
    Desktop,
    System,
    Rect,
    Text,
    Transform,
    Clip,
    WaylandSurface,
    // property names
    Workspaces,
    App,
    Nodes,
    Id,
    Size,
    TextSize,
    Position,
    Background,
    Body,
    Color,
    Matrix,
    SurfaceRect,
    // literal kinds
    Identifier,
    StringLiteral,
    Int,
    Float,
    Boolean,
    Nothing,
    // punctuation
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,
    Dot,
    // end of input
    Eof,
}

/// One lexed token
///
/// The literal borrows the source text. String literals have their
/// quotes stripped.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Token<'a> {
    pub literal: &'a str,
    pub tag: TokenTag,
    pub span: Span,
}

/// Resolve an identifier run into its keyword tag
///
/// Dispatches on the first character so most identifiers only do a
/// handful of comparisons before falling through.
fn resolve_keyword(literal: &str) -> TokenTag {
    match literal.as_bytes()[0] {
        b'a' => match literal {
            "app" => TokenTag::App,
            _ => TokenTag::Identifier,
        },
        b'b' => match literal {
            "background" => TokenTag::Background,
            "body" => TokenTag::Body,
            _ => TokenTag::Identifier,
        },
        b'c' => match literal {
            "clip" => TokenTag::Clip,
            "color" => TokenTag::Color,
            _ => TokenTag::Identifier,
        },
        b'd' => match literal {
            "desktop" => TokenTag::Desktop,
            _ => TokenTag::Identifier,
        },
        b'f' => match literal {
            "false" => TokenTag::Boolean,
            _ => TokenTag::Identifier,
        },
        b'i' => match literal {
            "id" => TokenTag::Id,
            _ => TokenTag::Identifier,
        },
        b'm' => match literal {
            "matrix" => TokenTag::Matrix,
            _ => TokenTag::Identifier,
        },
        b'n' => match literal {
            "nodes" => TokenTag::Nodes,
            "nothing" => TokenTag::Nothing,
            _ => TokenTag::Identifier,
        },
        b'p' => match literal {
            "position" => TokenTag::Position,
            _ => TokenTag::Identifier,
        },
        b'r' => match literal {
            "root" => TokenTag::Root,
            "rect" => TokenTag::Rect,
            _ => TokenTag::Identifier,
        },
        b's' => match literal {
            "system" => TokenTag::System,
            "size" => TokenTag::Size,
            "surface_rect" => TokenTag::SurfaceRect,
            _ => TokenTag::Identifier,
        },
        b't' => match literal {
            "text" => TokenTag::Text,
            "transform" => TokenTag::Transform,
            "text_size" => TokenTag::TextSize,
            "true" => TokenTag::Boolean,
            _ => TokenTag::Identifier,
        },
        b'w' => match literal {
            "workspaces" => TokenTag::Workspaces,
            "wayland_surface" => TokenTag::WaylandSurface,
            _ => TokenTag::Identifier,
        },
        _ => TokenTag::Identifier,
    }
}

/// Is this byte a token boundary
///
/// Whitespace, punctuation and quotes end the current literal run.
/// Note that `-` is not a boundary, it may appear inside identifiers.
fn is_break(byte: u8) -> bool {
    match byte {
        b' ' | b'\t' | b'\r' | b'\n' => true,
        b'{' | b'}' | b'[' | b']' | b'(' | b')' | b',' | b':' | b';' | b'.' | b'"' => true,
        _ => false,
    }
}

fn punctuation_tag(byte: u8) -> Option<TokenTag> {
    match byte {
        b'{' => Some(TokenTag::LBrace),
        b'}' => Some(TokenTag::RBrace),
        b'[' => Some(TokenTag::LBracket),
        b']' => Some(TokenTag::RBracket),
        b'(' => Some(TokenTag::LParen),
        b')' => Some(TokenTag::RParen),
        b',' => Some(TokenTag::Comma),
        b':' => Some(TokenTag::Colon),
        b';' => Some(TokenTag::Semicolon),
        b'.' => Some(TokenTag::Dot),
        _ => None,
    }
}

pub struct Lexer<'a> {
    l_src: &'a str,
    l_pos: usize,
    l_line: u32,
    l_column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            l_src: src,
            l_pos: 0,
            l_line: 1,
            l_column: 1,
        }
    }

    /// Lex the whole source into the caller's token arena
    ///
    /// The arena always ends with an `Eof` token on success. Any
    /// failure aborts lexing and carries the span it happened at.
    pub fn lex_into(src: &'a str, tokens: &mut nb::Arena<Token<'a>>) -> Result<(), ParseError> {
        let mut lexer = Lexer::new(src);

        loop {
            let token = lexer.next_token()?;
            let done = token.tag == TokenTag::Eof;
            tokens.push(token)?;
            if done {
                return Ok(());
            }
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.l_src.as_bytes().get(self.l_pos).copied()
    }

    fn advance_byte(&mut self) {
        if let Some(byte) = self.peek_byte() {
            self.l_pos += 1;
            if byte == b'\n' {
                self.l_line += 1;
                self.l_column = 1;
            } else {
                self.l_column += 1;
            }
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.l_line,
            column: self.l_column,
            offset: self.l_pos,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek_byte() {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.advance_byte(),
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        self.skip_whitespace();

        let span = self.span();
        let byte = match self.peek_byte() {
            Some(b) => b,
            None => {
                return Ok(Token {
                    literal: "",
                    tag: TokenTag::Eof,
                    span: span,
                })
            }
        };

        if let Some(tag) = punctuation_tag(byte) {
            self.advance_byte();
            return Ok(Token {
                literal: &self.l_src[span.offset..self.l_pos],
                tag: tag,
                span: span,
            });
        }

        match byte {
            b'"' => self.scan_string(span),
            b'-' | b'0'..=b'9' => self.scan_number(span),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(span),
            _ => {
                // Any other byte starts an identifier-like run that the
                // parser will log and skip during recovery
                self.scan_identifier(span)
            }
        }
    }

    fn scan_string(&mut self, span: Span) -> Result<Token<'a>, ParseError> {
        // Consume the opening quote
        self.advance_byte();
        let body_start = self.l_pos;

        loop {
            match self.peek_byte() {
                // A string may not contain a raw newline
                None | Some(b'\n') => return Err(ParseError::InvalidString { span: span }),
                Some(b'"') => {
                    let literal = &self.l_src[body_start..self.l_pos];
                    self.advance_byte();
                    return Ok(Token {
                        literal: literal,
                        tag: TokenTag::StringLiteral,
                        span: span,
                    });
                }
                Some(_) => self.advance_byte(),
            }
        }
    }

    fn scan_number(&mut self, span: Span) -> Result<Token<'a>, ParseError> {
        if self.peek_byte() == Some(b'-') {
            self.advance_byte();
            // A lone minus with no digit following is an identifier
            match self.peek_byte() {
                Some(b'0'..=b'9') => {}
                _ => {
                    return Ok(Token {
                        literal: &self.l_src[span.offset..self.l_pos],
                        tag: TokenTag::Identifier,
                        span: span,
                    })
                }
            }
        }

        let mut seen_dot = false;
        loop {
            match self.peek_byte() {
                Some(b'0'..=b'9') => self.advance_byte(),
                Some(b'.') => {
                    if seen_dot {
                        return Err(ParseError::InvalidNumber { span: span });
                    }
                    seen_dot = true;
                    self.advance_byte();
                }
                Some(byte) if !is_break(byte) => {
                    return Err(ParseError::InvalidNumber { span: span });
                }
                _ => break,
            }
        }

        Ok(Token {
            literal: &self.l_src[span.offset..self.l_pos],
            tag: match seen_dot {
                true => TokenTag::Float,
                false => TokenTag::Int,
            },
            span: span,
        })
    }

    fn scan_identifier(&mut self, span: Span) -> Result<Token<'a>, ParseError> {
        while let Some(byte) = self.peek_byte() {
            if is_break(byte) {
                break;
            }
            self.advance_byte();
        }

        let literal = &self.l_src[span.offset..self.l_pos];
        Ok(Token {
            literal: literal,
            tag: resolve_keyword(literal),
            span: span,
        })
    }
}
