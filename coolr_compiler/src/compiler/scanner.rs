//! Lexical analysis: source text -> token stream.
//!
//! The scanner is a state machine so that nested block comments and string
//! escapes keep their context across reads. Scan errors do not abort; they
//! are materialized as [TokenKind::Error] entries in the stream and the
//! parser decides how to surface them.

use crate::compiler::common::token::*;

/// Longest permitted string constant, in bytes
const MAX_STRING_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexState {
    Default,
    LineComment,
    BlockComment,
    Str,
    StrEscape,
    BrokenStr,
    ScanError,
}

/// One row of the fixed pattern table. Keywords have to come before the
/// identifier rows so "class" lexes as a keyword, and `Bool` has to come
/// before `ObjectId` so "true" wins the equal-length tie.
enum Pattern {
    /// case-insensitive word match
    Keyword(&'static str, TokenKind),
    /// `true`/`false` in any case, as long as the first letter is lowercase
    Bool,
    Int,
    ObjectId,
    TypeId,
    Symbol(&'static str, TokenKind),
}

const PATTERNS: &[Pattern] = &[
    Pattern::Keyword("class", TokenKind::Class),
    Pattern::Keyword("if", TokenKind::If),
    Pattern::Keyword("else", TokenKind::Else),
    Pattern::Keyword("fi", TokenKind::Fi),
    Pattern::Keyword("in", TokenKind::In),
    Pattern::Keyword("inherits", TokenKind::Inherits),
    Pattern::Keyword("let", TokenKind::Let),
    Pattern::Keyword("loop", TokenKind::Loop),
    Pattern::Keyword("pool", TokenKind::Pool),
    Pattern::Keyword("then", TokenKind::Then),
    Pattern::Keyword("while", TokenKind::While),
    Pattern::Keyword("case", TokenKind::Case),
    Pattern::Keyword("esac", TokenKind::Esac),
    Pattern::Keyword("of", TokenKind::Of),
    Pattern::Keyword("new", TokenKind::New),
    Pattern::Keyword("isvoid", TokenKind::IsVoid),
    Pattern::Keyword("not", TokenKind::Not),
    Pattern::Bool,
    Pattern::Int,
    Pattern::ObjectId,
    Pattern::TypeId,
    Pattern::Symbol("<=", TokenKind::LessEqual),
    Pattern::Symbol("<-", TokenKind::Assign),
    Pattern::Symbol("=>", TokenKind::DArrow),
    Pattern::Symbol("+", TokenKind::Plus),
    Pattern::Symbol("-", TokenKind::Minus),
    Pattern::Symbol("*", TokenKind::Star),
    Pattern::Symbol("/", TokenKind::Slash),
    Pattern::Symbol("<", TokenKind::Less),
    Pattern::Symbol("=", TokenKind::Equal),
    Pattern::Symbol("(", TokenKind::LeftParen),
    Pattern::Symbol(")", TokenKind::RightParen),
    Pattern::Symbol("{", TokenKind::LeftBrace),
    Pattern::Symbol("}", TokenKind::RightBrace),
    Pattern::Symbol(":", TokenKind::Colon),
    Pattern::Symbol(";", TokenKind::Semicolon),
    Pattern::Symbol(".", TokenKind::Dot),
    Pattern::Symbol(",", TokenKind::Comma),
    Pattern::Symbol("@", TokenKind::At),
    Pattern::Symbol("~", TokenKind::Tilde),
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive word match: `word` followed by a word boundary.
/// Compared byte-wise so multi-byte characters in the source can't split a
/// slice.
fn word_match(rest: &str, word: &str) -> bool {
    rest.len() >= word.len()
        && rest.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes())
        && !rest[word.len()..].chars().next().is_some_and(is_word_char)
}

impl Pattern {
    fn matches(&self, rest: &str) -> Option<(usize, TokenKind)> {
        match self {
            Pattern::Keyword(word, kind) => {
                if word_match(rest, word) {
                    Some((word.len(), kind.clone()))
                } else {
                    None
                }
            }
            Pattern::Bool => {
                for (word, value) in [("true", true), ("false", false)] {
                    if rest.starts_with(word.as_bytes()[0] as char) && word_match(rest, word) {
                        return Some((word.len(), TokenKind::BoolConst(value)));
                    }
                }
                None
            }
            Pattern::Int => {
                let len = rest.bytes().take_while(u8::is_ascii_digit).count();
                if len > 0 {
                    Some((len, TokenKind::IntConst(rest[..len].to_string())))
                } else {
                    None
                }
            }
            Pattern::ObjectId => ident_match(rest, char::is_lowercase)
                .map(|len| (len, TokenKind::ObjectId(rest[..len].to_string()))),
            Pattern::TypeId => ident_match(rest, char::is_uppercase)
                .map(|len| (len, TokenKind::TypeId(rest[..len].to_string()))),
            Pattern::Symbol(symbol, kind) => {
                if rest.starts_with(symbol) {
                    Some((symbol.len(), kind.clone()))
                } else {
                    None
                }
            }
        }
    }
}

fn ident_match(rest: &str, first: fn(char) -> bool) -> Option<usize> {
    let c = rest.chars().next()?;
    if !c.is_ascii_alphabetic() || !first(c) {
        return None;
    }
    Some(1 + rest[1..].bytes().take_while(|b| is_word_char(*b as char)).count())
}

pub struct Scanner<'a> {
    source: &'a str,
    // byte index into source
    cursor: usize,
    line: u32,
    state: LexState,
    // scratch buffer for assembling string constants
    string_builder: String,
    error_message: String,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            cursor: 0,
            line: 1,
            state: LexState::Default,
            string_builder: String::new(),
            error_message: String::new(),
            tokens: Vec::new(),
        }
    }

    pub fn scan(mut self) -> Vec<Token> {
        loop {
            match self.state {
                LexState::Default => {
                    if self.at_eof() {
                        break;
                    }
                    self.default_scan();
                }
                LexState::LineComment => self.line_comment_scan(),
                LexState::BlockComment => self.block_comment_scan(),
                LexState::Str => self.string_scan(),
                LexState::StrEscape => self.escaped_string_scan(),
                LexState::BrokenStr => {
                    self.add_error_token();
                    self.broken_string_scan();
                }
                LexState::ScanError => {
                    self.add_error_token();
                    self.state = LexState::Default;
                }
            }
        }
        self.tokens
    }

    fn at_eof(&self) -> bool {
        self.cursor >= self.source.len()
    }

    fn rest(&self) -> &str {
        &self.source[self.cursor..]
    }

    fn advance(&mut self) -> char {
        let c = self.rest().chars().next().expect("checked eof before advancing");
        self.cursor += c.len_utf8();
        c
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.line));
    }

    fn add_error_token(&mut self) {
        let msg = std::mem::take(&mut self.error_message);
        self.add_token(TokenKind::Error(msg));
    }

    fn default_scan(&mut self) {
        self.skip_whitespace();
        if self.at_eof() {
            return;
        }

        // strings and comment delimiters cause a state transition and take
        // priority over the pattern table
        if self.rest().starts_with("--") {
            self.cursor += 2;
            self.state = LexState::LineComment;
            return;
        }
        if self.rest().starts_with("(*") {
            self.cursor += 2;
            self.state = LexState::BlockComment;
            return;
        }
        if self.rest().starts_with('"') {
            self.cursor += 1;
            self.state = LexState::Str;
            return;
        }
        if self.rest().starts_with("*)") {
            self.cursor += 2;
            self.error_message = "Unmatched *)".to_string();
            self.state = LexState::ScanError;
            return;
        }

        // longest match over the pattern table; on equal length the earlier
        // row wins
        let mut best: Option<(usize, TokenKind)> = None;
        for pattern in PATTERNS {
            if let Some((len, kind)) = pattern.matches(self.rest()) {
                if best.as_ref().is_none_or(|(best_len, _)| len > *best_len) {
                    best = Some((len, kind));
                }
            }
        }

        match best {
            Some((len, kind)) => {
                self.add_token(kind);
                self.cursor += len;
            }
            None => {
                self.error_message = self.advance().to_string();
                self.state = LexState::ScanError;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.cursor += 1;
                }
                ' ' | '\t' | '\x0b' | '\r' | '\x0c' => self.cursor += 1,
                _ => break,
            }
        }
    }

    fn line_comment_scan(&mut self) {
        while !self.at_eof() {
            if self.advance() == '\n' {
                self.line += 1;
                self.state = LexState::Default;
                return;
            }
        }
        self.state = LexState::Default;
    }

    fn block_comment_scan(&mut self) {
        // block comments nest
        let mut nested: u32 = 1;

        loop {
            if self.at_eof() {
                self.error_message = "EOF in comment".to_string();
                self.add_error_token();
                self.state = LexState::Default;
                return;
            }

            if self.rest().starts_with("(*") {
                nested += 1;
                self.cursor += 2;
            } else if self.rest().starts_with("*)") {
                nested -= 1;
                self.cursor += 2;
                if nested == 0 {
                    self.state = LexState::Default;
                    return;
                }
            } else if self.advance() == '\n' {
                self.line += 1;
            }
        }
    }

    fn string_scan(&mut self) {
        loop {
            if self.at_eof() {
                self.error_message = "EOF in string constant".to_string();
                self.add_error_token();
                self.state = LexState::Default;
                return;
            }

            let c = self.advance();
            match c {
                '"' => {
                    let value = std::mem::take(&mut self.string_builder);
                    self.add_token(TokenKind::StrConst(value));
                    self.state = LexState::Default;
                    return;
                }
                '\\' => {
                    self.state = LexState::StrEscape;
                    return;
                }
                '\n' => {
                    self.line += 1;
                    self.string_builder.clear();
                    self.error_message = "Unterminated string constant".to_string();
                    self.state = LexState::ScanError;
                    return;
                }
                '\0' => {
                    self.string_builder.clear();
                    self.error_message = "String contains null character.".to_string();
                    self.state = LexState::BrokenStr;
                    return;
                }
                c => self.string_builder.push(c),
            }

            if self.string_builder.len() > MAX_STRING_SIZE {
                self.string_builder.clear();
                self.error_message = "String constant too long".to_string();
                self.state = LexState::BrokenStr;
                return;
            }
        }
    }

    fn escaped_string_scan(&mut self) {
        if self.at_eof() {
            self.error_message = "EOF in string constant".to_string();
            self.add_error_token();
            self.state = LexState::Default;
            return;
        }

        match self.advance() {
            '\0' => {
                self.string_builder.clear();
                self.error_message = "String contains escaped null character.".to_string();
                self.state = LexState::BrokenStr;
                return;
            }
            '\n' => {
                self.line += 1;
                self.string_builder.push('\n');
            }
            'n' => self.string_builder.push('\n'),
            't' => self.string_builder.push('\t'),
            'b' => self.string_builder.push('\x08'),
            'f' => self.string_builder.push('\x0c'),
            c => self.string_builder.push(c),
        }

        self.state = LexState::Str;
    }

    /// Recovery state for broken strings: consumes input up to an unescaped
    /// newline or a closing quote without producing anything
    fn broken_string_scan(&mut self) {
        let mut escaped = false;

        loop {
            if self.at_eof() {
                self.state = LexState::Default;
                return;
            }
            match self.advance() {
                '\\' => escaped = true,
                '\n' => {
                    self.line += 1;
                    if !escaped {
                        self.state = LexState::Default;
                        return;
                    }
                }
                '"' => {
                    self.state = LexState::Default;
                    return;
                }
                _ => escaped = false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_generic(input: &str) -> Vec<Token> {
        Scanner::new(input).scan()
    }

    // helper when line numbers aren't relevant
    fn setup(input: &str) -> Vec<TokenKind> {
        setup_generic(input).into_iter().map(|t| t.kind).collect()
    }

    fn obj(name: &str) -> TokenKind {
        TokenKind::ObjectId(name.to_string())
    }
    fn typ(name: &str) -> TokenKind {
        TokenKind::TypeId(name.to_string())
    }
    fn int(value: &str) -> TokenKind {
        TokenKind::IntConst(value.to_string())
    }

    #[test]
    fn scans_class_header() {
        let actual = setup("class A inherits B { x:Int<-1; };");
        let expected = vec![
            TokenKind::Class,
            typ("A"),
            TokenKind::Inherits,
            typ("B"),
            TokenKind::LeftBrace,
            obj("x"),
            TokenKind::Colon,
            typ("Int"),
            TokenKind::Assign,
            int("1"),
            TokenKind::Semicolon,
            TokenKind::RightBrace,
            TokenKind::Semicolon,
        ];
        assert_eq!(actual, expected);
        assert!(setup_generic("class A inherits B { x:Int<-1; };")
            .iter()
            .all(|t| t.line == 1));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let actual = setup("CLASS Class cLaSs NOT IsVoid");
        let expected = vec![
            TokenKind::Class,
            TokenKind::Class,
            TokenKind::Class,
            TokenKind::Not,
            TokenKind::IsVoid,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn bool_requires_lowercase_first_letter() {
        let actual = setup("true tRuE True FALSE fAlSe");
        let expected = vec![
            TokenKind::BoolConst(true),
            TokenKind::BoolConst(true),
            typ("True"),
            typ("FALSE"),
            TokenKind::BoolConst(false),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn longest_match_prefers_compound_operators() {
        let actual = setup("<= <- => < = ~ @ .");
        let expected = vec![
            TokenKind::LessEqual,
            TokenKind::Assign,
            TokenKind::DArrow,
            TokenKind::Less,
            TokenKind::Equal,
            TokenKind::Tilde,
            TokenKind::At,
            TokenKind::Dot,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn keyword_prefix_is_still_identifier() {
        // "classes" must not lex as CLASS followed by "es"
        let actual = setup("classes ifx");
        assert_eq!(actual, vec![obj("classes"), obj("ifx")]);
    }

    #[test]
    fn tracks_line_numbers() {
        let actual = setup_generic("x\n\ny");
        assert_eq!(
            actual,
            vec![Token::new(obj("x"), 1), Token::new(obj("y"), 3)]
        );
    }

    #[test]
    fn skips_line_comments() {
        let actual = setup("a -- comment with class and if\nb");
        assert_eq!(actual, vec![obj("a"), obj("b")]);
    }

    #[test]
    fn block_comments_nest() {
        let actual = setup("(* one (* two (* three *) *) still comment *) 42");
        assert_eq!(actual, vec![int("42")]);
    }

    #[test]
    fn unmatched_comment_close() {
        let actual = setup("*)");
        assert_eq!(actual, vec![TokenKind::Error("Unmatched *)".to_string())]);
    }

    #[test]
    fn eof_inside_comment() {
        let actual = setup("(* never closed");
        assert_eq!(actual, vec![TokenKind::Error("EOF in comment".to_string())]);
    }

    #[test]
    fn string_escapes() {
        let actual = setup(r#""a\nb\tc\q""#);
        assert_eq!(actual, vec![TokenKind::StrConst("a\nb\tcq".to_string())]);
    }

    #[test]
    fn string_with_escaped_newline_spans_lines() {
        let actual = setup_generic("\"a\\\nb\"");
        assert_eq!(
            actual,
            vec![Token::new(TokenKind::StrConst("a\nb".to_string()), 2)]
        );
    }

    #[test]
    fn unterminated_string() {
        let actual = setup("\"abc\nx");
        assert_eq!(
            actual,
            vec![
                TokenKind::Error("Unterminated string constant".to_string()),
                obj("x"),
            ]
        );
    }

    #[test]
    fn eof_in_string() {
        let actual = setup("\"abc");
        assert_eq!(
            actual,
            vec![TokenKind::Error("EOF in string constant".to_string())]
        );
    }

    #[test]
    fn null_byte_in_string_recovers_until_quote() {
        let actual = setup("\"a\0bc\" x");
        assert_eq!(
            actual,
            vec![
                TokenKind::Error("String contains null character.".to_string()),
                obj("x"),
            ]
        );
    }

    #[test]
    fn escaped_null_byte_in_string() {
        let actual = setup("\"a\\\0bc\"");
        assert_eq!(
            actual,
            vec![TokenKind::Error(
                "String contains escaped null character.".to_string()
            )]
        );
    }

    #[test]
    fn overlong_string() {
        let long = format!("\"{}\" y", "a".repeat(MAX_STRING_SIZE + 1));
        let actual = setup(&long);
        assert_eq!(
            actual,
            vec![
                TokenKind::Error("String constant too long".to_string()),
                obj("y"),
            ]
        );

        // exactly the maximum is still fine
        let max = format!("\"{}\"", "a".repeat(MAX_STRING_SIZE));
        assert_eq!(
            setup(&max),
            vec![TokenKind::StrConst("a".repeat(MAX_STRING_SIZE))]
        );
    }

    #[test]
    fn unrecognized_character() {
        let actual = setup("x # y");
        assert_eq!(
            actual,
            vec![obj("x"), TokenKind::Error("#".to_string()), obj("y")]
        );
    }

    #[test]
    fn numbers_split_from_identifiers() {
        let actual = setup("123abc");
        assert_eq!(actual, vec![int("123"), obj("abc")]);
    }
}
