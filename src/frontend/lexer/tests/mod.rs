//! 词法分析器测试

use crate::frontend::lexer::{tokenize, LexError, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[cfg(test)]
mod token_tests {
    use super::*;

    #[test]
    fn test_declaration() {
        assert_eq!(
            kinds("I64 g = 3;"),
            vec![
                TokenKind::Identifier("I64".into()),
                TokenKind::Identifier("g".into()),
                TokenKind::Eq,
                TokenKind::IntLiteral(3),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("a <<= b >> c && d || !e != f ++ --"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::ShlEq,
                TokenKind::Identifier("b".into()),
                TokenKind::Shr,
                TokenKind::Identifier("c".into()),
                TokenKind::AndAnd,
                TokenKind::Identifier("d".into()),
                TokenKind::OrOr,
                TokenKind::Not,
                TokenKind::Identifier("e".into()),
                TokenKind::Neq,
                TokenKind::Identifier("f".into()),
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_constants() {
        assert_eq!(
            kinds("try catch class TRUE NULL HTT_FUNCTION"),
            vec![
                TokenKind::KwTry,
                TokenKind::KwCatch,
                TokenKind::KwClass,
                TokenKind::IntLiteral(1),
                TokenKind::IntLiteral(0),
                TokenKind::IntLiteral(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_bases() {
        assert_eq!(
            kinds("0x1F 0b101 1_000"),
            vec![
                TokenKind::IntLiteral(31),
                TokenKind::IntLiteral(5),
                TokenKind::IntLiteral(1000),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_and_char_literals() {
        assert_eq!(
            kinds(r#""Hello\n" 'AB' '\n'"#),
            vec![
                TokenKind::StringLiteral("Hello\n".into()),
                TokenKind::CharLiteral(0x4241),
                TokenKind::CharLiteral(10),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a // line ( {\n/* block { ( */ b"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn test_unterminated_comment_is_truncation() {
        let err = tokenize("a /* open").unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_bad_number_and_char() {
        assert!(matches!(
            tokenize("12abc"),
            Err(LexError::InvalidNumber { .. })
        ));
        assert!(matches!(
            tokenize("'ABCDEFGHI'"),
            Err(LexError::CharTooLong { .. })
        ));
        let err = tokenize("a @ b").unwrap_err();
        assert_eq!(err, LexError::UnexpectedChar { ch: '@', span: err.span() });
        assert_eq!(err.span().start.column, 3);
    }
}
