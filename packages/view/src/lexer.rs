//! HTML lexer using logos
//!
//! Markup is lexed in two passes: [`lex`] splits the source into tags,
//! comments and text, and [`lex_tag`] splits the inside of an opening tag
//! into its name and attributes.

use logos::{Lexer, Logos};

/// Top-level markup tokens
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
pub enum MarkupToken<'src> {
    #[token("<!--", comment)]
    Comment(&'src str),

    /// `<!DOCTYPE ...>` and other declarations
    #[regex(r"<![a-zA-Z][^>]*>", |lex| lex.slice())]
    Declaration(&'src str),

    #[regex(r"<\?[^>]*>", |lex| lex.slice())]
    ProcessingInstruction(&'src str),

    #[regex(r"</[a-zA-Z][a-zA-Z0-9:-]*[ \t\r\n\f]*>", |lex| {
        let s = lex.slice();
        s[2..s.len() - 1].trim()
    })]
    CloseTag(&'src str),

    /// Everything between `<` and `>` of an opening tag
    #[regex(r#"<[a-zA-Z]([^<>"']|"[^"]*"|'[^']*')*>"#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    OpenTag(&'src str),

    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),

    /// A `<` that starts no tag
    #[token("<")]
    Lt,
}

fn comment<'src>(lex: &mut Lexer<'src, MarkupToken<'src>>) -> Option<&'src str> {
    let remainder = lex.remainder();
    let end = remainder.find("-->")?;
    lex.bump(end + 3);
    Some(&remainder[..end])
}

/// Tokens inside an opening tag
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TagToken<'src> {
    #[regex(r#"[^ \t\r\n\f"'<>=]+"#, |lex| lex.slice())]
    Name(&'src str),

    #[token("=")]
    Eq,

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    DoubleQuoted(&'src str),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    SingleQuoted(&'src str),
}

/// Span information for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken<T> {
    pub token: T,
    pub span: TokenSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub span: TokenSpan,
    pub message: String,
}

fn spanned<'src, T>(lexer: Lexer<'src, T>, message: &'static str) -> impl Iterator<Item = Result<SpannedToken<T>, LexError>> + 'src
where
    T: Logos<'src, Source = str> + 'src,
    T::Extras: 'src,
{
    lexer.spanned().map(move |(result, span)| {
        let span = TokenSpan {
            start: span.start,
            end: span.end,
        };
        match result {
            Ok(token) => Ok(SpannedToken { token, span }),
            Err(_) => Err(LexError {
                span,
                message: message.to_string(),
            }),
        }
    })
}

/// Lex markup into tags, comments and text
pub fn lex(source: &str) -> impl Iterator<Item = Result<SpannedToken<MarkupToken<'_>>, LexError>> + '_ {
    spanned(MarkupToken::lexer(source), "Unterminated comment")
}

/// Lex the inside of an opening tag
pub fn lex_tag(source: &str) -> impl Iterator<Item = Result<SpannedToken<TagToken<'_>>, LexError>> + '_ {
    spanned(TagToken::lexer(source), "Unexpected character in tag")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<MarkupToken<'_>> {
        lex(source).filter_map(|r| r.ok()).map(|t| t.token).collect()
    }

    #[test]
    fn test_lex_tags_and_text() {
        assert_eq!(
            tokens(r#"<p class="a">foo<br/></p>"#),
            vec![
                MarkupToken::OpenTag(r#"p class="a""#),
                MarkupToken::Text("foo"),
                MarkupToken::OpenTag("br/"),
                MarkupToken::CloseTag("p"),
            ]
        );
    }

    #[test]
    fn test_lex_comment_and_doctype() {
        assert_eq!(
            tokens("<!DOCTYPE html><!-- a > b -->x"),
            vec![
                MarkupToken::Declaration("<!DOCTYPE html>"),
                MarkupToken::Comment(" a > b "),
                MarkupToken::Text("x"),
            ]
        );
    }

    #[test]
    fn test_lex_stray_lt_and_quoted_gt() {
        assert_eq!(
            tokens(r#"1 < 2 <a title="x>y">"#),
            vec![
                MarkupToken::Text("1 "),
                MarkupToken::Lt,
                MarkupToken::Text(" 2 "),
                MarkupToken::OpenTag(r#"a title="x>y""#),
            ]
        );
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let errors: Vec<_> = lex("<!-- never closed").filter_map(|r| r.err()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.start, 0);
    }

    #[test]
    fn test_lex_tag_attributes() {
        let tokens: Vec<_> = lex_tag(r#"a href=x/y title='t' data-x="1" hidden"#)
            .filter_map(|r| r.ok())
            .map(|t| t.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                TagToken::Name("a"),
                TagToken::Name("href"),
                TagToken::Eq,
                TagToken::Name("x/y"),
                TagToken::Name("title"),
                TagToken::Eq,
                TagToken::SingleQuoted("t"),
                TagToken::Name("data-x"),
                TagToken::Eq,
                TagToken::DoubleQuoted("1"),
                TagToken::Name("hidden"),
            ]
        );
    }
}
