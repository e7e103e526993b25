//! CloudFormation value model
//!
//! Many values handed to CloudWatch are only known at deploy time: an
//! auto-named table, the region a stack lands in, the ARN of a topic created
//! alongside the alarms. This module models those values as tokens and lets
//! them be embedded in strings, rendering to the matching intrinsic functions
//! (`Ref`, `Fn::GetAtt`, `Fn::Join`) when the template is synthesized.

use serde_json::{json, Value};
use std::fmt;

const TOKEN_PREFIX: &str = "${Token[WATCHFUL.";
const TOKEN_SUFFIX: &str = "]}";

/// A deploy-time value resolved by CloudFormation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// `{"Ref": logical_id}`, the physical id of a resource
    Ref(String),
    /// `{"Fn::GetAtt": [logical_id, attribute]}`
    GetAtt {
        logical_id: String,
        attribute: String,
    },
    /// The `AWS::Region` pseudo parameter
    Region,
    /// The `AWS::URLSuffix` pseudo parameter
    UrlSuffix,
}

impl Token {
    /// Reference to another resource in the same template
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref(logical_id.into())
    }

    /// Attribute of another resource in the same template
    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// Render this token as a CloudFormation intrinsic
    pub fn to_cfn(&self) -> Value {
        match self {
            Token::Ref(logical_id) => json!({ "Ref": logical_id }),
            Token::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Token::Region => json!({ "Ref": "AWS::Region" }),
            Token::UrlSuffix => json!({ "Ref": "AWS::URLSuffix" }),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ref(logical_id) => write!(f, "${{Ref:{}}}", logical_id),
            Token::GetAtt {
                logical_id,
                attribute,
            } => write!(f, "${{GetAtt:{}.{}}}", logical_id, attribute),
            Token::Region => write!(f, "${{AWS::Region}}"),
            Token::UrlSuffix => write!(f, "${{AWS::URLSuffix}}"),
        }
    }
}

/// One piece of a [`CfnString`]
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Literal(String),
    Token(Token),
}

/// A string that may embed deploy-time tokens
///
/// Adjacent literals are merged and empty literals dropped, so two strings
/// built from the same pieces always compare equal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CfnString {
    fragments: Vec<Fragment>,
}

impl CfnString {
    /// A fully literal string
    pub fn literal(value: impl Into<String>) -> Self {
        let mut s = Self::default();
        s.push_str(&value.into());
        s
    }

    /// A string consisting of a single token
    pub fn token(token: Token) -> Self {
        Self {
            fragments: vec![Fragment::Token(token)],
        }
    }

    /// Builder form of [`CfnString::push_str`]
    pub fn with_str(mut self, value: &str) -> Self {
        self.push_str(value);
        self
    }

    /// Builder form of [`CfnString::push_token`]
    pub fn with_token(mut self, token: Token) -> Self {
        self.push_token(token);
        self
    }

    /// Builder form of [`CfnString::append`]
    pub fn with(mut self, other: &CfnString) -> Self {
        self.append(other);
        self
    }

    pub fn push_str(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        if let Some(Fragment::Literal(last)) = self.fragments.last_mut() {
            last.push_str(value);
        } else {
            self.fragments.push(Fragment::Literal(value.to_string()));
        }
    }

    pub fn push_token(&mut self, token: Token) {
        self.fragments.push(Fragment::Token(token));
    }

    pub fn append(&mut self, other: &CfnString) {
        for fragment in &other.fragments {
            match fragment {
                Fragment::Literal(value) => self.push_str(value),
                Fragment::Token(token) => self.push_token(token.clone()),
            }
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The plain string value, if this string contains no tokens
    pub fn as_literal(&self) -> Option<&str> {
        match self.fragments.as_slice() {
            [] => Some(""),
            [Fragment::Literal(value)] => Some(value),
            _ => None,
        }
    }

    /// Render as a CloudFormation value: a plain string, a bare intrinsic, or `Fn::Join`
    pub fn to_cfn(&self) -> Value {
        match self.fragments.as_slice() {
            [] => Value::String(String::new()),
            [Fragment::Literal(value)] => Value::String(value.clone()),
            [Fragment::Token(token)] => token.to_cfn(),
            fragments => {
                let parts: Vec<Value> = fragments
                    .iter()
                    .map(|fragment| match fragment {
                        Fragment::Literal(value) => Value::String(value.clone()),
                        Fragment::Token(token) => token.to_cfn(),
                    })
                    .collect();
                json!({ "Fn::Join": ["", parts] })
            }
        }
    }
}

impl fmt::Display for CfnString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(value) => f.write_str(value)?,
                Fragment::Token(token) => write!(f, "{}", token)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for CfnString {
    fn from(value: &str) -> Self {
        CfnString::literal(value)
    }
}

impl From<String> for CfnString {
    fn from(value: String) -> Self {
        CfnString::literal(value)
    }
}

impl From<Token> for CfnString {
    fn from(token: Token) -> Self {
        CfnString::token(token)
    }
}

/// Placeholder table used when a token-bearing structure has to be rendered
/// to a single JSON string (the dashboard body).
///
/// Tokens are swapped for placeholders while the structure is serialized, and
/// the resulting text is split back around them afterwards.
#[derive(Debug, Default)]
pub struct TokenMap {
    tokens: Vec<Token>,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a token string, replacing each token with its placeholder
    pub fn encode(&mut self, value: &CfnString) -> String {
        let mut out = String::new();
        for fragment in value.fragments() {
            match fragment {
                Fragment::Literal(literal) => out.push_str(literal),
                Fragment::Token(token) => {
                    let index = self.index_of(token);
                    out.push_str(TOKEN_PREFIX);
                    out.push_str(&index.to_string());
                    out.push_str(TOKEN_SUFFIX);
                }
            }
        }
        out
    }

    /// Split rendered text back into literals and the tokens it references
    pub fn resolve(&self, rendered: &str) -> CfnString {
        let mut out = CfnString::default();
        let mut rest = rendered;

        while let Some(start) = rest.find(TOKEN_PREFIX) {
            let after = &rest[start + TOKEN_PREFIX.len()..];
            let Some(end) = after.find(TOKEN_SUFFIX) else {
                break;
            };

            match after[..end]
                .parse::<usize>()
                .ok()
                .and_then(|index| self.tokens.get(index))
            {
                Some(token) => {
                    out.push_str(&rest[..start]);
                    out.push_token(token.clone());
                    rest = &after[end + TOKEN_SUFFIX.len()..];
                }
                None => {
                    // Not one of ours, keep it verbatim
                    out.push_str(&rest[..start + TOKEN_PREFIX.len()]);
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn index_of(&mut self, token: &Token) -> usize {
        if let Some(index) = self.tokens.iter().position(|t| t == token) {
            return index;
        }
        self.tokens.push(token.clone());
        self.tokens.len() - 1
    }
}
