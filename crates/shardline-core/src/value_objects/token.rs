//! Credentials
//!
//! A token is either a bot token, an OAuth2 bearer token, or a bare user token.

use std::fmt;

/// Kind of credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Bot,
    Bearer,
    User,
}

/// Authorization credential
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    secret: String,
}

/// Error when parsing a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenParseError {
    #[error("token is empty")]
    Empty,

    #[error("token contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl Token {
    /// Create a bot token from the raw secret
    pub fn bot(secret: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Bot,
            secret: secret.into(),
        }
    }

    /// Create a bearer token from the raw secret
    pub fn bearer(secret: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Bearer,
            secret: secret.into(),
        }
    }

    /// Parse `Bot <secret>`, `Bearer <secret>`, or a bare user token
    pub fn parse(s: &str) -> Result<Self, TokenParseError> {
        let s = s.trim();
        let (kind, secret) = if let Some(rest) = s.strip_prefix("Bot ") {
            (TokenKind::Bot, rest)
        } else if let Some(rest) = s.strip_prefix("Bearer ") {
            (TokenKind::Bearer, rest)
        } else {
            (TokenKind::User, s)
        };

        if secret.is_empty() {
            return Err(TokenParseError::Empty);
        }

        if let Some(c) = secret
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        {
            return Err(TokenParseError::InvalidCharacter(c));
        }

        Ok(Self {
            kind,
            secret: secret.to_string(),
        })
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The raw secret, as sent in Identify and Resume
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        match self.kind {
            TokenKind::Bot => format!("Bot {}", self.secret),
            TokenKind::Bearer => format!("Bearer {}", self.secret),
            TokenKind::User => self.secret.clone(),
        }
    }

    /// Bearer tokens cannot open gateway sessions
    pub fn can_connect_gateway(&self) -> bool {
        !matches!(self.kind, TokenKind::Bearer)
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.kind, TokenKind::Bot)
    }
}

impl std::str::FromStr for Token {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::parse(s)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = if self.secret.chars().count() > 6 {
            let head: String = self.secret.chars().take(2).collect();
            let mut tail: Vec<char> = self.secret.chars().rev().take(2).collect();
            tail.reverse();
            format!("{head}...{}", tail.into_iter().collect::<String>())
        } else {
            "***".to_string()
        };

        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("secret", &redacted)
            .finish()
    }
}
