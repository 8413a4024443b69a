//! Hierarchical topic addressing
//!
//! A [`Topic`] is a `/`-separated sequence of segments. Each segment is
//! either a literal or a `{name}` placeholder that is substituted from a
//! [`TopicContext`] when the topic is rendered for the wire.
//!
//! ```
//! # use gwsim_core::topic::{Topic, TopicContext};
//! let topic: Topic = "{account-name}/{client-id}/clock/GET".parse().unwrap();
//! let ctx = TopicContext::for_gateway("acme", "gw-1");
//! assert_eq!(topic.render(&ctx).unwrap(), "acme/gw-1/clock/GET");
//! assert!(topic.matches("acme/gw-9/clock/GET"));
//! ```
//!
//! MQTT filter wildcards are carried as literal segments: `+` matches a
//! single level, a trailing `#` matches the remaining levels.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TopicError;

/// Placeholder bound to the account (tenant) the gateway belongs to
pub const ACCOUNT_NAME: &str = "account-name";

/// Placeholder bound to the gateway's MQTT client identifier
pub const CLIENT_ID: &str = "client-id";

/// Prefix of platform control topics
pub const CONTROL_PREFIX: &str = "$EDC";

const SINGLE_LEVEL_WILDCARD: &str = "+";
const MULTI_LEVEL_WILDCARD: &str = "#";

/// Placeholder bindings used to render topics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicContext {
    bindings: BTreeMap<String, String>,
}

impl TopicContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the standard gateway bindings
    pub fn for_gateway(account_name: &str, client_id: &str) -> Self {
        Self::new()
            .with(ACCOUNT_NAME, account_name)
            .with(CLIENT_ID, client_id)
    }

    /// Add a binding, replacing any previous value for `name`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

}

/// A single topic level
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matched and rendered verbatim (includes `+` and `#`)
    Literal(String),
    /// Substituted from the context on render, matches any single level
    Placeholder(String),
}

impl Segment {
    fn parse(topic: &str, text: &str) -> Result<Self, TopicError> {
        if text.is_empty() {
            return Err(TopicError::malformed(topic, "empty segment"));
        }
        if text.contains('\0') {
            return Err(TopicError::malformed(topic, "NUL character"));
        }

        if let Some(name) = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty() {
                return Err(TopicError::malformed(topic, "empty placeholder name"));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(TopicError::malformed(
                    topic,
                    format!("illegal placeholder name '{}'", name),
                ));
            }
            return Ok(Self::Placeholder(name.to_string()));
        }

        if text.contains(['{', '}']) {
            return Err(TopicError::malformed(
                topic,
                format!("placeholder must span a whole segment: '{}'", text),
            ));
        }
        if text != SINGLE_LEVEL_WILDCARD
            && text != MULTI_LEVEL_WILDCARD
            && text.contains(['+', '#'])
        {
            return Err(TopicError::malformed(
                topic,
                format!("wildcard must span a whole segment: '{}'", text),
            ));
        }

        Ok(Self::Literal(text.to_string()))
    }

    fn is_multi_level(&self) -> bool {
        matches!(self, Segment::Literal(l) if l == MULTI_LEVEL_WILDCARD)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(l) => f.write_str(l),
            Segment::Placeholder(name) => write!(f, "{{{}}}", name),
        }
    }
}

/// An ordered sequence of literal and placeholder segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    segments: Vec<Segment>,
}

impl Topic {
    /// Parse a topic from its textual form
    pub fn parse(text: &str) -> Result<Self, TopicError> {
        if text.is_empty() {
            return Err(TopicError::malformed(text, "empty topic"));
        }
        let segments = text
            .split('/')
            .map(|s| Segment::parse(text, s))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_segments(text, segments)
    }

    fn from_segments(text: &str, segments: Vec<Segment>) -> Result<Self, TopicError> {
        if let Some(pos) = segments.iter().position(Segment::is_multi_level) {
            if pos + 1 != segments.len() {
                return Err(TopicError::malformed(text, "'#' must be the last segment"));
            }
        }
        Ok(Self { segments })
    }

    /// `{account-name}/{client-id}/<app_id>`: the namespace owned by an application
    pub fn application(app_id: &str) -> Result<Self, TopicError> {
        Self::gateway_scoped(None).join(app_id)
    }

    /// `$EDC/{account-name}/{client-id}/MQTT/BIRTH`
    pub fn birth() -> Self {
        let mut topic = Self::gateway_scoped(Some(CONTROL_PREFIX));
        topic.segments.push(Segment::Literal("MQTT".to_string()));
        topic.segments.push(Segment::Literal("BIRTH".to_string()));
        topic
    }

    fn gateway_scoped(prefix: Option<&str>) -> Self {
        let mut segments = Vec::with_capacity(3);
        if let Some(prefix) = prefix {
            segments.push(Segment::Literal(prefix.to_string()));
        }
        segments.push(Segment::Placeholder(ACCOUNT_NAME.to_string()));
        segments.push(Segment::Placeholder(CLIENT_ID.to_string()));
        Self { segments }
    }

    /// Append the segments of `suffix` (which may itself contain `/`)
    pub fn join(&self, suffix: &str) -> Result<Self, TopicError> {
        let tail = Self::parse(suffix)?;
        if self.segments.last().is_some_and(Segment::is_multi_level) {
            return Err(TopicError::malformed(
                &format!("{}/{}", self, suffix),
                "'#' must be the last segment",
            ));
        }
        let mut segments = self.segments.clone();
        segments.extend(tail.segments);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Text of the last segment, if it is a literal
    pub fn last_literal(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Literal(l)) => Some(l),
            _ => None,
        }
    }

    /// Render to a concrete topic string, substituting every placeholder
    pub fn render(&self, context: &TopicContext) -> Result<String, TopicError> {
        let mut parts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => parts.push(l.as_str()),
                Segment::Placeholder(name) => parts.push(
                    context
                        .get(name)
                        .ok_or_else(|| TopicError::UnresolvedPlaceholder(name.clone()))?,
                ),
            }
        }
        Ok(parts.join("/"))
    }

    /// Segment-wise match against a concrete topic string
    ///
    /// Placeholders and `+` match any single level, a trailing `#` matches
    /// zero or more remaining levels, literals must be equal. Without `#`
    /// the level counts must be equal.
    pub fn matches(&self, candidate: &str) -> bool {
        let mut levels = candidate.split('/');
        for segment in &self.segments {
            if segment.is_multi_level() {
                return true;
            }
            let Some(level) = levels.next() else {
                return false;
            };
            match segment {
                Segment::Placeholder(_) => {}
                Segment::Literal(l) if l == SINGLE_LEVEL_WILDCARD => {}
                Segment::Literal(l) => {
                    if l != level {
                        return false;
                    }
                }
            }
        }
        levels.next().is_none()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
