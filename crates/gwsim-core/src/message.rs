//! Inbound message delivered by a transport

use std::sync::Arc;

use bytes::Bytes;

use crate::topic::{Topic, TopicContext};

/// Immutable (topic, payload, context) triple
///
/// Constructed by the transport when data arrives. The context is the
/// transport's own, so handlers can render reply topics against it.
#[derive(Debug, Clone)]
pub struct Message {
    topic: Topic,
    payload: Bytes,
    context: Arc<TopicContext>,
}

impl Message {
    pub fn new(topic: Topic, payload: impl Into<Bytes>, context: Arc<TopicContext>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            context,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn context(&self) -> &TopicContext {
        &self.context
    }
}
