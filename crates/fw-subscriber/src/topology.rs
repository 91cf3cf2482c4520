//! Broker topology descriptor, supplied once at startup.

use std::str::FromStr;

use lapin::ExchangeKind;

use crate::error::SourceError;

/// Supported AMQP exchange types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    Direct,
    Topic,
    Fanout,
    Headers,
}

impl ExchangeType {
    pub fn as_exchange_kind(self) -> ExchangeKind {
        match self {
            ExchangeType::Direct => ExchangeKind::Direct,
            ExchangeType::Topic => ExchangeKind::Topic,
            ExchangeType::Fanout => ExchangeKind::Fanout,
            ExchangeType::Headers => ExchangeKind::Headers,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Topic => "topic",
            ExchangeType::Fanout => "fanout",
            ExchangeType::Headers => "headers",
        }
    }
}

impl FromStr for ExchangeType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ExchangeType::Direct),
            "topic" => Ok(ExchangeType::Topic),
            "fanout" => Ok(ExchangeType::Fanout),
            "headers" => Ok(ExchangeType::Headers),
            other => Err(SourceError::UnsupportedExchange(other.to_string())),
        }
    }
}

/// Exchange, queue, binding and QoS configuration for one consumer.
///
/// Immutable after construction. Exchange and queue are declared durable so
/// the topology survives broker restarts.
#[derive(Debug, Clone)]
pub struct Topology {
    pub exchange_name: String,
    pub exchange_type: ExchangeType,
    pub queue_name: String,
    pub binding_key: String,
    /// Upper bound on in-flight unacknowledged deliveries.
    pub prefetch_count: u16,
}

impl Topology {
    /// Binding key actually used for the queue bind.
    ///
    /// An empty key is an intentional "receive all" configuration, not an
    /// error: it binds with `#`, which matches every routing key in topic
    /// semantics.
    pub fn effective_binding_key(&self) -> &str {
        if self.binding_key.is_empty() {
            "#"
        } else {
            &self.binding_key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(binding_key: &str) -> Topology {
        Topology {
            exchange_name: "app.events".to_string(),
            exchange_type: ExchangeType::Topic,
            queue_name: "app.worker.q".to_string(),
            binding_key: binding_key.to_string(),
            prefetch_count: 20,
        }
    }

    #[test]
    fn empty_binding_key_matches_everything() {
        assert_eq!(topology("").effective_binding_key(), "#");
    }

    #[test]
    fn explicit_binding_key_is_kept() {
        assert_eq!(topology("project.*").effective_binding_key(), "project.*");
    }

    #[test]
    fn exchange_type_parsing() {
        assert_eq!("topic".parse::<ExchangeType>().unwrap(), ExchangeType::Topic);
        assert_eq!(
            "fanout".parse::<ExchangeType>().unwrap(),
            ExchangeType::Fanout
        );
        assert!("quorum".parse::<ExchangeType>().is_err());
    }
}
