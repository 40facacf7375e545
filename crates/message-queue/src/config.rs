use serde::{Deserialize, Serialize};

/// The configuration needed to reconstruct a client for a given back-end.
/// The `tag` field substitutes for the Python source's config class name,
/// so a workflow service can dispatch on it without compile-time knowledge
/// of which back-end the control plane picked (see `GET /queue_config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum QueueConfig {
    Simple {
        capacity: usize,
    },
    Redis {
        url: String,
        exclusive_mode: bool,
    },
    Kafka {
        bootstrap_servers: String,
        group_id: String,
    },
    RabbitMq {
        url: String,
        exchange: String,
    },
    Sqs {
        region: String,
        topic_arn_prefix: String,
        queue_url_prefix: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_stable_across_round_trip() {
        let cfg = QueueConfig::Redis {
            url: "redis://localhost:6379".into(),
            exclusive_mode: true,
        };
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["tag"], "redis");
        let back: QueueConfig = serde_json::from_value(json).unwrap();
        assert_eq!(cfg, back);
    }
}
