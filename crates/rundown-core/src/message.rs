//! Inbound classification and typed payload views.

use crate::envelope::Envelope;
use crate::types;
use serde::{Deserialize, Serialize};

/// An inbound frame sorted by what the correlation layer can do with it.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Discovery reply, matched by message type rather than request id.
    Pong(Envelope),
    /// A reply carrying the id of the call it answers.
    Reply { request_id: u64, envelope: Envelope },
    /// Traffic this layer cannot route; dropped after logging.
    Opaque(Envelope),
}

impl Inbound {
    /// Classify a decoded envelope.
    pub fn classify(envelope: Envelope) -> Self {
        if envelope.message_type == types::PONG {
            Inbound::Pong(envelope)
        } else if let Some(request_id) = envelope.request_id() {
            Inbound::Reply {
                request_id,
                envelope,
            }
        } else {
            Inbound::Opaque(envelope)
        }
    }
}

/// A reply body carrying a human-readable `text` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextReply {
    pub text: String,
}

/// The `GetPages` reply body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageList {
    #[serde(default)]
    pub pages: Vec<PageInfo>,
}

/// One page as the bridge reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page_id: i64,
    /// Template pages describe layouts and cannot be played directly.
    #[serde(default)]
    pub is_template: bool,
}

impl PageList {
    /// Ids of the pages a page action can target, ascending.
    pub fn actionable_page_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .pages
            .iter()
            .filter(|page| !page.is_template)
            .map(|page| page.page_id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(message_type: &str, message: &str) -> Envelope {
        Envelope::decode(&format!(
            r#"{{"MessageType":"{message_type}","Message":{message}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn pong_is_matched_by_type() {
        let env = envelope(types::PONG, "{}");
        assert_eq!(Inbound::classify(env.clone()), Inbound::Pong(env));
    }

    #[test]
    fn pong_wins_even_with_a_request_id() {
        let env = envelope(types::PONG, r#"{"requestId":9}"#);
        assert!(matches!(Inbound::classify(env), Inbound::Pong(_)));
    }

    #[test]
    fn reply_is_matched_by_request_id() {
        let env = envelope("/Script/X.LoadReply", r#"{"requestId":2,"text":"ok"}"#);
        match Inbound::classify(env) {
            Inbound::Reply {
                request_id,
                envelope,
            } => {
                assert_eq!(request_id, 2);
                assert_eq!(envelope.message["text"], "ok");
            }
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[test]
    fn unroutable_traffic_is_opaque() {
        let env = envelope("/Script/X.Broadcast", r#"{"text":"hello"}"#);
        assert!(matches!(Inbound::classify(env), Inbound::Opaque(_)));
    }

    #[test]
    fn page_list_decodes_bridge_shape() {
        let env = envelope(
            "/Script/X.GetPagesReply",
            r#"{"requestId":2,"pages":[{"pageId":1,"isTemplate":true},{"pageId":3,"isTemplate":false},{"pageId":2,"isTemplate":false}]}"#,
        );
        let list: PageList = env.body_as().unwrap();
        assert_eq!(list.pages.len(), 3);
        assert_eq!(list.actionable_page_ids(), vec![2, 3]);
    }

    #[test]
    fn page_list_tolerates_missing_fields() {
        let env = envelope("/Script/X.GetPagesReply", r#"{"requestId":2}"#);
        let list: PageList = env.body_as().unwrap();
        assert!(list.pages.is_empty());
        let env = envelope(
            "/Script/X.GetPagesReply",
            r#"{"requestId":2,"pages":[{"pageId":4}]}"#,
        );
        let list: PageList = env.body_as().unwrap();
        assert_eq!(list.actionable_page_ids(), vec![4]);
    }

    #[test]
    fn text_reply_decodes() {
        let env = envelope("/Script/X.LoadReply", r#"{"requestId":1,"text":"Loaded"}"#);
        let reply: TextReply = env.body_as().unwrap();
        assert_eq!(reply.text, "Loaded");
    }

    #[test]
    fn text_reply_requires_text() {
        let env = envelope("/Script/X.LoadReply", r#"{"requestId":1}"#);
        assert!(env.body_as::<TextReply>().is_err());
    }
}
