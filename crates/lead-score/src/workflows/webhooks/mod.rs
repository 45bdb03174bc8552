//! Debug inbox for inbound CRM webhooks.

pub mod inbox;
pub mod router;

pub use inbox::{read_cached, WebhookInbox, WebhookPayload, INBOX_CAPACITY};
pub use router::{webhook_router, SharedInbox};
