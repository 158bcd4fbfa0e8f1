//! Ticket identifier generation.

use crate::types::TicketId;

/// Source of fresh ticket identifiers, one per submitted job.
pub trait TicketIdProvider: Send + Sync {
    fn next_id(&self) -> TicketId;
}

/// Random UUID v4 tickets, formatted as hyphenated lowercase hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTicketIds;

impl TicketIdProvider for UuidTicketIds {
    fn next_id(&self) -> TicketId {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_tickets_are_unique_and_parseable() {
        let ids = UuidTicketIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
