use anyhow::Result;
use async_trait::async_trait;

use super::Plugin;
use crate::matcher::{ReferenceKind, TrackerReference};

/// Reply that tells the transport to leave the current channel.
pub const LEAVE_REPLY: &str = "/leave";

/// `rs leave` / `rosencrantz leave`
pub struct Leave;

#[async_trait]
impl Plugin for Leave {
    fn name(&self) -> &'static str {
        "leave"
    }

    fn accepts(&self, reference: &TrackerReference) -> bool {
        reference.kind == ReferenceKind::LeaveCommand
    }

    async fn resolve(&self, _references: &[TrackerReference]) -> Result<Option<String>> {
        Ok(Some(LEAVE_REPLY.to_string()))
    }
}
