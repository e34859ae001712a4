//! Reply tickets handed to method handlers.

use tracing::warn;

/// Separator between a method name and the correlation id in an ephemeral
/// reply destination (`<method>@<correlation>`).
pub const DESTINATION_SEPARATOR: char = '@';

/// Correlation used by invocations that do not want a reply.
pub const IGNORE_CORRELATION: &str = "ignore";

/// Build the ephemeral reply destination for a method invocation.
pub fn reply_destination(method: &str, correlation: &str) -> String {
    format!("{}{}{}", method, DESTINATION_SEPARATOR, correlation)
}

/// Pattern a method registration subscribes to.
pub fn method_pattern(method: &str) -> String {
    format!("{}{}*", method, DESTINATION_SEPARATOR)
}

/// One-time handle for answering a single method request.
///
/// Consumed by [`crate::Apid::reply`]. A ticket dropped without a reply
/// leaves the caller waiting (forever, unless it asked for a bounded wait).
#[must_use = "a reply ticket must be consumed with Apid::reply"]
#[derive(Debug)]
pub struct ReplyTicket {
    destination: String,
    consumed: bool,
}

impl ReplyTicket {
    pub(crate) fn new(destination: String) -> Self {
        Self {
            destination,
            consumed: false,
        }
    }

    /// Full reply destination, `<method>@<correlation>`.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Correlation part of the destination.
    pub fn correlation(&self) -> &str {
        self.destination
            .rsplit_once(DESTINATION_SEPARATOR)
            .map(|(_, correlation)| correlation)
            .unwrap_or_default()
    }

    /// True for requests sent without a callback (`<method>@ignore`).
    pub fn is_ignored(&self) -> bool {
        self.correlation() == IGNORE_CORRELATION
    }

    pub(crate) fn consume(mut self) -> String {
        self.consumed = true;
        std::mem::take(&mut self.destination)
    }
}

impl Drop for ReplyTicket {
    fn drop(&mut self) {
        if !self.consumed {
            warn!(
                destination = %self.destination,
                "Reply ticket dropped without a reply; caller keeps waiting"
            );
        }
    }
}
