use crate::status::ResponseStatus;
use serde::{Deserialize, Serialize};

/// A command's result record.
///
/// Every command owns exactly one response of its declared type; the
/// submitter holds a shared reference to it and observes status and
/// payload updates after processing. Implementations add their own payload
/// fields next to the status.
pub trait Response: 'static {
    fn status(&self) -> ResponseStatus;

    fn set_status(&mut self, status: ResponseStatus);
}

/// Plain response for commands that produce no payload beyond their status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: ResponseStatus,
}

impl Response for CommandResponse {
    fn status(&self) -> ResponseStatus {
        self.status
    }

    fn set_status(&mut self, status: ResponseStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_response_starts_created() {
        let response = CommandResponse::default();
        assert_eq!(response.status(), ResponseStatus::Created);
    }

    #[test]
    fn set_status_round_trips_through_trait() {
        let mut response = CommandResponse::default();
        response.set_status(ResponseStatus::Completed);
        assert_eq!(response.status(), ResponseStatus::Completed);
    }
}
