/// Caller identity for a request, taken from the `x-requested-by` header.
///
/// Authorization itself happens in the forecast service; this only carries
/// the name the policy is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterContext {
    requested_by: String,
}

impl RequesterContext {
    pub fn new(requested_by: impl Into<String>) -> Self {
        Self {
            requested_by: requested_by.into(),
        }
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }
}
