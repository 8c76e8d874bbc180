/// Mutable scratch state shared by every check body in one batch run.
///
/// Lifecycle checks within a category hand ids to each other through these
/// fields, and the cleanup category drains the created-id lists at the end
/// (a compensating delete, not a rollback). The context is owned exclusively
/// by the running batch; a fresh one is built per full run.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Ids created by earlier checks, in creation order, for later reference
    /// and final cleanup.
    pub created_listing_ids: Vec<String>,
    pub created_request_ids: Vec<String>,
    pub created_agreement_ids: Vec<String>,

    /// Discovered ids reused by later checks in the same run.
    pub listing_id: Option<String>,
    pub request_id: Option<String>,
    pub agreement_id: Option<String>,
    pub sample_listing_id: Option<String>,
    pub sample_buyer_id: Option<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the cleanup category has drained every created-id list.
    pub fn is_drained(&self) -> bool {
        self.created_listing_ids.is_empty()
            && self.created_request_ids.is_empty()
            && self.created_agreement_ids.is_empty()
    }
}
