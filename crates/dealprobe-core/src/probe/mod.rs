use crate::cancel::CancelToken;
use crate::model::ChatEnvelope;
use async_trait::async_trait;
use tokio::time::Duration;

pub mod fake;
pub mod http;
pub mod sse;

/// Collections the admin console owns. Probes address these through
/// `Collection::Known` so a typo cannot silently hit a stranger's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownCollection {
    Listings,
    Buyers,
    Contacts,
    ConnectionRequests,
    FirmAgreements,
    ListingDocuments,
    ChatConversations,
}

impl KnownCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownCollection::Listings => "listings",
            KnownCollection::Buyers => "buyers",
            KnownCollection::Contacts => "contacts",
            KnownCollection::ConnectionRequests => "connection_requests",
            KnownCollection::FirmAgreements => "firm_agreements",
            KnownCollection::ListingDocuments => "listing_documents",
            KnownCollection::ChatConversations => "chat_conversations",
        }
    }

    pub fn all() -> &'static [KnownCollection] {
        &[
            KnownCollection::Listings,
            KnownCollection::Buyers,
            KnownCollection::Contacts,
            KnownCollection::ConnectionRequests,
            KnownCollection::FirmAgreements,
            KnownCollection::ListingDocuments,
            KnownCollection::ChatConversations,
        ]
    }
}

/// Collection address: either part of the known schema or an explicitly
/// arbitrary name. The caller picks which, there is no unchecked escape
/// hatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    Known(KnownCollection),
    Named(String),
}

impl Collection {
    pub fn name(&self) -> &str {
        match self {
            Collection::Known(k) => k.as_str(),
            Collection::Named(n) => n.as_str(),
        }
    }
}

impl From<KnownCollection> for Collection {
    fn from(k: KnownCollection) -> Self {
        Collection::Known(k)
    }
}

/// Equality filter applied to a collection read.
pub type Filter<'a> = (&'a str, &'a str);

/// One authenticated call against the system under test.
///
/// Transport failures are normalized into messages carrying the documented
/// network markers; structured application failures carry the backend's own
/// error text so the classifier can key off it.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Minimal read against a collection. The failure message always names
    /// the collection and includes the backend error text.
    async fn read_collection(
        &self,
        collection: &Collection,
        columns: &str,
        filters: &[Filter<'_>],
        limit: u32,
    ) -> anyhow::Result<Vec<serde_json::Value>>;

    /// Inserts one record, returning the created row.
    async fn insert_record(
        &self,
        collection: &Collection,
        row: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Patches the record with the given id, returning the updated row.
    async fn update_record(
        &self,
        collection: &Collection,
        id: &str,
        patch: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Deletes the record with the given id.
    async fn delete_record(&self, collection: &Collection, id: &str) -> anyhow::Result<()>;

    /// Invokes a named remote procedure. An "does not exist" error means the
    /// procedure is unknown to the backend; any other error is evidence it
    /// exists and executed.
    async fn call_procedure(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Invokes a named edge function over HTTP with a JSON body.
    async fn invoke_function(
        &self,
        name: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Opens the streaming chat endpoint and consumes it into an envelope.
    /// Pre-stream failures (transport, non-2xx) are returned as errors; once
    /// streaming has begun, timeout, cancellation, and stream interruption
    /// finalize the partial envelope with its `error` field set.
    async fn chat(
        &self,
        query: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> anyhow::Result<ChatEnvelope>;
}
