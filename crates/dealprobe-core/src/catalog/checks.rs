//! The check catalog: every database, RPC, edge-function, and integrity
//! check the admin console runs against the live backend.
//!
//! Catalog order is execution order. Lifecycle checks inside one category
//! hand ids to each other through the `RunContext` and fail loudly when a
//! prerequisite did not run. Cleanup checks are ordinary entries at the end
//! of the catalog, so a filtered run can leave residual test data behind.

use super::CheckDefinition;
use crate::context::RunContext;
use crate::probe::{Collection, KnownCollection, Probe};

const TEST_MARKER_TITLE: &str = "QA Probe Listing";

/// Builds the full ordered catalog.
pub fn build_catalog() -> Vec<CheckDefinition> {
    let mut checks = Vec::new();

    // -- schema ------------------------------------------------------------
    for kc in KnownCollection::all() {
        let kc = *kc;
        checks.push(CheckDefinition::new(
            "schema",
            &format!("{} readable", kc.as_str()),
            move |p, c| Box::pin(schema_read(p, c, kc)),
        ));
    }

    // -- listings lifecycle ------------------------------------------------
    checks.push(CheckDefinition::new(
        "listings lifecycle",
        "create test listing",
        |p, c| Box::pin(create_listing(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "listings lifecycle",
        "read back created listing",
        |p, c| Box::pin(read_back_listing(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "listings lifecycle",
        "update listing title",
        |p, c| Box::pin(update_listing_title(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "listings lifecycle",
        "archive listing",
        |p, c| Box::pin(archive_listing(p, c)),
    ));

    // -- connection requests -----------------------------------------------
    checks.push(CheckDefinition::new(
        "connection requests",
        "discover sample buyer",
        |p, c| Box::pin(discover_sample_buyer(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "connection requests",
        "create connection request",
        |p, c| Box::pin(create_connection_request(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "connection requests",
        "approve connection request",
        |p, c| Box::pin(set_request_status(p, c, "approved")),
    ));
    checks.push(CheckDefinition::new(
        "connection requests",
        "reject connection request",
        |p, c| Box::pin(set_request_status(p, c, "rejected")),
    ));

    // -- firm agreements ---------------------------------------------------
    checks.push(CheckDefinition::new(
        "firm agreements",
        "create firm agreement",
        |p, c| Box::pin(create_agreement(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "firm agreements",
        "send agreement to buyer",
        |p, c| Box::pin(set_agreement_status(p, c, "sent")),
    ));
    checks.push(CheckDefinition::new(
        "firm agreements",
        "countersign agreement",
        |p, c| Box::pin(countersign_agreement(p, c)),
    ));

    // -- integration -------------------------------------------------------
    checks.push(CheckDefinition::new(
        "integration",
        "rpc match_buyers_for_listing reachable",
        |p, c| Box::pin(rpc_reachable(p, c, "match_buyers_for_listing")),
    ));
    checks.push(CheckDefinition::new(
        "integration",
        "rpc dashboard_metrics reachable",
        |p, c| Box::pin(rpc_reachable(p, c, "dashboard_metrics")),
    ));
    checks.push(CheckDefinition::new(
        "integration",
        "edge function command-center deployed",
        |p, c| Box::pin(function_deployed(p, c, "command-center")),
    ));
    checks.push(CheckDefinition::new(
        "integration",
        "edge function send-notification deployed",
        |p, c| Box::pin(function_deployed(p, c, "send-notification")),
    ));

    // -- data integrity ----------------------------------------------------
    checks.push(CheckDefinition::new(
        "data integrity",
        "no orphaned connection requests",
        |p, c| Box::pin(no_orphaned_requests(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "data integrity",
        "no duplicate contact emails",
        |p, c| Box::pin(no_duplicate_contact_emails(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "data integrity",
        "listings carry required fields",
        |p, c| Box::pin(listings_required_fields(p, c)),
    ));

    // -- cleanup -----------------------------------------------------------
    checks.push(CheckDefinition::new(
        "cleanup",
        "remove test connection requests",
        |p, c| Box::pin(cleanup_requests(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "cleanup",
        "remove test firm agreements",
        |p, c| Box::pin(cleanup_agreements(p, c)),
    ));
    checks.push(CheckDefinition::new(
        "cleanup",
        "remove test listings",
        |p, c| Box::pin(cleanup_listings(p, c)),
    ));

    checks
}

async fn schema_read(
    probe: &dyn Probe,
    _ctx: &mut RunContext,
    collection: KnownCollection,
) -> anyhow::Result<()> {
    probe
        .read_collection(&collection.into(), "id", &[], 1)
        .await?;
    Ok(())
}

async fn create_listing(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let row = probe
        .insert_record(
            &KnownCollection::Listings.into(),
            serde_json::json!({
                "title": TEST_MARKER_TITLE,
                "status": "draft",
                "industry": "hvac",
                "asking_price": 125000,
                "is_test": true,
            }),
        )
        .await?;
    let id = row
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("insert into listings returned no id: {}", row))?
        .to_string();
    ctx.created_listing_ids.push(id.clone());
    ctx.listing_id = Some(id);
    Ok(())
}

async fn read_back_listing(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let id = require_listing(ctx)?;
    let rows = probe
        .read_collection(
            &KnownCollection::Listings.into(),
            "id,title,status",
            &[("id", &id)],
            1,
        )
        .await?;
    if rows.is_empty() {
        anyhow::bail!("created listing {} not found on read-back", id);
    }
    Ok(())
}

async fn update_listing_title(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let id = require_listing(ctx)?;
    let updated_title = format!("{} (updated)", TEST_MARKER_TITLE);
    let row = probe
        .update_record(
            &KnownCollection::Listings.into(),
            &id,
            serde_json::json!({ "title": updated_title }),
        )
        .await?;
    let title = row.get("title").and_then(|v| v.as_str()).unwrap_or_default();
    if title != updated_title {
        anyhow::bail!(
            "listing {} title not updated: expected {:?}, got {:?}",
            id,
            updated_title,
            title
        );
    }
    Ok(())
}

async fn archive_listing(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let id = require_listing(ctx)?;
    probe
        .update_record(
            &KnownCollection::Listings.into(),
            &id,
            serde_json::json!({ "status": "archived" }),
        )
        .await?;
    let rows = probe
        .read_collection(
            &KnownCollection::Listings.into(),
            "id",
            &[("id", &id), ("status", "archived")],
            1,
        )
        .await?;
    if rows.is_empty() {
        anyhow::bail!("listing {} did not surface under the archived filter", id);
    }
    Ok(())
}

async fn discover_sample_buyer(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let rows = probe
        .read_collection(&KnownCollection::Buyers.into(), "id", &[], 1)
        .await?;
    let Some(id) = rows
        .first()
        .and_then(|r| r.get("id"))
        .and_then(|v| v.as_str())
    else {
        // Downgraded to a warning by the classifier: sparse seed data, not a
        // defect.
        anyhow::bail!("No test buyer available in this environment");
    };
    ctx.sample_buyer_id = Some(id.to_string());
    Ok(())
}

async fn create_connection_request(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let listing_id = require_listing(ctx)?;
    let buyer_id = ctx
        .sample_buyer_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("connection requests: discover sample buyer did not run"))?;
    let row = probe
        .insert_record(
            &KnownCollection::ConnectionRequests.into(),
            serde_json::json!({
                "listing_id": listing_id,
                "buyer_id": buyer_id,
                "status": "pending",
                "message": "QA probe connection request",
            }),
        )
        .await?;
    let id = row
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("insert into connection_requests returned no id"))?
        .to_string();
    ctx.created_request_ids.push(id.clone());
    ctx.request_id = Some(id);
    Ok(())
}

async fn set_request_status(
    probe: &dyn Probe,
    ctx: &mut RunContext,
    status: &str,
) -> anyhow::Result<()> {
    let id = ctx
        .request_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("connection requests: create did not run"))?;
    let row = probe
        .update_record(
            &KnownCollection::ConnectionRequests.into(),
            &id,
            serde_json::json!({ "status": status }),
        )
        .await?;
    let actual = row.get("status").and_then(|v| v.as_str()).unwrap_or_default();
    if actual != status {
        anyhow::bail!(
            "connection request {}: expected status {:?}, got {:?}",
            id,
            status,
            actual
        );
    }
    Ok(())
}

async fn create_agreement(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let listing_id = require_listing(ctx)?;
    let buyer_id = ctx
        .sample_buyer_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("firm agreements: discover sample buyer did not run"))?;
    let row = probe
        .insert_record(
            &KnownCollection::FirmAgreements.into(),
            serde_json::json!({
                "listing_id": listing_id,
                "buyer_id": buyer_id,
                "status": "draft",
            }),
        )
        .await?;
    let id = row
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("insert into firm_agreements returned no id"))?
        .to_string();
    ctx.created_agreement_ids.push(id.clone());
    ctx.agreement_id = Some(id);
    Ok(())
}

async fn set_agreement_status(
    probe: &dyn Probe,
    ctx: &mut RunContext,
    status: &str,
) -> anyhow::Result<()> {
    let id = require_agreement(ctx)?;
    let row = probe
        .update_record(
            &KnownCollection::FirmAgreements.into(),
            &id,
            serde_json::json!({ "status": status }),
        )
        .await?;
    let actual = row.get("status").and_then(|v| v.as_str()).unwrap_or_default();
    if actual != status {
        anyhow::bail!(
            "firm agreement {}: expected status {:?}, got {:?}",
            id,
            status,
            actual
        );
    }
    Ok(())
}

async fn countersign_agreement(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    let id = require_agreement(ctx)?;
    probe
        .update_record(
            &KnownCollection::FirmAgreements.into(),
            &id,
            serde_json::json!({
                "status": "executed",
                "executed_at": chrono::Utc::now().to_rfc3339(),
            }),
        )
        .await?;
    Ok(())
}

/// A "not implemented" error means the procedure is unknown to the backend
/// and fails the check; any other error proves the procedure exists and
/// executed, which is all a reachability probe asks.
async fn rpc_reachable(
    probe: &dyn Probe,
    _ctx: &mut RunContext,
    name: &str,
) -> anyhow::Result<()> {
    match probe
        .call_procedure(name, serde_json::json!({ "probe": true }))
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string();
            if msg.to_lowercase().contains("does not exist") {
                Err(e)
            } else {
                tracing::debug!(rpc = name, error = %msg, "rpc exists but raised");
                Ok(())
            }
        }
    }
}

/// A structured 4xx/5xx body proves the function is deployed and executing;
/// only transport-level failure is fatal here.
async fn function_deployed(
    probe: &dyn Probe,
    _ctx: &mut RunContext,
    name: &str,
) -> anyhow::Result<()> {
    match probe
        .invoke_function(name, serde_json::json!({ "ping": true }))
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            if crate::classify::is_network_error(&e.to_string()) {
                Err(e)
            } else {
                tracing::debug!(function = name, error = %e, "function deployed, returned app error");
                Ok(())
            }
        }
    }
}

async fn no_orphaned_requests(probe: &dyn Probe, _ctx: &mut RunContext) -> anyhow::Result<()> {
    let requests = probe
        .read_collection(
            &KnownCollection::ConnectionRequests.into(),
            "id,listing_id",
            &[],
            200,
        )
        .await?;
    let listings = probe
        .read_collection(&KnownCollection::Listings.into(), "id", &[], 1000)
        .await?;
    let listing_ids: std::collections::HashSet<&str> = listings
        .iter()
        .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
        .collect();
    let orphans: Vec<&str> = requests
        .iter()
        .filter(|r| {
            r.get("listing_id")
                .and_then(|v| v.as_str())
                .map(|lid| !listing_ids.contains(lid))
                .unwrap_or(false)
        })
        .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
        .collect();
    if !orphans.is_empty() {
        anyhow::bail!(
            "{} connection request(s) reference missing listings: {:?}",
            orphans.len(),
            orphans
        );
    }
    Ok(())
}

async fn no_duplicate_contact_emails(
    probe: &dyn Probe,
    _ctx: &mut RunContext,
) -> anyhow::Result<()> {
    let contacts = probe
        .read_collection(&KnownCollection::Contacts.into(), "id,email", &[], 500)
        .await?;
    if contacts.is_empty() {
        anyhow::bail!("contacts result set was empty");
    }
    let mut seen = std::collections::HashMap::new();
    let mut dupes = Vec::new();
    for row in &contacts {
        if let Some(email) = row.get("email").and_then(|v| v.as_str()) {
            let key = email.to_lowercase();
            if seen.insert(key.clone(), true).is_some() {
                dupes.push(key);
            }
        }
    }
    if !dupes.is_empty() {
        anyhow::bail!("duplicate contact emails: {:?}", dupes);
    }
    Ok(())
}

async fn listings_required_fields(probe: &dyn Probe, _ctx: &mut RunContext) -> anyhow::Result<()> {
    let listings = probe
        .read_collection(&KnownCollection::Listings.into(), "id,title,status", &[], 100)
        .await?;
    if listings.is_empty() {
        anyhow::bail!("listings result set was empty");
    }
    let bad: Vec<&str> = listings
        .iter()
        .filter(|r| {
            let title = r.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let status = r.get("status").and_then(|v| v.as_str()).unwrap_or("");
            title.trim().is_empty() || status.trim().is_empty()
        })
        .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
        .collect();
    if !bad.is_empty() {
        anyhow::bail!("listings missing title or status: {:?}", bad);
    }
    Ok(())
}

async fn cleanup_requests(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    drain(probe, &KnownCollection::ConnectionRequests.into(), &mut ctx.created_request_ids).await
}

async fn cleanup_agreements(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    drain(probe, &KnownCollection::FirmAgreements.into(), &mut ctx.created_agreement_ids).await
}

async fn cleanup_listings(probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
    drain(probe, &KnownCollection::Listings.into(), &mut ctx.created_listing_ids).await
}

/// Compensating delete of every id the run created, in creation order. Ids
/// are drained even when a delete fails so a re-run does not double-delete.
async fn drain(
    probe: &dyn Probe,
    collection: &Collection,
    ids: &mut Vec<String>,
) -> anyhow::Result<()> {
    let mut first_err = None;
    for id in ids.drain(..) {
        if let Err(e) = probe.delete_record(collection, &id).await {
            tracing::warn!(collection = collection.name(), id = %id, error = %e, "cleanup delete failed");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn require_listing(ctx: &RunContext) -> anyhow::Result<String> {
    ctx.listing_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("listings lifecycle: create test listing did not run"))
}

fn require_agreement(ctx: &RunContext) -> anyhow::Result<String> {
    ctx.agreement_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("firm agreements: create firm agreement did not run"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_keys_are_unique() {
        let catalog = build_catalog();
        let mut seen = std::collections::HashSet::new();
        for check in &catalog {
            assert!(
                seen.insert((check.category.clone(), check.name.clone())),
                "duplicate catalog key: {}/{}",
                check.category,
                check.name
            );
        }
    }

    #[test]
    fn test_cleanup_is_last_category() {
        let catalog = build_catalog();
        let last = &catalog[catalog.len() - 3..];
        assert!(last.iter().all(|c| c.category == "cleanup"));
    }

    #[tokio::test]
    async fn test_lifecycle_fails_loudly_without_prerequisite() {
        let probe = crate::probe::fake::FakeProbe::new();
        let mut ctx = RunContext::new();
        let err = read_back_listing(&probe, &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("did not run"));
    }

    #[tokio::test]
    async fn test_full_lifecycle_against_fake_backend() -> anyhow::Result<()> {
        let probe = crate::probe::fake::FakeProbe::new();
        probe.seed_rows("buyers", vec![serde_json::json!({"id": "buyer-1"})]);
        let mut ctx = RunContext::new();

        create_listing(&probe, &mut ctx).await?;
        read_back_listing(&probe, &mut ctx).await?;
        update_listing_title(&probe, &mut ctx).await?;
        archive_listing(&probe, &mut ctx).await?;
        discover_sample_buyer(&probe, &mut ctx).await?;
        create_connection_request(&probe, &mut ctx).await?;
        set_request_status(&probe, &mut ctx, "approved").await?;
        create_agreement(&probe, &mut ctx).await?;
        countersign_agreement(&probe, &mut ctx).await?;

        cleanup_requests(&probe, &mut ctx).await?;
        cleanup_agreements(&probe, &mut ctx).await?;
        cleanup_listings(&probe, &mut ctx).await?;
        assert!(ctx.is_drained());
        Ok(())
    }

    #[tokio::test]
    async fn test_rpc_reachable_treats_raised_as_exists() -> anyhow::Result<()> {
        let probe = crate::probe::fake::FakeProbe::new();
        probe.fail_procedure("dashboard_metrics", "invalid argument: probe");
        let mut ctx = RunContext::new();
        rpc_reachable(&probe, &mut ctx, "dashboard_metrics").await?;

        probe.fail_procedure("missing_proc", "function missing_proc does not exist");
        assert!(rpc_reachable(&probe, &mut ctx, "missing_proc").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_function_probe_distinguishes_network_from_app_error() -> anyhow::Result<()> {
        let probe = crate::probe::fake::FakeProbe::new();
        let mut ctx = RunContext::new();

        probe.fail_function("command-center", "HTTP 500: {\"error\":\"boom\"}");
        function_deployed(&probe, &mut ctx, "command-center").await?;

        probe.fail_function("send-notification", "NetworkError: Failed to fetch");
        assert!(function_deployed(&probe, &mut ctx, "send-notification")
            .await
            .is_err());
        Ok(())
    }
}
