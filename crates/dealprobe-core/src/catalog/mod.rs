use crate::context::RunContext;
use crate::probe::Probe;
use std::future::Future;
use std::pin::Pin;

pub mod checks;
pub mod scenarios;

pub type CheckFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// One declarative check: a setup/body/cleanup unit of work over the shared
/// run context. Identity is the `category` + `name` pair, unique within a
/// catalog. Constructed once at catalog-build time and invoked zero or many
/// times.
pub struct CheckDefinition {
    pub category: String,
    pub name: String,
    body: Box<dyn for<'a> Fn(&'a dyn Probe, &'a mut RunContext) -> CheckFuture<'a> + Send + Sync>,
}

impl CheckDefinition {
    pub fn new<F>(category: &str, name: &str, body: F) -> Self
    where
        F: for<'a> Fn(&'a dyn Probe, &'a mut RunContext) -> CheckFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            body: Box::new(body),
        }
    }

    pub async fn run(&self, probe: &dyn Probe, ctx: &mut RunContext) -> anyhow::Result<()> {
        (self.body)(probe, ctx).await
    }
}
