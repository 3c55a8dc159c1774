//! Label enumerations.
//!
//! Several endpoints only accept server-internal integer IDs for values that
//! humans know by name (push targets, workflow rules, solutions, EXD org
//! groups). A [`LabelResolver`] maps names to IDs using a [`LabelSource`]:
//! either an HTML page that has to be scraped, a JSON API listing, or a
//! fixed table. The table is fetched once and cached for the resolver's
//! lifetime.

mod resolver;
mod sources;
mod table;

pub use resolver::LabelResolver;
pub use sources::{
    ApiListSource, LabelSource, PushTargetPage, StaticSource, WorkflowRulesPage,
    PUSH_TARGET_DESCRIPTIONS,
};
pub use table::LabelTable;

use crate::client::ErrataClient;
use crate::config::{LabelSourceKind, LabelsConfig};

/// Default solutions. The product form only accepts these IDs.
pub const DEFAULT_SOLUTIONS: &[(&str, i64)] = &[("DEFAULT", 1), ("ENTERPRISE", 2), ("RHN_TOOLS", 3)];

/// EXD org groups, as listed by `api/v1/exd_org_groups`.
pub const EXD_ORG_GROUPS: &[(&str, i64)] = &[
    ("RHEL", 1),
    ("Cloud", 2),
    ("Middleware & Management", 3),
    ("Pipeline Value", 4),
];

/// The resolvers one reconciliation run needs.
#[derive(Debug)]
pub struct Resolvers {
    /// Push target name → ID.
    pub push_targets: LabelResolver,
    /// Workflow rule set name → ID.
    pub workflow_rules: LabelResolver,
}

impl Resolvers {
    /// Builds resolvers with the sources selected in the manifest.
    #[must_use]
    pub fn from_config(client: &ErrataClient, config: &LabelsConfig) -> Self {
        let push_targets: Box<dyn LabelSource> = match config.push_targets {
            LabelSourceKind::Scrape => Box::new(PushTargetPage::new()),
            LabelSourceKind::Api => Box::new(ApiListSource::new(
                "push target",
                config.push_targets_endpoint.clone(),
            )),
        };
        let workflow_rules: Box<dyn LabelSource> = match config.workflow_rules {
            LabelSourceKind::Scrape => Box::new(WorkflowRulesPage::new()),
            LabelSourceKind::Api => Box::new(ApiListSource::new(
                "workflow rule",
                config.workflow_rules_endpoint.clone(),
            )),
        };

        Self {
            push_targets: LabelResolver::new(client.clone(), push_targets),
            workflow_rules: LabelResolver::new(client.clone(), workflow_rules),
        }
    }
}

/// Resolver for the fixed default-solution enumeration.
#[must_use]
pub fn default_solutions(client: &ErrataClient) -> LabelResolver {
    LabelResolver::new(
        client.clone(),
        Box::new(StaticSource::new("default solution", DEFAULT_SOLUTIONS)),
    )
}

/// Resolver for the fixed EXD org group enumeration.
#[must_use]
pub fn exd_org_groups(client: &ErrataClient) -> LabelResolver {
    LabelResolver::new(
        client.clone(),
        Box::new(StaticSource::new("EXD org group", EXD_ORG_GROUPS)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_solutions() {
        let client = ErrataClient::anonymous("http://127.0.0.1:9").expect("client");
        let resolver = default_solutions(&client);
        assert_eq!(resolver.resolve("DEFAULT").await.expect("resolve"), 1);
        assert_eq!(resolver.resolve("ENTERPRISE").await.expect("resolve"), 2);
        assert_eq!(resolver.resolve("RHN_TOOLS").await.expect("resolve"), 3);
    }

    #[tokio::test]
    async fn test_exd_org_groups() {
        let client = ErrataClient::anonymous("http://127.0.0.1:9").expect("client");
        let resolver = exd_org_groups(&client);
        assert_eq!(
            resolver.resolve("Middleware & Management").await.expect("resolve"),
            3
        );
        assert!(resolver.resolve("Nope").await.is_err());
    }
}
