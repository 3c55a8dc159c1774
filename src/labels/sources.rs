//! Where label tables come from.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::client::ErrataClient;
use crate::error::{ErrataError, ParseError, Result};

use super::table::LabelTable;

/// Human descriptions on the product form, mapped to push target names.
///
/// The server renders each checkbox as "{description} (Pub Target: ...)".
pub const PUSH_TARGET_DESCRIPTIONS: &[(&str, &str)] = &[
    ("Push to RHN Live", "rhn_live"),
    ("Push to RHN Stage", "rhn_stage"),
    ("Push to CDN Live", "cdn"),
    ("Push to CDN Stage", "cdn_stage"),
    ("Push docker images to CDN", "cdn_docker"),
    ("Push docker images to CDN docker stage", "cdn_docker_stage"),
    ("Push docker images to CDN Docker stage", "cdn_docker_stage"),
    ("Push to public FTP server", "ftp"),
    ("Push sources to CentOS git", "altsrc"),
    ("Push to HSS Internal validation", "hss_validate"),
    ("Push to HSS Internal production", "hss_prod"),
];

/// A source of label → ID mappings.
#[async_trait]
pub trait LabelSource: Send + Sync {
    /// Enumeration name, used in logs and errors.
    fn enumeration(&self) -> &str;

    /// Fetches and parses the full table.
    async fn load(&self, client: &ErrataClient) -> Result<LabelTable>;
}

/// Scrapes push target IDs from the "new product" form.
#[derive(Debug, Clone)]
pub struct PushTargetPage {
    page: String,
}

impl PushTargetPage {
    /// Page path on the server.
    pub const PAGE: &'static str = "products/new";

    /// Creates a scraper for the default page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            page: Self::PAGE.to_string(),
        }
    }

    /// Parses the form HTML into a table.
    ///
    /// # Errors
    ///
    /// Fails if a checkbox has no numeric value, its label text does not
    /// contain a known description, or the page has no checkboxes at all.
    pub fn parse(&self, html: &str) -> Result<LabelTable> {
        let document = Html::parse_document(html);
        let inputs = selector(&self.page, r#"input[name="product[push_targets][]"]"#)?;
        let pattern = Regex::new(r"(Push .+) \(Pub Target:")
            .map_err(|e| ErrataError::internal(e.to_string()))?;

        let mut entries = Vec::new();
        for input in document.select(&inputs) {
            let id = input
                .value()
                .attr("value")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .ok_or_else(|| ParseError::html(&self.page, "push target input has no numeric value"))?;

            let text = input
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| collapse_whitespace(parent.text()))
                .unwrap_or_default();

            let description = pattern
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| {
                    ParseError::html(&self.page, format!("did not find target description in {text}"))
                })?;

            let name = PUSH_TARGET_DESCRIPTIONS
                .iter()
                .find(|(d, _)| *d == description)
                .map(|(_, name)| *name)
                .ok_or(ParseError::UnknownDescription { description })?;

            entries.push((name, id));
        }

        non_empty(LabelTable::new("push target", entries), &self.page)
    }
}

impl Default for PushTargetPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LabelSource for PushTargetPage {
    fn enumeration(&self) -> &str {
        "push target"
    }

    async fn load(&self, client: &ErrataClient) -> Result<LabelTable> {
        let response = client.get(&self.page).await?.error_for_status()?;
        self.parse(&response.text)
    }
}

/// Scrapes workflow rule set IDs from the workflow rules index.
#[derive(Debug, Clone)]
pub struct WorkflowRulesPage {
    page: String,
}

impl WorkflowRulesPage {
    /// Page path on the server.
    pub const PAGE: &'static str = "workflow_rules";

    /// Creates a scraper for the default page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            page: Self::PAGE.to_string(),
        }
    }

    /// Parses the index HTML into a table.
    ///
    /// # Errors
    ///
    /// Fails if a row id has no trailing number, a row has no cells, or the
    /// page has no rows at all.
    pub fn parse(&self, html: &str) -> Result<LabelTable> {
        let document = Html::parse_document(html);
        let rows = selector(&self.page, r#"tr[id^="state_machine_rule_set_"]"#)?;
        let cell = selector(&self.page, "td")?;

        let mut entries = Vec::new();
        for row in document.select(&rows) {
            let html_id = row.value().id().unwrap_or_default();
            let digits: String = {
                let trailing: Vec<char> = html_id
                    .chars()
                    .rev()
                    .take_while(char::is_ascii_digit)
                    .collect();
                trailing.into_iter().rev().collect()
            };
            let id = digits.parse::<i64>().map_err(|_| {
                ParseError::html(&self.page, format!("could not find ID number in {html_id}"))
            })?;

            let name = row
                .select(&cell)
                .next()
                .map(|td| td.text().collect::<String>().trim().to_string())
                .ok_or_else(|| ParseError::html(&self.page, format!("row {html_id} has no cells")))?;

            entries.push((name, id));
        }

        non_empty(LabelTable::new("workflow rule", entries), &self.page)
    }
}

impl Default for WorkflowRulesPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LabelSource for WorkflowRulesPage {
    fn enumeration(&self) -> &str {
        "workflow rule"
    }

    async fn load(&self, client: &ErrataClient) -> Result<LabelTable> {
        let response = client.get(&self.page).await?.error_for_status()?;
        self.parse(&response.text)
    }
}

/// Reads a JSON:API listing where each entry has `id` and `attributes.name`.
#[derive(Debug, Clone)]
pub struct ApiListSource {
    enumeration: String,
    endpoint: String,
}

impl ApiListSource {
    /// Creates a source for an enumeration endpoint.
    #[must_use]
    pub fn new(enumeration: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            enumeration: enumeration.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl LabelSource for ApiListSource {
    fn enumeration(&self) -> &str {
        &self.enumeration
    }

    async fn load(&self, client: &ErrataClient) -> Result<LabelTable> {
        let body: Value = client.get(&self.endpoint).await?.error_for_status()?.json()?;
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::html(&self.endpoint, "no 'data' array"))?;

        let entries = data
            .iter()
            .map(|item| {
                let id = item.get("id").and_then(Value::as_i64);
                let name = item.pointer("/attributes/name").and_then(Value::as_str);
                match (id, name) {
                    (Some(id), Some(name)) => Ok((name.to_string(), id)),
                    _ => Err(ParseError::html(
                        &self.endpoint,
                        format!("malformed entry {item}"),
                    )),
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        non_empty(LabelTable::new(self.enumeration.clone(), entries), &self.endpoint)
    }
}

/// A fixed table compiled into the binary.
#[derive(Debug, Clone)]
pub struct StaticSource {
    enumeration: &'static str,
    entries: &'static [(&'static str, i64)],
}

impl StaticSource {
    /// Wraps a static table.
    #[must_use]
    pub const fn new(enumeration: &'static str, entries: &'static [(&'static str, i64)]) -> Self {
        Self {
            enumeration,
            entries,
        }
    }
}

#[async_trait]
impl LabelSource for StaticSource {
    fn enumeration(&self) -> &str {
        self.enumeration
    }

    async fn load(&self, _client: &ErrataClient) -> Result<LabelTable> {
        Ok(LabelTable::new(self.enumeration, self.entries.iter().copied()))
    }
}

fn selector(page: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ParseError::html(page, format!("bad selector {css}: {e}")).into())
}

fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn non_empty(table: LabelTable, page: &str) -> Result<LabelTable> {
    if table.is_empty() {
        return Err(ParseError::EmptyTable {
            page: page.to_string(),
        }
        .into());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::labels::LabelResolver;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn push_target(id: i64, description: &str, target: &str) -> String {
        format!(
            r#"<div class="push_target">
                 <label>
                   <input type="checkbox" name="product[push_targets][]" value="{id}" />
                   {description} (Pub Target: {target})
                 </label>
               </div>"#
        )
    }

    fn product_form() -> String {
        let targets = [
            push_target(1, "Push to RHN Live", "live"),
            push_target(2, "Push to RHN Stage", "webqa"),
            push_target(3, "Push to public FTP server", "ftp"),
            push_target(4, "Push to CDN Live", "cdn"),
            push_target(5, "Push to CDN Stage", "cdn-stage"),
            push_target(6, "Push sources to CentOS git", "altsrc"),
            push_target(8, "Push docker images to CDN", "cdn-docker"),
            push_target(9, "Push docker images to CDN docker stage", "cdn-docker-stage"),
        ];
        format!(
            "<html><body><form action=\"/products\">{}</form></body></html>",
            targets.join("\n")
        )
    }

    fn workflow_rules_index() -> String {
        let rows = [
            (1, "Default"),
            (2, "Unrestricted"),
            (3, "CDN Push Only"),
            (4, "Covscan"),
            (7, "Non-blocking TPS"),
            (9, "Optional TPS DistQA"),
            (14, "Non-blocking rpmdiff for RHEL-8"),
            (15, "Ansible"),
            (17, "Non-blocking TPS &amp; Covscan"),
            (18, "Non-blocking Push target &amp; Covscan"),
        ];
        let body: String = rows
            .iter()
            .map(|(id, name)| {
                format!(
                    "<tr id=\"state_machine_rule_set_{id}\">\n  <td>\n    {name}\n  </td>\n  <td>Some description</td>\n</tr>\n"
                )
            })
            .collect();
        format!("<html><body><table><tbody>{body}</tbody></table></body></html>")
    }

    #[test]
    fn test_scrape_push_targets() {
        let table = PushTargetPage::new().parse(&product_form()).expect("parse");
        let expected = [
            ("rhn_live", 1),
            ("rhn_stage", 2),
            ("ftp", 3),
            ("cdn", 4),
            ("cdn_stage", 5),
            ("altsrc", 6),
            ("cdn_docker", 8),
            ("cdn_docker_stage", 9),
        ];
        assert_eq!(table.len(), expected.len());
        for (name, id) in expected {
            assert_eq!(table.get(name).expect(name), id);
        }
    }

    #[test]
    fn test_scrape_unknown_description() {
        let html = format!(
            "<html><body>{}</body></html>",
            push_target(42, "Push to the moon", "moon")
        );
        let err = PushTargetPage::new().parse(&html).expect_err("should fail");
        assert!(matches!(
            err,
            ErrataError::Parse(ParseError::UnknownDescription { ref description })
                if description == "Push to the moon"
        ));
    }

    #[test]
    fn test_scrape_empty_page() {
        let err = PushTargetPage::new()
            .parse("<html><body><p>Not logged in</p></body></html>")
            .expect_err("should fail");
        assert!(matches!(err, ErrataError::Parse(ParseError::EmptyTable { .. })));
    }

    #[test]
    fn test_scrape_workflow_rules() {
        let table = WorkflowRulesPage::new().parse(&workflow_rules_index()).expect("parse");
        let expected = [
            ("Default", 1),
            ("Unrestricted", 2),
            ("CDN Push Only", 3),
            ("Covscan", 4),
            ("Non-blocking TPS", 7),
            ("Optional TPS DistQA", 9),
            ("Non-blocking rpmdiff for RHEL-8", 14),
            ("Ansible", 15),
            ("Non-blocking TPS & Covscan", 17),
            ("Non-blocking Push target & Covscan", 18),
        ];
        assert_eq!(table.len(), expected.len());
        for (name, id) in expected {
            assert_eq!(table.get(name).expect(name), id);
        }
    }

    #[tokio::test]
    async fn test_resolver_fetches_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/workflow_rules"))
            .respond_with(ResponseTemplate::new(200).set_body_string(workflow_rules_index()))
            .expect(1)
            .mount(&server)
            .await;

        let client = ErrataClient::anonymous(&server.uri()).expect("client");
        let resolver = LabelResolver::new(client, Box::new(WorkflowRulesPage::new()));
        assert!(!resolver.is_resolved());

        assert_eq!(resolver.resolve("Ansible").await.expect("resolve"), 15);
        assert_eq!(
            resolver
                .resolve_many(&["Default", "Covscan"])
                .await
                .expect("resolve"),
            vec![1, 4]
        );
        assert!(resolver.is_resolved());

        let err = resolver.resolve("Nonexistent").await.expect_err("should fail");
        assert!(matches!(err, ErrataError::Lookup(LookupError::UnknownLabel { .. })));
    }

    #[tokio::test]
    async fn test_resolver_propagates_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/new"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = ErrataClient::anonymous(&server.uri()).expect("client");
        let resolver = LabelResolver::new(client, Box::new(PushTargetPage::new()));
        let err = resolver.resolve("cdn").await.expect_err("should fail");
        assert!(matches!(err, ErrataError::Transport(_)));
        assert!(!resolver.is_resolved());
    }

    #[tokio::test]
    async fn test_api_list_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/push_targets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": 4, "type": "push_targets", "attributes": {"name": "cdn"}},
                    {"id": 5, "type": "push_targets", "attributes": {"name": "cdn_stage"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ErrataClient::anonymous(&server.uri()).expect("client");
        let resolver = LabelResolver::new(
            client,
            Box::new(ApiListSource::new("push target", "api/v1/push_targets")),
        );
        assert_eq!(
            resolver.resolve_many(&["cdn_stage", "cdn"]).await.expect("resolve"),
            vec![5, 4]
        );
        assert_eq!(resolver.resolve("cdn").await.expect("resolve"), 4);
    }

    #[tokio::test]
    async fn test_api_list_source_rejects_malformed_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/push_targets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": 4, "type": "push_targets", "attributes": {"name": "cdn"}},
                    {"id": "5", "type": "push_targets", "attributes": {"name": "cdn_stage"}}
                ]
            })))
            .mount(&server)
            .await;

        let client = ErrataClient::anonymous(&server.uri()).expect("client");
        let source = ApiListSource::new("push target", "api/v1/push_targets");
        let err = source.load(&client).await.expect_err("malformed entry");
        assert!(matches!(
            err,
            ErrataError::Parse(ParseError::Html { ref page, .. }) if page == "api/v1/push_targets"
        ));
    }

    #[tokio::test]
    async fn test_api_list_source_without_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/push_targets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = ErrataClient::anonymous(&server.uri()).expect("client");
        let err = ApiListSource::new("push target", "api/v1/push_targets")
            .load(&client)
            .await
            .expect_err("no data");
        assert!(matches!(err, ErrataError::Parse(ParseError::Html { .. })));
    }
}
