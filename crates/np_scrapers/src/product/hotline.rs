use std::cmp::Ordering;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use np_core::config::{HttpConfig, ProductConfig};
use np_core::text::same_site;
use np_core::{Error, Product, ProductOffer, ProductRequest, Result, SortBy};

use crate::fanout::{BoundedFanOut, Stage, TaskOutcome};
use crate::fetcher::default_headers;

lazy_static! {
    static ref TOKEN_PATTERNS: Vec<Regex> = [
        r#""token"\s*:\s*"([A-Za-z0-9._\-]{16,})""#,
        r#"x-token["']?\s*[:=]\s*["']([A-Za-z0-9._\-]{16,})["']"#,
        r#"<meta[^>]+name=["']x-token["'][^>]+content=["']([^"']+)["']"#,
        r#"window\.__TOKEN__\s*=\s*["']([^"']+)["']"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
}

const LOCALE_PREFIXES: &[&str] = &["/ua/", "/uk/", "/ru/", "/en/"];
const PRODUCT_PAGE_TYPE: &str = "product-regular";

const URL_TYPE_QUERY: &str = r#"
query urlTypeDefiner($path: String!) {
  urlTypeDefiner(path: $path) {
    redirectTo
    state
    token
    type
    __typename
  }
}"#;

const OFFERS_QUERY: &str = r#"
query getOffers($path: String!, $cityId: Int!) {
  byPathQueryProduct(path: $path, cityId: $cityId) {
    id
    offers(first: 1000) {
      totalCount
      edges {
        node {
          _id
          condition
          conditionId
          conversionUrl
          descriptionFull
          descriptionShort
          firmTitle
          price
          __typename
        }
        __typename
      }
      __typename
    }
    __typename
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlTypeData {
    url_type_definer: Option<UrlType>,
}

#[derive(Debug, Deserialize)]
struct UrlType {
    token: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OffersData {
    by_path_query_product: Option<ProductNode>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    offers: Option<OfferConnection>,
}

#[derive(Debug, Deserialize)]
struct OfferConnection {
    #[serde(default)]
    edges: Vec<OfferEdge>,
}

#[derive(Debug, Deserialize)]
struct OfferEdge {
    node: OfferNode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferNode {
    condition: Option<String>,
    condition_id: Option<i64>,
    conversion_url: Option<String>,
    description_full: Option<String>,
    description_short: Option<String>,
    firm_title: Option<String>,
    price: Option<Value>,
}

/// An offer waiting for its redirect to be resolved.
#[derive(Debug, Clone, PartialEq)]
struct PendingOffer {
    redirect_url: String,
    title: String,
    shop: String,
    price: f64,
    is_used: bool,
}

/// Looks up shop offers for a hotline.ua product through the site's GraphQL
/// API and resolves each offer's outbound link to the merchant URL.
#[derive(Clone)]
pub struct HotlineClient {
    client: reqwest::Client,
    config: ProductConfig,
    redirect_timeout: Duration,
}

impl HotlineClient {
    pub fn new(config: &ProductConfig, http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(http)?)
            .redirect(Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
            redirect_timeout: http.redirect_timeout(),
        })
    }

    #[instrument(skip(self), fields(url = %request.url))]
    pub async fn parse_product(&self, request: &ProductRequest) -> Result<Product> {
        request.validate()?;
        if !same_site(&request.url, &self.config.base_url, true) {
            return Err(Error::Validation(format!(
                "{} is not a product page of {}",
                request.url, self.config.base_url
            )));
        }
        let path = extract_path(&request.url)
            .ok_or_else(|| Error::InvalidUrl(format!("cannot extract product path from {}", request.url)))?;
        let timeout = Duration::from_secs(request.timeout_secs);

        let token = match self.prime_token(&request.url, timeout).await {
            Some(token) => token,
            None => self.define_url(&path, timeout).await?,
        };
        debug!(path, "obtained session token");

        let nodes = self.fetch_offer_nodes(&path, &token, &request.url, timeout).await;
        let pending = build_pending_offers(nodes, &self.config.base_url);
        info!(offers = pending.len(), "🛒 resolving offer redirects");

        let mut offers = self.resolve_offers(pending).await;
        sort_offers(&mut offers, request.sort_by);
        offers.truncate(request.count_limit);

        info!(offers = offers.len(), "✅ product offers ready");
        Ok(Product::new(&request.url, offers))
    }

    /// Session token scraped from the product page itself.
    async fn prime_token(&self, url: &str, timeout: Duration) -> Option<String> {
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "product page refused priming request");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "product page priming failed");
                return None;
            }
        };
        let html = response.text().await.ok()?;
        find_token(&html)
    }

    /// Token from the URL-type lookup, which also tells product pages apart
    /// from categories and search pages.
    async fn define_url(&self, path: &str, timeout: Duration) -> Result<String> {
        let payload = json!({
            "operationName": "urlTypeDefiner",
            "variables": { "path": path },
            "query": URL_TYPE_QUERY,
        });
        let response = self
            .client
            .post(self.config.graphql_url())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .timeout(timeout)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Scraping(format!(
                "url type lookup returned status {}",
                response.status()
            )));
        }

        let body: GraphQlResponse<UrlTypeData> = response.json().await?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            return Err(Error::Scraping(format!("url type lookup failed: {:?}", errors)));
        }
        let definer = body
            .data
            .and_then(|d| d.url_type_definer)
            .ok_or_else(|| Error::Scraping(format!("no url type for path {}", path)))?;

        let kind = definer.kind.unwrap_or_default();
        if kind != PRODUCT_PAGE_TYPE {
            return Err(Error::Validation(format!(
                "{} is a '{}' page, not a product page",
                path, kind
            )));
        }
        definer
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Scraping("url type lookup returned no token".to_string()))
    }

    /// Offer nodes for a product. Remote errors mean "no offers".
    async fn fetch_offer_nodes(&self, path: &str, token: &str, referer: &str, timeout: Duration) -> Vec<OfferNode> {
        let product = path.trim_matches('/').rsplit('/').next().unwrap_or_default();
        let payload = json!({
            "operationName": "getOffers",
            "variables": { "path": product, "cityId": self.config.city_id },
            "query": OFFERS_QUERY,
        });
        let request_id = uuid::Uuid::new_v4().simple().to_string();

        let response = self
            .client
            .post(self.config.graphql_url())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header("x-token", token)
            .header("x-language", "uk")
            .header("x-referer", referer)
            .header("x-request-id", request_id)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "offer query refused");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "offer query failed");
                return Vec::new();
            }
        };

        match response.json::<GraphQlResponse<OffersData>>().await {
            Ok(body) => {
                if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
                    warn!(?errors, "offer query returned errors");
                    return Vec::new();
                }
                body.data
                    .and_then(|d| d.by_path_query_product)
                    .and_then(|p| p.offers)
                    .map(|o| o.edges.into_iter().map(|e| e.node).collect())
                    .unwrap_or_default()
            }
            Err(e) => {
                warn!(error = %e, "offer query returned malformed JSON");
                Vec::new()
            }
        }
    }

    async fn resolve_offers(&self, pending: Vec<PendingOffer>) -> Vec<ProductOffer> {
        let fan = BoundedFanOut::new(self.config.redirect_concurrency);
        let client = self.client.clone();
        let go_prefix = format!("{}/go/", self.config.base_url.trim_end_matches('/'));
        let timeout = self.redirect_timeout;
        let urls: Vec<String> = pending.iter().map(|o| o.redirect_url.clone()).collect();

        let resolved = fan
            .run(urls, |url: &String| (Stage::Redirect, url.clone()), move |url: String| {
                let client = client.clone();
                let go_prefix = go_prefix.clone();
                async move { Ok(resolve_redirect(&client, &url, &go_prefix, timeout).await) }
            })
            .await;

        pending
            .into_iter()
            .zip(resolved)
            .map(|(offer, outcome)| {
                let original = match outcome {
                    TaskOutcome::Done(url) => url,
                    TaskOutcome::Fault(_) => offer.redirect_url.clone(),
                };
                ProductOffer::new(offer.redirect_url, original, offer.title, offer.shop, offer.price, offer.is_used)
            })
            .collect()
    }
}

/// Merchant URL behind a redirector link, without query or fragment. Falls
/// back to the link itself when it cannot be followed.
async fn resolve_redirect(client: &reqwest::Client, url: &str, go_prefix: &str, timeout: Duration) -> String {
    if !url.starts_with(go_prefix) {
        return url.to_string();
    }
    let progressed = |final_url: &Url| {
        let final_url = final_url.as_str();
        final_url != url && !final_url.starts_with(go_prefix)
    };

    match client.head(url).timeout(timeout).send().await {
        Ok(response) if progressed(response.url()) => return strip_query(response.url()),
        Ok(_) => {}
        Err(e) => debug!(url, error = %e, "HEAD redirect failed, retrying with GET"),
    }
    match client.get(url).timeout(timeout).send().await {
        Ok(response) if progressed(response.url()) => strip_query(response.url()),
        Ok(_) => url.to_string(),
        Err(e) => {
            debug!(url, error = %e, "redirect could not be resolved");
            url.to_string()
        }
    }
}

fn strip_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// Product path without locale prefix, e.g. `/mobile-apple-iphone-15/`.
pub fn extract_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut path = parsed.path().to_string();
    if let Some(prefix) = LOCALE_PREFIXES.iter().find(|p| path.starts_with(*p)) {
        path = path[prefix.len() - 1..].to_string();
    }
    (path.len() > 1).then_some(path)
}

pub fn find_token(html: &str) -> Option<String> {
    TOKEN_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(html).map(|caps| caps[1].to_string()))
}

/// Numbers pass through; strings keep digits and separators, so
/// `"1 299,50 грн"` becomes `1299.5`. Anything else is zero.
pub fn parse_price(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let kept: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',').collect();
            let normalized = if kept.contains('.') && kept.contains(',') {
                kept.replace(',', "")
            } else {
                kept.replace(',', ".")
            };
            normalized.parse().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

fn is_used(condition_id: Option<i64>, condition: Option<&str>) -> bool {
    let is_new = condition_id == Some(0)
        || condition
            .map(|c| matches!(c.trim().to_lowercase().as_str(), "новий" | "новый" | "new"))
            .unwrap_or(false);
    !is_new
}

fn build_pending_offers(nodes: Vec<OfferNode>, base_url: &str) -> Vec<PendingOffer> {
    let base = base_url.trim_end_matches('/');
    nodes
        .into_iter()
        .filter_map(|node| {
            let price = node.price.as_ref().map(parse_price).unwrap_or(0.0);
            if price <= 0.0 {
                return None;
            }
            let conversion = node.conversion_url.filter(|c| !c.is_empty())?;
            let redirect_url = if conversion.starts_with("http") {
                conversion
            } else {
                format!("{}{}", base, conversion)
            };
            let shop = node
                .firm_title
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Невідомий магазин".to_string());
            let title = node
                .description_short
                .filter(|s| !s.trim().is_empty())
                .or(node.description_full.filter(|s| !s.trim().is_empty()))
                .unwrap_or_else(|| format!("Товар від {}", shop));
            Some(PendingOffer {
                redirect_url,
                title,
                is_used: is_used(node.condition_id, node.condition.as_deref()),
                shop,
                price,
            })
        })
        .collect()
}

pub fn sort_offers(offers: &mut [ProductOffer], sort_by: SortBy) {
    let by_shop = |a: &ProductOffer, b: &ProductOffer| a.shop.to_lowercase().cmp(&b.shop.to_lowercase());
    match sort_by {
        SortBy::Price => offers.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortBy::PriceDesc => offers.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortBy::Shop => offers.sort_by(by_shop),
        SortBy::ShopDesc => offers.sort_by(|a, b| match by_shop(a, b) {
            Ordering::Less => Ordering::Greater,
            Ordering::Greater => Ordering::Less,
            Ordering::Equal => Ordering::Equal,
        }),
    }
}
