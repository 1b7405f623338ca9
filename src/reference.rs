//! Reference material for prompts.
//!
//! Given the caller's infra tags we pick a topic, ask the docs service for a
//! short passage and append it to the generation prompt. Lookups are cached
//! for 30 minutes and always produce *something*: when the service is absent
//! or failing, a static paragraph for the topic is used instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::error::DocsError;
use crate::prompt::MAX_REFERENCE_CHARS;
use crate::util::{normalize_tags, trunc_for_log};

pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const DOCS_TIMEOUT: Duration = Duration::from_secs(2);

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Source of free-form documentation text.
#[async_trait]
pub trait DocsProvider: Send + Sync {
  /// `Ok(None)` when the service has nothing for the query.
  async fn fetch(&self, query: &str) -> Result<Option<String>, DocsError>;
}

/// `GET {endpoint}/v1/docs?query=...` returning `{"content": "..."}`.
pub struct HttpDocsProvider {
  client: reqwest::Client,
  endpoint: String,
}

impl HttpDocsProvider {
  pub fn new(endpoint: &str) -> Result<Self, DocsError> {
    let client = reqwest::Client::builder().timeout(DOCS_TIMEOUT).build()?;
    Ok(Self { client, endpoint: endpoint.trim_end_matches('/').to_string() })
  }
}

#[derive(Deserialize)]
struct DocsResponse {
  #[serde(default, alias = "documentation")]
  content: Option<String>,
}

#[async_trait]
impl DocsProvider for HttpDocsProvider {
  async fn fetch(&self, query: &str) -> Result<Option<String>, DocsError> {
    let url = format!("{}/v1/docs", self.endpoint);
    let res = self.client.get(&url).query(&[("query", query)]).send().await?;
    if !res.status().is_success() {
      return Err(DocsError::Status(res.status().as_u16()));
    }
    let body: DocsResponse = res.json().await?;
    Ok(body.content.filter(|c| !c.trim().is_empty()))
  }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceMetrics {
  pub cache_hits: u64,
  pub cache_misses: u64,
  pub provider_calls: u64,
  pub provider_failures: u64,
  pub fallback_used: u64,
  pub hit_rate: f64,
}

struct CachedDoc {
  content: String,
  stored_at: Instant,
}

pub struct ReferenceContext {
  provider: Option<Arc<dyn DocsProvider>>,
  ttl: Duration,
  cache: RwLock<HashMap<String, CachedDoc>>,
  cache_hits: AtomicU64,
  cache_misses: AtomicU64,
  provider_calls: AtomicU64,
  provider_failures: AtomicU64,
  fallback_used: AtomicU64,
}

impl ReferenceContext {
  /// Without a provider every lookup resolves to the static paragraphs.
  pub fn new(provider: Option<Arc<dyn DocsProvider>>) -> Self {
    Self {
      provider,
      ttl: CACHE_TTL,
      cache: RwLock::new(HashMap::new()),
      cache_hits: AtomicU64::new(0),
      cache_misses: AtomicU64::new(0),
      provider_calls: AtomicU64::new(0),
      provider_failures: AtomicU64::new(0),
      fallback_used: AtomicU64::new(0),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Reference passage for the topic the infra tags point at.
  pub async fn context_for(&self, infra: &[String]) -> String {
    self.fetch_context(topic_for(infra), infra).await
  }

  /// Bounded passage for `topic`; never fails.
  #[instrument(level = "debug", skip(self, infra))]
  pub async fn fetch_context(&self, topic: &str, infra: &[String]) -> String {
    let key = cache_key(topic, infra);
    if let Some(hit) = self.cached(&key).await {
      self.cache_hits.fetch_add(1, Ordering::Relaxed);
      debug!(target: "quiz", topic, "Reference cache hit");
      return hit;
    }
    self.cache_misses.fetch_add(1, Ordering::Relaxed);

    if let Some(provider) = &self.provider {
      self.provider_calls.fetch_add(1, Ordering::Relaxed);
      let query = build_query(topic, infra);
      match provider.fetch(&query).await {
        Ok(Some(raw)) => {
          let text = process_documentation(&raw);
          if !text.is_empty() {
            debug!(target: "quiz", topic, preview = %trunc_for_log(&text, 80), "Reference fetched");
            self.store(key, text.clone()).await;
            return text;
          }
        }
        Ok(None) => debug!(target: "quiz", topic, %query, "Docs service had nothing"),
        Err(e) => {
          self.provider_failures.fetch_add(1, Ordering::Relaxed);
          warn!(target: "quiz", topic, error = %e, "Docs service call failed");
        }
      }
    }

    self.fallback_used.fetch_add(1, Ordering::Relaxed);
    let text = fallback_content(topic);
    self.store(key, text.clone()).await;
    text
  }

  async fn cached(&self, key: &str) -> Option<String> {
    let cache = self.cache.read().await;
    cache
      .get(key)
      .filter(|doc| doc.stored_at.elapsed() < self.ttl)
      .map(|doc| doc.content.clone())
  }

  async fn store(&self, key: String, content: String) {
    let mut cache = self.cache.write().await;
    cache.retain(|_, doc| doc.stored_at.elapsed() < self.ttl);
    cache.insert(key, CachedDoc { content, stored_at: Instant::now() });
  }

  pub async fn clear_cache(&self) {
    self.cache.write().await.clear();
  }

  pub fn metrics(&self) -> ReferenceMetrics {
    let hits = self.cache_hits.load(Ordering::Relaxed);
    let misses = self.cache_misses.load(Ordering::Relaxed);
    ReferenceMetrics {
      cache_hits: hits,
      cache_misses: misses,
      provider_calls: self.provider_calls.load(Ordering::Relaxed),
      provider_failures: self.provider_failures.load(Ordering::Relaxed),
      fallback_used: self.fallback_used.load(Ordering::Relaxed),
      hit_rate: if hits + misses == 0 { 0.0 } else { hits as f64 / (hits + misses) as f64 },
    }
  }
}

// (infra tag, topic key, service names used in docs queries)
const INFRA_TABLE: &[(&str, &str, &[&str])] = &[
  ("ec2", "auto-scaling", &["AWS EC2", "EC2 instances", "EC2 auto-scaling"]),
  ("auto scaling", "auto-scaling", &["AWS Auto Scaling", "Auto Scaling Groups"]),
  ("karpenter", "containers", &["Karpenter", "EKS auto-scaling", "Node provisioning"]),
  ("eks", "containers", &["Amazon EKS", "Kubernetes on AWS", "EKS nodes"]),
  ("ecs", "containers", &["Amazon ECS", "AWS Fargate"]),
  ("aurora", "database", &["Amazon Aurora", "Aurora Serverless", "Aurora MySQL"]),
  ("global db", "high-availability", &["Aurora Global Database", "Multi-region database"]),
  ("rds", "database", &["Amazon RDS", "RDS instances", "Relational database"]),
  ("dynamodb", "database", &["Amazon DynamoDB", "NoSQL database"]),
  ("redis", "performance", &["Amazon ElastiCache", "ElastiCache Redis", "Redis caching"]),
  ("elasticache", "performance", &["Amazon ElastiCache", "Redis caching"]),
  ("cloudfront", "performance", &["Amazon CloudFront", "CDN", "CloudFront caching"]),
  ("alb", "networking", &["Application Load Balancer", "ELB", "Load balancing"]),
  ("vpc", "networking", &["Amazon VPC", "Virtual Private Cloud"]),
  ("route53", "high-availability", &["Amazon Route 53", "DNS failover"]),
  ("s3", "cost-optimization", &["Amazon S3", "S3 bucket", "Object storage"]),
  ("lambda", "serverless", &["AWS Lambda", "Serverless functions"]),
  ("cloudwatch", "monitoring", &["Amazon CloudWatch", "CloudWatch alarms"]),
  ("iam", "security", &["AWS IAM", "Least privilege"]),
];

/// Topic key most of the tags point at (first seen wins ties), or "generic".
pub fn topic_for(infra: &[String]) -> &'static str {
  let mut votes: Vec<(&'static str, usize)> = Vec::new();
  for tag in normalize_tags(infra) {
    if let Some(&(_, topic, _)) = INFRA_TABLE.iter().find(|(t, _, _)| *t == tag) {
      match votes.iter_mut().find(|(k, _)| *k == topic) {
        Some((_, n)) => *n += 1,
        None => votes.push((topic, 1)),
      }
    }
  }
  let mut best: Option<(&'static str, usize)> = None;
  for (topic, n) in votes {
    if best.map_or(true, |(_, b)| n > b) {
      best = Some((topic, n));
    }
  }
  best.map_or("generic", |(topic, _)| topic)
}

/// Distinct service names for the tags, in tag order.
pub fn services_for(infra: &[String]) -> Vec<&'static str> {
  let mut out: Vec<&'static str> = Vec::new();
  for tag in normalize_tags(infra) {
    if let Some((_, _, names)) = INFRA_TABLE.iter().find(|(t, _, _)| *t == tag) {
      for name in names.iter().copied() {
        if !out.contains(&name) {
          out.push(name);
        }
      }
    }
  }
  out
}

/// Docs query naming at most three services.
pub fn build_query(topic: &str, infra: &[String]) -> String {
  let services = services_for(infra);
  match services.as_slice() {
    [] => format!("How to {topic}?"),
    [only] => format!("How to {topic} with {only}?"),
    [first, second] => format!("How to {topic} with {first} and {second}?"),
    [first, rest @ ..] => format!("How to {topic} with {first}, {}?", rest[..2].join(", ")),
  }
}

/// Drop fenced code, collapse whitespace, cap at `MAX_REFERENCE_CHARS`.
pub fn process_documentation(raw: &str) -> String {
  let without_code = CODE_FENCE.replace_all(raw, " ");
  let collapsed = WHITESPACE.replace_all(&without_code, " ");
  collapsed.trim().chars().take(MAX_REFERENCE_CHARS).collect()
}

fn cache_key(topic: &str, infra: &[String]) -> String {
  let mut tags = normalize_tags(infra);
  tags.sort();
  let topic = WHITESPACE.replace_all(topic.trim(), "-").to_lowercase();
  format!("docs:{}:{}", tags.join(","), topic)
}

const FALLBACK_CONTENT: &[(&str, &str)] = &[
  ("auto-scaling", "AWS Auto Scaling automatically adjusts compute capacity to maintain performance and optimize costs. It monitors applications and adjusts capacity based on demand patterns. Key features include predictive scaling, dynamic scaling policies and integration with CloudWatch metrics."),
  ("performance", "AWS offers several services for performance optimization: CloudFront for content delivery, ElastiCache for caching, Auto Scaling for capacity management and CloudWatch for monitoring. Good practice is to cache hot data, tune database queries and pick instance types that fit the workload."),
  ("security", "AWS security follows the shared responsibility model. IAM controls access, VPC isolates networks, KMS handles encryption and CloudTrail records API activity. Grant least privilege, encrypt data at rest and in transit, and audit regularly."),
  ("cost-optimization", "AWS cost optimization relies on Reserved Instances or Savings Plans for steady workloads, right-sizing instances from real usage, scaling with demand and using Spot Instances for interruptible work. Track spending continuously with AWS Cost Explorer."),
  ("high-availability", "Highly available AWS architectures span multiple Availability Zones and combine load balancing, auto scaling and health checks. Aurora fails over automatically, Route 53 supports DNS failover and multi-region deployments provide disaster recovery."),
  ("monitoring", "Amazon CloudWatch collects metrics, logs and events from AWS resources. Dashboards, alarms and automatic actions build on that data, and CloudWatch Logs Insights helps analyse logs while troubleshooting."),
  ("database", "AWS database options include Aurora for high-performance relational workloads, RDS for managed engines, DynamoDB for NoSQL and ElastiCache for caching. Choose by data model, performance needs and scaling behaviour; Aurora Serverless scales capacity automatically."),
  ("networking", "AWS networking builds on VPC for isolation, ALB and NLB for load balancing, CloudFront as CDN and Direct Connect for dedicated links. Keep workloads in private subnets, use security groups and NACLs, and enable VPC Flow Logs."),
  ("serverless", "Serverless on AWS combines Lambda for compute, API Gateway for APIs, DynamoDB for data and S3 for storage. It scales automatically, bills per use and removes server management, which suits event-driven workloads and microservices."),
  ("containers", "Amazon EKS provides managed Kubernetes and ECS offers AWS-native container orchestration. Fargate runs containers without managing servers, ECR stores images and Karpenter provisions right-sized nodes for EKS clusters."),
];

/// Static paragraph for a topic; unknown topics get a generic one.
pub fn fallback_content(topic: &str) -> String {
  let normalized = topic.trim().to_lowercase();
  FALLBACK_CONTENT
    .iter()
    .find(|(key, _)| normalized.contains(key))
    .map(|(_, text)| text.to_string())
    .unwrap_or_else(|| {
      format!(
        "AWS provides a broad set of cloud services for {}. Apply proper security controls, monitor performance metrics, keep costs in check and design for high availability. Consult the AWS documentation for guidance on the specific use case.",
        topic.trim()
      )
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  fn tags(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  struct ScriptedDocs {
    reply: Result<Option<String>, u16>,
    calls: AtomicUsize,
  }

  #[async_trait]
  impl DocsProvider for ScriptedDocs {
    async fn fetch(&self, _query: &str) -> Result<Option<String>, DocsError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.reply.clone().map_err(DocsError::Status)
    }
  }

  #[test]
  fn topics_follow_the_majority_of_tags() {
    assert_eq!(topic_for(&tags(&["EKS", "Karpenter", "Aurora"])), "containers");
    assert_eq!(topic_for(&tags(&["rds"])), "database");
    assert_eq!(topic_for(&tags(&["Unknown"])), "generic");
    assert_eq!(topic_for(&[]), "generic");
  }

  #[test]
  fn queries_name_at_most_three_services() {
    assert_eq!(build_query("scaling", &[]), "How to scaling?");
    let q = build_query("scaling", &tags(&["EKS", "Karpenter"]));
    assert_eq!(q, "How to scaling with Amazon EKS, Kubernetes on AWS, EKS nodes?");
  }

  #[test]
  fn documentation_is_cleaned_and_bounded() {
    let raw = format!("Intro\n\n```rust\nfn main() {{}}\n```\n  tail   text {}", "x".repeat(2000));
    let out = process_documentation(&raw);
    assert!(out.starts_with("Intro tail text"));
    assert!(!out.contains("fn main"));
    assert_eq!(out.chars().count(), MAX_REFERENCE_CHARS);
  }

  #[test]
  fn unknown_topics_get_generic_fallback() {
    assert!(fallback_content("database").starts_with("AWS database options"));
    assert!(fallback_content("Quantum stuff").contains("Quantum stuff"));
  }

  #[tokio::test]
  async fn provider_text_is_cached() {
    let docs = Arc::new(ScriptedDocs { reply: Ok(Some("Aurora   replicas".into())), calls: AtomicUsize::new(0) });
    let ctx = ReferenceContext::new(Some(docs.clone()));
    let infra = tags(&["Aurora", "RDS"]);
    assert_eq!(ctx.context_for(&infra).await, "Aurora replicas");
    // Same tags in another order and case hit the same entry.
    assert_eq!(ctx.context_for(&tags(&["rds", "aurora"])).await, "Aurora replicas");
    assert_eq!(docs.calls.load(Ordering::SeqCst), 1);

    let m = ctx.metrics();
    assert_eq!((m.cache_hits, m.cache_misses, m.provider_calls), (1, 1, 1));
    assert_eq!(m.hit_rate, 0.5);
  }

  #[tokio::test]
  async fn failing_provider_degrades_to_static_text() {
    let docs = Arc::new(ScriptedDocs { reply: Err(503), calls: AtomicUsize::new(0) });
    let ctx = ReferenceContext::new(Some(docs)).with_ttl(Duration::ZERO);
    let text = ctx.fetch_context("containers", &tags(&["EKS"])).await;
    assert!(text.starts_with("Amazon EKS"));
    let m = ctx.metrics();
    assert_eq!(m.provider_failures, 1);
    assert_eq!(m.fallback_used, 1);
  }

  #[tokio::test]
  async fn no_provider_means_static_text() {
    let ctx = ReferenceContext::new(None);
    let text = ctx.fetch_context("monitoring", &[]).await;
    assert!(text.starts_with("Amazon CloudWatch"));
    assert_eq!(ctx.metrics().provider_calls, 0);
  }
}
