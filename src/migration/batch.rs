use anyhow::{anyhow, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Response;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::authenticated::{AuthenticatedClient, AuthenticatedRequest};
use crate::client::error::RequestError;
use crate::config::targets::TargetConfig;
use crate::migration::log::{LogEntry, MigrationLog};
use crate::migration::payload::ROW_NUMBER;
use crate::observability::metrics::Metrics;

const APPROVAL_MODULE_TYPE: &str = "PARTY_MASTER";
const APPROVAL_ACTION: &str = "APPROVED";

/// Counts of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub target: String,
    pub total: usize,
    /// 2xx answers
    pub succeeded: usize,
    /// any other status
    pub rejected: usize,
    /// no answer: token, transport or header failures
    pub failed: usize,
    pub log_path: PathBuf,
}

/// Target with every value source resolved
struct ResolvedTarget<'a> {
    name: &'a str,
    config: &'a TargetConfig,
    url: String,
    approval_url: Option<String>,
    headers: HeaderMap,
}

/// One record of the payload file, unwrapped from its envelope
#[derive(Debug, PartialEq)]
struct Record {
    payload: Value,
    reference: Value,
    row_number: Value,
}

/// Sends the payload file of a target record by record
pub struct BatchRunner {
    client: AuthenticatedClient,
    metrics: Arc<Metrics>,
}

impl BatchRunner {
    pub fn new(client: AuthenticatedClient, metrics: Arc<Metrics>) -> Self {
        Self { client, metrics }
    }

    pub async fn run(&self, name: &str, target: &TargetConfig) -> Result<BatchSummary> {
        let target = resolve_target(name, target)?;
        let records = load_records(&target.config.input).await?;

        let log = MigrationLog::new(&target.config.log_dir, name);
        let flusher = log.start_auto_flush(Duration::from_secs(target.config.flush_interval_seconds));
        info!(
            target_name = name,
            kind = target.config.kind.as_str(),
            records = records.len(),
            input = %target.config.input,
            "batch started"
        );

        let mut summary = BatchSummary { target: name.to_owned(), total: records.len(), ..Default::default() };
        let pacing = Duration::from_millis(target.config.pacing_ms);

        for (idx, record) in records.into_iter().enumerate() {
            if idx > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            let entry = self.send_record(&target, idx + 1, record).await;
            match entry.status_code {
                Some(status) if (200..300).contains(&status) => summary.succeeded += 1,
                Some(_) => summary.rejected += 1,
                None => summary.failed += 1,
            }
            log.push(entry).await;
        }

        flusher.stop(&log).await?;
        summary.log_path = log.path().to_path_buf();
        info!(
            target_name = name,
            total = summary.total,
            succeeded = summary.succeeded,
            rejected = summary.rejected,
            failed = summary.failed,
            "batch finished"
        );
        Ok(summary)
    }

    async fn send_record(&self, target: &ResolvedTarget<'_>, payload_number: usize, record: Record) -> LogEntry {
        let mut entry = LogEntry {
            payload_number,
            reference: record.reference,
            status_code: None,
            response: Value::Null,
            row_number: record.row_number,
            error: None,
        };

        let result = self.submit(target, &record.payload).await;
        match result {
            Ok((status, response)) => {
                self.metrics
                    .records_sent
                    .with_label_values(&[target.name, status.as_str()])
                    .inc();
                if !status.is_success() {
                    warn!(target_name = target.name, payload_number, status = status.as_u16(), "record rejected");
                }
                entry.status_code = Some(status.as_u16());
                entry.response = response;
            }
            Err(e) => {
                error!(target_name = target.name, payload_number, "record not submitted: {}", e);
                self.metrics
                    .records_failed
                    .with_label_values(&[target.name, e.reason()])
                    .inc();
                entry.error = Some(e.to_string());
            }
        }
        entry
    }

    /// Submit one payload; a 200 answer is followed by the approval call when
    /// the target has one, and the approval answer is what gets reported.
    async fn submit(&self, target: &ResolvedTarget<'_>, payload: &Value) -> Result<(StatusCode, Value), RequestError> {
        let response = self
            .client
            .send(AuthenticatedRequest {
                method: target.config.method.clone(),
                url: &target.url,
                credential: &target.config.credential,
                body: Some(payload),
                auth: &target.config.auth,
                headers: &target.headers,
            })
            .await?;
        let (status, body) = read_response(response).await;

        let approval_url = match &target.approval_url {
            Some(url) if status == StatusCode::OK => url,
            _ => return Ok((status, body)),
        };

        let approval = approval_body(&body);
        let response = self
            .client
            .send(AuthenticatedRequest {
                method: Method::POST,
                url: approval_url,
                credential: &target.config.credential,
                body: Some(&approval),
                auth: &target.config.auth,
                headers: &target.headers,
            })
            .await?;
        Ok(read_response(response).await)
    }
}

fn resolve_target<'a>(name: &'a str, config: &'a TargetConfig) -> Result<ResolvedTarget<'a>> {
    let url = config
        .url
        .resolve()
        .map_err(|e| anyhow!("targets['{}'].url: {}", name, e))?;
    let approval_url = config
        .approval_url
        .as_ref()
        .map(|source| source.resolve())
        .transpose()
        .map_err(|e| anyhow!("targets['{}'].approval_url: {}", name, e))?;

    let mut headers = HeaderMap::new();
    for (key, source) in config.headers.iter().flatten() {
        let value = source
            .resolve()
            .map_err(|e| anyhow!("targets['{}'].headers['{}']: {}", name, key, e))?;
        headers.insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(&value)?);
    }

    Ok(ResolvedTarget { name, config, url, approval_url, headers })
}

async fn load_records(input: &str) -> Result<Vec<Record>> {
    let content = tokio::fs::read_to_string(input)
        .await
        .map_err(|e| anyhow!("cannot read payload file '{}': {}", input, e))?;
    let payloads: Vec<Value> = serde_json::from_str(&content)
        .map_err(|e| anyhow!("payload file '{}' is not a JSON array: {}", input, e))?;
    Ok(payloads.into_iter().map(unwrap_record).collect())
}

/// Envelopes carry `{payload, masterParty, row_number}`; bare payloads carry
/// their own `row_number`, which is not sent.
fn unwrap_record(value: Value) -> Record {
    match value {
        Value::Object(mut envelope) if envelope.contains_key("payload") => Record {
            payload: envelope.remove("payload").unwrap_or(Value::Null),
            reference: envelope.remove("masterParty").unwrap_or(Value::Null),
            row_number: envelope.remove(ROW_NUMBER).unwrap_or(Value::Null),
        },
        Value::Object(mut payload) => {
            let row_number = payload.remove(ROW_NUMBER).unwrap_or(Value::Null);
            let reference = ["Invoice Number", "masterPartyName", "sourceReferenceId"]
                .iter()
                .find_map(|key| payload.get(*key).cloned())
                .unwrap_or(Value::Null);
            Record { payload: Value::Object(payload), reference, row_number }
        }
        other => Record { payload: other, reference: Value::Null, row_number: Value::Null },
    }
}

fn approval_body(response: &Value) -> Value {
    json!({
        "uuid": response.get("guid").cloned().unwrap_or_else(|| json!("")),
        "version": response.get("version").cloned().unwrap_or_else(|| json!(1)),
        "moduleType": APPROVAL_MODULE_TYPE,
        "action": APPROVAL_ACTION,
    })
}

/// Status and body; a body that is not JSON is kept as text
async fn read_response(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    (status, body)
}
