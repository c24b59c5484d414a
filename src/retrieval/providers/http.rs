use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

use crate::error::RetrievalError;
use crate::retrieval::decode::{decode_payload, DecodeOptions, PayloadFormat};
use crate::retrieval::types::{LightCurveProvider, RawSeries};

const TARGET: &str = "{target}";
const MISSION: &str = "{mission}";
// `Url::parse` escapes braces inside the path.
const TARGET_IN_PATH: &str = "%7Btarget%7D";
const MISSION_IN_PATH: &str = "%7Bmission%7D";

/// Fetches light curves from an HTTP endpoint described by a URL template,
/// e.g. `https://archive.example/lc/{mission}/{target}.json`.
#[derive(Clone)]
pub struct HttpProvider {
    template: Url,
    client: Client,
    max_retries: u8,
    decode: DecodeOptions,
}

impl HttpProvider {
    pub fn new(url_template: &str) -> Result<Self> {
        Self::with_timeouts(url_template, Duration::from_secs(10), Duration::from_secs(60))
    }

    pub fn with_timeouts(
        url_template: &str,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let template = Url::parse(url_template)
            .with_context(|| format!("invalid url template '{url_template}'"))?;
        if template.cannot_be_a_base() {
            bail!("url template '{url_template}' has no path to fill");
        }
        let client = Client::builder()
            .user_agent(concat!("lightcurve-dataset/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            template,
            client,
            max_retries: 3,
            decode: DecodeOptions::default(),
        })
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    /// Substitute `{target}` and `{mission}` in the path and query.
    pub fn url_for(&self, target: &str, mission: &str) -> Url {
        let mut url = self.template.clone();

        let path = self
            .template
            .path()
            .replace(TARGET_IN_PATH, &self.path_segment(target))
            .replace(MISSION_IN_PATH, &self.path_segment(mission));
        url.set_path(&path);

        if self.template.query().is_some() {
            let pairs: Vec<(String, String)> = self
                .template
                .query_pairs()
                .map(|(k, v)| {
                    let fill = |s: &str| s.replace(TARGET, target).replace(MISSION, mission);
                    (fill(&k), fill(&v))
                })
                .collect();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url
    }

    /// `value` escaped as a single path segment (`/`, `%`, spaces and the like).
    fn path_segment(&self, value: &str) -> String {
        let mut scratch = self.template.clone();
        match scratch.path_segments_mut() {
            Ok(mut segments) => {
                segments.clear().push(value);
            }
            Err(()) => return value.to_string(),
        }
        scratch.path().trim_start_matches('/').to_string()
    }

    async fn get_body(
        &self,
        url: &Url,
        target: &str,
        mission: &str,
    ) -> Result<(String, Option<String>), RetrievalError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self.client.get(url.clone()).send().await;

            let retryable = match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status == StatusCode::NOT_FOUND {
                        return Err(RetrievalError::UnknownTarget {
                            target: target.to_string(),
                            mission: mission.to_string(),
                        });
                    }
                    if status == StatusCode::NO_CONTENT {
                        return Err(RetrievalError::NoData {
                            target: target.to_string(),
                            mission: mission.to_string(),
                        });
                    }
                    if status.is_success() {
                        let content_type = rsp
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let body = rsp
                            .text()
                            .await
                            .map_err(|e| RetrievalError::Transport(format!("reading body: {e}")))?;
                        return Ok((body, content_type));
                    }
                    if !status.is_server_error() {
                        return Err(RetrievalError::Transport(format!("HTTP {status}")));
                    }
                    format!("HTTP {status}")
                }
                Err(e) if e.is_timeout() => "request timed out".to_string(),
                Err(e) if e.is_connect() => "connection failed".to_string(),
                Err(e) => format!("request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(RetrievalError::Transport(retryable));
            }
            counter!("retrieval_http_retries_total").increment(1);
            tracing::debug!(%url, attempt, reason = %retryable, "retrying light curve fetch");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait]
impl LightCurveProvider for HttpProvider {
    async fn fetch(&self, target: &str, mission: &str) -> Result<RawSeries, RetrievalError> {
        let url = self.url_for(target, mission);
        let (body, content_type) = self.get_body(&url, target, mission).await?;

        let format = content_type
            .as_deref()
            .and_then(PayloadFormat::from_content_type)
            .or_else(|| url_extension(&url).and_then(PayloadFormat::from_extension))
            .unwrap_or_else(|| PayloadFormat::sniff(&body));

        decode_payload(&body, format, self.decode)?.ok_or_else(|| RetrievalError::NoData {
            target: target.to_string(),
            mission: mission.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn url_extension(url: &Url) -> Option<&str> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    Some(ext)
}
