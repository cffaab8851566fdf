//! The wire contract every scanner pod speaks (§6 "Adapter HTTP
//! contract"). Both adapter families call through this thin reqwest
//! wrapper; what differs between them is how the facade interprets the
//! replies, not the wire shape itself.

use serde::Deserialize;
use uuid::Uuid;

use crate::adapter::{AdapterStatus, CreateError};
use crate::models::ReportContent;
use crate::utils::errors::{Error, Kind};

#[derive(Debug, Deserialize)]
struct CreateResponse {
    ok: bool,
    running_id: Option<String>,
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetTaskResponse {
    ok: bool,
    running_status: Option<String>,
    #[allow(dead_code)]
    progress: Option<f64>,
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OkResponse {
    ok: bool,
    errmsg: Option<String>,
}

pub async fn create_task(
    http: &reqwest::Client,
    base_url: &str,
    target: &str,
    task_id: Uuid,
) -> Result<String, CreateError> {
    let resp: CreateResponse = http
        .post(format!("{base_url}/create_task"))
        .query(&[("target", target), ("task_id", &task_id.to_string())])
        .send()
        .await
        .map_err(Error::from)?
        .json()
        .await
        .map_err(Error::from)?;
    if !resp.ok {
        let msg = resp.errmsg.unwrap_or_default();
        return if msg.to_lowercase().contains("busy") {
            Err(CreateError::EngineBusy)
        } else {
            Err(CreateError::InvalidTarget(msg))
        };
    }
    resp.running_id
        .ok_or_else(|| CreateError::Transient(Error::new(Kind::Internal, "ok response missing running_id")))
}

pub async fn get_task(
    http: &reqwest::Client,
    base_url: &str,
    running_id: &str,
) -> Result<AdapterStatus, Error> {
    let resp: GetTaskResponse = http
        .get(format!("{base_url}/get_task"))
        .query(&[("running_id", running_id)])
        .send()
        .await?
        .json()
        .await?;
    if !resp.ok {
        return Err(Error::new(
            Kind::Transient,
            resp.errmsg.unwrap_or_else(|| "engine reported not-ok".into()),
        ));
    }
    match resp.running_status.as_deref() {
        Some("running") => Ok(AdapterStatus::Running),
        Some("done") => Ok(AdapterStatus::Done),
        Some("failed") => Ok(AdapterStatus::Failed(resp.errmsg.unwrap_or_default())),
        Some("error") => Ok(AdapterStatus::Error),
        other => Err(Error::new(
            Kind::Internal,
            format!("unrecognized running_status {other:?}"),
        )),
    }
}

pub async fn get_report(
    http: &reqwest::Client,
    base_url: &str,
    running_id: &str,
) -> Result<Vec<u8>, Error> {
    #[derive(Deserialize)]
    struct GetReportResponse {
        ok: bool,
        content: Option<String>,
        errmsg: Option<String>,
    }
    let resp: GetReportResponse = http
        .get(format!("{base_url}/get_report"))
        .query(&[("running_id", running_id)])
        .send()
        .await?
        .json()
        .await?;
    if !resp.ok {
        return Err(Error::new(
            Kind::Transient,
            resp.errmsg.unwrap_or_else(|| "engine reported not-ok".into()),
        ));
    }
    Ok(resp.content.unwrap_or_default().into_bytes())
}

pub async fn delete_task(http: &reqwest::Client, base_url: &str, running_id: &str) -> Result<(), Error> {
    let resp: OkResponse = http
        .delete(format!("{base_url}/delete_task"))
        .query(&[("running_id", running_id)])
        .send()
        .await?
        .json()
        .await?;
    ok_or_err(resp)
}

pub async fn scale_in_with_num(http: &reqwest::Client, base_url: &str, num: u32) -> Result<(), Error> {
    let resp: OkResponse = http
        .get(format!("{base_url}/scale_in_with_num"))
        .query(&[("num", num)])
        .send()
        .await?
        .json()
        .await?;
    ok_or_err(resp)
}

pub async fn healthz(http: &reqwest::Client, base_url: &str) -> Result<(), Error> {
    #[derive(Deserialize)]
    struct HealthzResponse {
        ok: bool,
    }
    let resp: HealthzResponse = http.get(format!("{base_url}/healthz")).send().await?.json().await?;
    if resp.ok {
        Ok(())
    } else {
        Err(Error::new(Kind::Transient, "healthz reported not-ok"))
    }
}

fn ok_or_err(resp: OkResponse) -> Result<(), Error> {
    if resp.ok {
        Ok(())
    } else {
        Err(Error::new(
            Kind::Transient,
            resp.errmsg.unwrap_or_else(|| "engine reported not-ok".into()),
        ))
    }
}

/// `get_report`'s bytes, tagged with a content type. The wire contract
/// (§6) only returns raw bytes, so callers that need a mime type/filename
/// supply their own defaults.
pub fn as_report_content(bytes: Vec<u8>, mime_type: &str, filename: &str) -> ReportContent {
    ReportContent {
        mime_type: mime_type.to_string(),
        filename: filename.to_string(),
        content: bytes,
    }
}
