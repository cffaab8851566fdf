//! The web-scan adapter: owns the `spider -> ajax-spider -> active ->
//! passive -> done` internal state machine (§4.1, §GLOSSARY) behind the
//! four facade calls. `failed` is terminal from any phase.
//!
//! The underlying pod only ever speaks the generic per-pod contract
//! (§6): each phase is its own `create_task`/`get_task` cycle against the
//! same pod, chained internally so the scheduler only ever observes one
//! logical running id and one of `{running, done, failed, error}`.
//!
//! Phase state is persisted in `db::web_scan_phase` rather than kept in
//! an in-process map: `adapter::build` constructs a fresh adapter on
//! every call, so anything held only in a struct field on this adapter
//! would be lost the instant the call returns.

use async_trait::async_trait;
use uuid::Uuid;

use crate::adapter::{http, AdapterStatus, CreateError, EngineAdapter};
use crate::db::web_scan_phase;
use crate::models::ReportContent;
use crate::utils::errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Spider,
    AjaxSpider,
    Active,
    Passive,
}

impl Phase {
    fn next(self) -> Option<Phase> {
        match self {
            Phase::Spider => Some(Phase::AjaxSpider),
            Phase::AjaxSpider => Some(Phase::Active),
            Phase::Active => Some(Phase::Passive),
            Phase::Passive => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Phase::Spider => "spider",
            Phase::AjaxSpider => "ajax-spider",
            Phase::Active => "active",
            Phase::Passive => "passive",
        }
    }

    fn parse(s: &str) -> Phase {
        match s {
            "spider" => Phase::Spider,
            "ajax-spider" => Phase::AjaxSpider,
            "active" => Phase::Active,
            _ => Phase::Passive,
        }
    }
}

pub struct WebScanAdapter {
    base_url: String,
    http: reqwest::Client,
    pool: sqlx::PgPool,
}

impl WebScanAdapter {
    pub fn new(base_url: String, http: reqwest::Client, pool: sqlx::PgPool) -> Self {
        WebScanAdapter { base_url, http, pool }
    }
}

#[async_trait]
impl EngineAdapter for WebScanAdapter {
    async fn create(&self, target: &str, task_id: Uuid) -> Result<String, CreateError> {
        let engine_running_id = http::create_task(&self.http, &self.base_url, target, task_id).await?;
        web_scan_phase::insert(
            &self.pool,
            &engine_running_id,
            target,
            Phase::Spider.as_str(),
            &engine_running_id,
        )
        .await
        .map_err(CreateError::from)?;
        Ok(engine_running_id)
    }

    async fn status(&self, running_id: &str) -> Result<AdapterStatus, Error> {
        let mut state = web_scan_phase::get(&self.pool, running_id)
            .await?
            .ok_or_else(|| crate::not_found!(format!("no web-scan tracked for {running_id}")))?;

        loop {
            let raw = http::get_task(&self.http, &self.base_url, &state.engine_running_id).await?;
            match raw {
                AdapterStatus::Failed(msg) => return Ok(AdapterStatus::Failed(msg)),
                AdapterStatus::Error => return Ok(AdapterStatus::Error),
                AdapterStatus::Running => return Ok(AdapterStatus::Running),
                AdapterStatus::Done => match Phase::parse(&state.phase).next() {
                    Some(next_phase) => {
                        let next_running_id = http::create_task(
                            &self.http,
                            &self.base_url,
                            &state.target,
                            Uuid::new_v4(),
                        )
                        .await
                        .map_err(|e| match e {
                            CreateError::Transient(err) => err,
                            other => crate::internal_err!(other.to_string()),
                        })?;
                        web_scan_phase::advance_phase(
                            &self.pool,
                            running_id,
                            next_phase.as_str(),
                            &next_running_id,
                        )
                        .await?;
                        state.phase = next_phase.as_str().to_string();
                        state.engine_running_id = next_running_id;
                        continue;
                    }
                    None => return Ok(AdapterStatus::Done),
                },
            }
        }
    }

    async fn report(&self, running_id: &str) -> Result<ReportContent, Error> {
        let state = web_scan_phase::get(&self.pool, running_id)
            .await?
            .ok_or_else(|| crate::not_found!(format!("no web-scan tracked for {running_id}")))?;
        let bytes = http::get_report(&self.http, &self.base_url, &state.engine_running_id).await?;
        Ok(http::as_report_content(bytes, "application/json", "web-scan-report.json"))
    }

    async fn stop(&self, running_id: &str) -> Result<(), Error> {
        let engine_running_id = self.current_engine_running_id(running_id).await?;
        http::delete_task(&self.http, &self.base_url, &engine_running_id).await
    }

    async fn delete(&self, running_id: &str) -> Result<(), Error> {
        let engine_running_id = self.current_engine_running_id(running_id).await?;
        http::delete_task(&self.http, &self.base_url, &engine_running_id).await?;
        web_scan_phase::delete(&self.pool, running_id).await?;
        Ok(())
    }

    async fn scale_in(&self, n: u32) -> Result<(), Error> {
        http::scale_in_with_num(&self.http, &self.base_url, n).await
    }

    async fn healthz(&self) -> Result<(), Error> {
        http::healthz(&self.http, &self.base_url).await
    }
}

impl WebScanAdapter {
    async fn current_engine_running_id(&self, running_id: &str) -> Result<String, Error> {
        web_scan_phase::get(&self.pool, running_id)
            .await?
            .map(|s| s.engine_running_id)
            .ok_or_else(|| crate::not_found!(format!("no web-scan tracked for {running_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_chain_ends_at_passive() {
        assert_eq!(Phase::Spider.next(), Some(Phase::AjaxSpider));
        assert_eq!(Phase::AjaxSpider.next(), Some(Phase::Active));
        assert_eq!(Phase::Active.next(), Some(Phase::Passive));
        assert_eq!(Phase::Passive.next(), None);
    }

    #[test]
    fn phase_round_trips_through_its_string_form() {
        for phase in [Phase::Spider, Phase::AjaxSpider, Phase::Active, Phase::Passive] {
            assert_eq!(Phase::parse(phase.as_str()), phase);
        }
    }
}
