//! Reads scanner pods from the cluster API and maps their labels into
//! `ObservedPod` (§4.2). Grounded on the teacher's `k8s` module's use of
//! `kube::Api<Pod>` against the core API, but a one-shot `list` rather
//! than a `runtime::Controller` watch, matching the registry's fixed-tick
//! reconciliation shape.

use std::collections::HashMap;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;

use vtscan_core::models::{EngineKind, ObservedPod, PodPhase, ScanFamily};
use vtscan_core::utils::errors::Error;

const LABEL_SELECTOR: &str = "type=scanner,group=vtscan";

pub async fn list(client: Client, namespace: &str) -> Result<Vec<ObservedPod>, Error> {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let params = ListParams::default().labels(LABEL_SELECTOR);
    let list = api.list(&params).await?;
    Ok(list.items.iter().filter_map(from_pod).collect())
}

fn from_pod(pod: &Pod) -> Option<ObservedPod> {
    let name = pod.metadata.name.clone()?;
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    let engine = labels.get("engine")?.clone();
    let scan_type = labels.get("scan_type")?;
    let family = match scan_type.as_str() {
        "host" => ScanFamily::HostScan,
        "web" => ScanFamily::WebScan,
        _ => return None,
    };
    let max_concurrency: i32 = labels.get("max_concurrency")?.parse().ok()?;
    let port: i32 = label_or_default(&labels, "port", 80);
    let filetype = labels.get("filetype").cloned().unwrap_or_else(|| "HTML".into());

    let status = pod.status.as_ref();
    let phase = status
        .and_then(|s| s.phase.as_deref())
        .and_then(|p| PodPhase::from_str(p).ok())
        .unwrap_or(PodPhase::Unknown);
    let ip = status.and_then(|s| s.pod_ip.clone());
    let node_name = pod.spec.as_ref().and_then(|s| s.node_name.clone());

    Some(ObservedPod {
        name,
        engine: EngineKind(engine),
        family,
        max_concurrency,
        port,
        filetype,
        ip,
        node_name,
        phase,
    })
}

fn label_or_default(labels: &HashMap<String, String>, key: &str, default: i32) -> i32 {
    labels.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub async fn delete(client: Client, namespace: &str, name: &str) -> Result<(), Error> {
    use kube::api::DeleteParams;
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let params = DeleteParams { grace_period_seconds: Some(0), ..DeleteParams::default() };
    match api.delete(name, &params).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
        Err(err) => Err(Error::from(err)),
    }
}
