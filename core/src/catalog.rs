//! The scaler catalog (C4, §4.4): reads `scalerregister` custom resources
//! (group `cstcloud.cn`) from the cluster API and builds an
//! `engine -> ScalerRegistration` map for C6 to consume each tick.
//!
//! Modelled on `registry`'s `k8s` module's use of `kube::Api` against raw
//! cluster objects, but read-only and against a dynamic GVK rather than a
//! `#[derive(CustomResource)]` type: nothing here ever writes the CRD.

use std::collections::HashMap;

use kube::api::{Api, DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use kube::Client;
use serde::Deserialize;
use tracing::warn;

use crate::models::{EngineKind, ScalerRegistration, ScalingModes};
use crate::utils::errors::Error;

const GROUP: &str = "cstcloud.cn";
const VERSION: &str = "v1";
const KIND: &str = "scalerregister";

/// The subset of a `scalerregister` object's spec this catalog cares about.
/// Fields absent on a row cause it to be skipped (§4.4).
#[derive(Debug, Deserialize)]
struct ScalerRegisterSpec {
    engine: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    vpa: bool,
    #[serde(default)]
    hpa: bool,
    #[serde(default)]
    cpu_cost: f64,
    #[serde(default)]
    memory_cost: f64,
    #[serde(default)]
    time_cost: f64,
    #[serde(default)]
    external_cpu_cost: f64,
    #[serde(default)]
    external_memory_cost: f64,
    host: Option<String>,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_port() -> u16 {
    80
}

/// Fetch and parse every `scalerregister` object in `namespace`, skipping
/// rows missing `engine` or `type` (§4.4).
pub async fn load(client: Client, namespace: &str) -> Result<HashMap<EngineKind, ScalerRegistration>, Error> {
    let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
    let api_resource = ApiResource::from_gvk(&gvk);
    let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &api_resource);

    let list = api.list(&Default::default()).await?;
    let mut catalog = HashMap::new();
    for object in list.items {
        match parse_registration(&object) {
            Some(reg) if reg.validate() => {
                catalog.insert(reg.engine.clone(), reg);
            }
            Some(reg) => {
                warn!(engine = %reg.engine.0, "dropping scalerregister with invalid cost fields");
            }
            None => {
                let name = object.metadata.name.clone().unwrap_or_default();
                warn!(name, "skipping scalerregister missing engine/type");
            }
        }
    }
    Ok(catalog)
}

fn parse_registration(object: &DynamicObject) -> Option<ScalerRegistration> {
    let spec_value = object.data.get("spec")?.clone();
    let spec: ScalerRegisterSpec = serde_json::from_value(spec_value).ok()?;
    let engine = spec.engine?;
    let _kind = spec.kind?;
    let host = spec.host.unwrap_or_default();
    Some(ScalerRegistration {
        engine: EngineKind(engine),
        modes: ScalingModes {
            vpa: spec.vpa,
            hpa: spec.hpa,
        },
        cpu_cost: spec.cpu_cost,
        memory_cost: spec.memory_cost,
        time_cost: spec.time_cost,
        external_cpu_cost: spec.external_cpu_cost,
        external_memory_cost: spec.external_memory_cost,
        host,
        port: spec.port,
    })
}
