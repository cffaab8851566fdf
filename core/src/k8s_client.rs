//! Builds the shared `kube::Client` every cluster-API consumer (C2, C3's
//! node capacity lookup, C4) uses. Follows the same
//! `Config::from_kubeconfig` + named-context idiom the teacher's k8s
//! wrapper uses, falling back to in-cluster config when running as a pod.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::conf::K8s;
use crate::utils::errors::Error;

pub async fn build(conf: &K8s) -> Result<Client, Error> {
    if Kubeconfig::read().is_err() {
        // No local kubeconfig found; assume in-cluster (service account).
        return Client::try_default().await.map_err(Error::from);
    }
    let mut opts = KubeConfigOptions::default();
    opts.context = Some(conf.context_name.clone());
    let config = Config::from_kubeconfig(&opts).await?;
    Client::try_from(config).map_err(Error::from)
}
