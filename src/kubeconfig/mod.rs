// src/kubeconfig/mod.rs
mod bundle;
mod kube;

pub use bundle::{kubeconfig_identities, AccessBundle, AccessBundleBuilder, AccessIdentity};
pub use kube::KubeConfigGenerator;
