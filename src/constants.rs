// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Name used for the root tracing span and in log lines
pub const CONTROLLER_NAME: &str = "where-resolver";

/// kube-bind conventions used to map provider-side copies back to their tenant
pub mod kube_bind {
    /// Annotation on provider-side copies naming the consumer's kube-bind space id
    pub const CLUSTER_NAMESPACE_ANNOTATION: &str = "kube-bind.io/cluster-namespace";
    /// Label on relation ConfigMaps carrying the kube-bind space id
    pub const ID_LABEL: &str = "kubestellar.io/kube-bind-id";
    /// Relation ConfigMaps are named `kbmap-<space id>`
    pub const CONFIG_MAP_PREFIX: &str = "kbmap-";
    /// Namespace holding the relation ConfigMaps unless configured otherwise
    pub const DEFAULT_NAMESPACE: &str = "kubestellar";
}

/// Space directory conventions
pub mod space {
    /// Namespace holding `Space` objects when none is given
    pub const DEFAULT_PROVIDER_NAMESPACE: &str = "spaceprovider-default";
    /// Phase a `Space` must report before it is used
    pub const PHASE_READY: &str = "Ready";
    /// Secret key holding the space's kubeconfig
    pub const KUBECONFIG_KEY: &str = "kubeconfig";
}

/// Work queue defaults
pub mod queue {
    pub const DEFAULT_WORKERS: usize = 2;
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
    /// First retry delay in milliseconds
    pub const DEFAULT_BASE_DELAY_MS: u64 = 5;
    /// Retry delay cap in seconds
    pub const DEFAULT_MAX_DELAY_SECS: u64 = 1000;
}

/// CRD polling configuration
pub mod crd {
    /// API group holding EdgePlacement, Location, SyncTarget and SinglePlacementSlice
    pub const EDGE_GROUP: &str = "edge.kubestellar.io";
    /// Kinds that must be served before the controller starts
    pub const REQUIRED_KINDS: [&str; 4] = [
        "EdgePlacement",
        "Location",
        "SyncTarget",
        "SinglePlacementSlice",
    ];
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
