// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{kube_bind, queue, space};
use crate::queue::Backoff;

/// Controller configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of workers pulling from the reconcile queue
    pub workers: usize,
    /// Namespace holding `Space` objects
    pub space_provider_namespace: String,
    /// Namespace holding the kube-bind relation ConfigMaps
    pub kube_bind_namespace: String,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Capacity of each per-kind request channel
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: queue::DEFAULT_WORKERS,
            space_provider_namespace: space::DEFAULT_PROVIDER_NAMESPACE.to_string(),
            kube_bind_namespace: kube_bind::DEFAULT_NAMESPACE.to_string(),
            retry_base_delay: Duration::from_millis(queue::DEFAULT_BASE_DELAY_MS),
            retry_max_delay: Duration::from_secs(queue::DEFAULT_MAX_DELAY_SECS),
            channel_capacity: queue::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let workers = parse_or(&lookup, "WORKERS", defaults.workers)?;
        if workers == 0 {
            bail!("WORKERS must be at least 1");
        }
        let channel_capacity =
            parse_or(&lookup, "QUEUE_CHANNEL_CAPACITY", defaults.channel_capacity)?;
        if channel_capacity == 0 {
            bail!("QUEUE_CHANNEL_CAPACITY must be at least 1");
        }

        let base_ms = parse_or(&lookup, "RETRY_BASE_DELAY_MS", queue::DEFAULT_BASE_DELAY_MS)?;
        let max_secs = parse_or(&lookup, "RETRY_MAX_DELAY_SECS", queue::DEFAULT_MAX_DELAY_SECS)?;

        Ok(Config {
            workers,
            space_provider_namespace: lookup("SPACE_PROVIDER_NAMESPACE")
                .unwrap_or(defaults.space_provider_namespace),
            kube_bind_namespace: lookup("KUBE_BIND_NAMESPACE")
                .unwrap_or(defaults.kube_bind_namespace),
            retry_base_delay: Duration::from_millis(base_ms),
            retry_max_delay: Duration::from_secs(max_secs),
            channel_capacity,
        })
    }

    /// Retry backoff bounds for the work queue
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.retry_base_delay, self.retry_max_delay)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        None => Ok(default),
    }
}
