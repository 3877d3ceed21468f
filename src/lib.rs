// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod kubernetes;
pub mod publish;
pub mod queue;
pub mod resolver;
pub mod selectors;
pub mod store;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_utils;
