// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! HTTP traffic inspection: a forward proxy that reports exchanges, a store
//! that correlates them, and the filtering, search and rendering built on top.
//!
//! Data flows one way: [`proxy::ProxyEngine`] emits [`events::ProxyEvent`]s,
//! [`pipeline::Pipeline`] feeds them to the [`correlator::Correlator`], which
//! mutates the [`state::CaptureStore`]. Consumers read store snapshots through
//! [`filter::LiveView`] or a [`session::Session`].

pub mod capture;
pub mod config;
pub mod correlator;
pub mod events;
pub mod filter;
pub mod json_format;
pub mod pipeline;
pub mod proxy;
pub mod record;
pub mod render;
pub mod search;
pub mod session;
pub mod state;
pub mod token;

#[cfg(test)]
mod test_helpers;
