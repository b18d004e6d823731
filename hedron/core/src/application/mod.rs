// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application services: slot assignment, grant resolution, reconciliation
//! and event dispatch.

pub mod dispatcher;
pub mod grant_resolver;
pub mod reconciler;
pub mod slot_store;

pub use dispatcher::{EventDispatcher, Relevance};
pub use grant_resolver::GrantResolver;
pub use reconciler::{Reconciler, SyncError, SyncPlan, SyncReport};
pub use slot_store::SlotStore;
