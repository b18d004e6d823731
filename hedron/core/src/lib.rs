// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hedron core
//!
//! Keeps the entities granted by equipped modules in step with the slots of
//! every container an owner holds.
//!
//! # Architecture
//!
//! - **Domain:** entities, typed property schema, slots, grants, collaborator traits
//! - **Application:** slot store, grant resolver, reconciler, event dispatcher
//! - **Infrastructure:** event bus, in-memory world

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
