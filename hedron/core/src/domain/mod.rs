// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: entities, value objects, events and the collaborator
//! contracts of the reconciliation engine.

pub mod config;
pub mod container;
pub mod entity;
pub mod events;
pub mod grant;
pub mod module;
pub mod owner;
pub mod properties;
pub mod repository;
