// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::writer::{Block, Body};
use krec_core::ProviderSpec;

/// One empty `provider` block per provider; configuration comes from the environment.
pub(crate) fn append(doc: &mut Body, providers: &[ProviderSpec]) {
    for provider in providers {
        doc.block(Block::new("provider", &[&provider.name]));
    }
}
