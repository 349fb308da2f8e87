/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Ad and tracker blocking: the domain rule set and the per-request
//! decision engine attached to every surface's network layer.

pub mod engine;
pub mod rules;
