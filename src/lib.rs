// Copyright 2026 The Assist Gateway Authors
// SPDX-License-Identifier: Apache-2.0

pub mod client;
pub mod decode;
pub mod message;
pub mod proxy;
pub mod region;
pub mod session;
pub mod upstream;
