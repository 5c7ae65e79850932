// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Types shared between the daemon and the processes reporting crashes to it.

pub(crate) mod address;
pub(crate) mod configuration;
pub(crate) mod constants;
pub(crate) mod message;
