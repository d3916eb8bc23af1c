// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

#[allow(unused_extern_crates)]
extern crate self as argocd_bootstrap_installer;

pub mod aws;
pub mod cluster;
pub mod crd;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod secrets;
