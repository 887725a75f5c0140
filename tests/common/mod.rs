//! Consolidated test utilities for flake-navigator
//!
//! This module provides unified testing utilities for integration tests:
//! real upstream git repositories for the clone cache, scripted fakes for the
//! HTTP and `nix` seams, and output predicates for the binary.

pub mod assertions;
pub mod fixtures;
pub mod repository;
