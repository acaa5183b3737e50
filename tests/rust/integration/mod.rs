//! End-to-end scenarios (spec.md §8): each test builds an unresolved plan
//! and a small catalog fixture, runs it through the full `Analyzer`, and
//! checks the resolved plan (or error) matches the spec's worked example.

mod common;
mod scenarios;
