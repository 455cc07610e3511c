//! Build and search tests over generated feature sets.

mod build_test;
mod search_test;
