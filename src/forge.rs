//! Pull request creation on git forges.

/// GitHub implementation backed by octocrab.
pub mod github;

/// Request and response types shared by forge implementations.
pub mod request;

/// Forge capability traits.
pub mod traits;
