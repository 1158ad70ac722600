//! Type-state markers for the builder
//!
//! These track at compile time whether the URL has been set, so `build()`
//! is only callable on a builder that knows where to connect.

/// Marker trait for URL state
pub trait UrlState {}

/// URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}
