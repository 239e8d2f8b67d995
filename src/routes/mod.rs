/// Router Module Index
///
/// Routes are split by how they are protected. API routes bypass page-visibility
/// enforcement and authorize mutations themselves; page routes are only reached after
/// the enforcement middleware has decided the page may be shown.

/// Settings read/write endpoints and the mirror event streams.
pub mod api;

/// Page rendering, including the not-found presentation.
pub mod pages;
