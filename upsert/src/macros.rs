//! Macros for building and returning [`crate::error::UpsertError`] values.

/// Creates an [`crate::error::UpsertError`] from a kind, a static description and optional
/// detail and source.
#[macro_export]
macro_rules! upsert_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::UpsertError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::UpsertError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::UpsertError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::UpsertError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with an [`crate::error::UpsertError`].
///
/// Accepts the same arguments as [`upsert_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::upsert_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::upsert_error!($kind, $desc, source: $source))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::upsert_error!($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::upsert_error!(
            $kind,
            $desc,
            $detail,
            source: $source
        ))
    };
}
