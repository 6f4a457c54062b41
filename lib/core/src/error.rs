//! Error handling foundation for querydeck.
//!
//! Domain errors live next to the code that raises them (access errors in
//! `querydeck-platform-access`, history errors in
//! `querydeck-instrumentation`). This module only fixes the shape used where
//! failures are reported upward with rootcause context, such as server
//! startup.

use rootcause::Report;

/// Result whose error is a rootcause [`Report`] carrying context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_defaults_to_unit_context() {
        let ok: Result<&str> = Ok("ready");
        assert_eq!(ok.expect("should be ok"), "ready");
    }
}
