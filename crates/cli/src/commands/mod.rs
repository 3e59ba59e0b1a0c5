pub mod check_schema;
pub mod context;
pub mod introspect;
pub mod knowledge;
pub mod sql;
pub mod tool;

use sqlkeeper_core::error::IntrospectError;

/// Process exit status for a failed command: 2 when the database could not
/// be reached or read, 1 for everything else.
pub fn exit_code(error: &(dyn std::error::Error + 'static)) -> u8 {
    let introspect = error.downcast_ref::<IntrospectError>().or_else(|| {
        match error.downcast_ref::<sqlkeeper_core::Error>() {
            Some(sqlkeeper_core::Error::Introspect(e)) => Some(e),
            _ => None,
        }
    });
    match introspect {
        Some(IntrospectError::Rejected(_)) | None => 1,
        Some(_) => 2,
    }
}
