// common.rs — console printing and the engine error entry point
// Converted from: qcommon/common.c
//
// Output goes through the `log` facade; the host decides where it ends up.

pub const ERR_FATAL: i32 = 0; // exit the entire game with a popup window
pub const ERR_DROP: i32 = 1; // print to console and disconnect from game

/// Console print. Trailing newlines are trimmed since the logger adds its own.
pub fn com_printf(msg: &str) {
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print.
pub fn com_dprintf(msg: &str) {
    log::debug!("{}", msg.trim_end_matches('\n'));
}

/// Engine error handler.
/// - `ERR_FATAL`: logs and panics. Never returns.
/// - `ERR_DROP`: logs the error and returns so the caller can recover.
pub fn com_error(code: i32, msg: &str) {
    let msg = msg.trim_end_matches('\n');
    if code == ERR_FATAL {
        log::error!("Error: {}", msg);
        panic!("Fatal error: {}", msg);
    }
    log::error!("********************\nERROR: {}\n********************", msg);
}
