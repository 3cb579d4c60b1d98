//! Installs the global subscriber, so it runs in its own test binary.

use stepsync_cli::logging;

#[test]
fn test_init_once_per_process() {
    let guard = logging::init(false, true).expect("first init installs the subscriber");
    assert!(logging::init(true, false).is_err());
    drop(guard);
}
