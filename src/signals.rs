use nix::sys::signal::Signal;

/// Short name (no SIG prefix) for the signals this tool issues or observes.
///
/// Used in log lines like "issuing TERM to process". Anything outside the
/// fixed set falls back to the full name nix provides.
pub fn name(signal: Signal) -> &'static str {
    match signal {
        Signal::SIGCHLD => "CHLD",
        Signal::SIGCONT => "CONT",
        Signal::SIGINT => "INT",
        Signal::SIGKILL => "KILL",
        Signal::SIGSTOP => "STOP",
        Signal::SIGTERM => "TERM",
        other => other.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_the_signals_we_send() {
        assert_eq!(name(Signal::SIGTERM), "TERM");
        assert_eq!(name(Signal::SIGKILL), "KILL");
        assert_eq!(name(Signal::SIGSTOP), "STOP");
        assert_eq!(name(Signal::SIGCONT), "CONT");
    }

    #[test]
    fn names_the_signals_we_watch() {
        assert_eq!(name(Signal::SIGCHLD), "CHLD");
        assert_eq!(name(Signal::SIGINT), "INT");
    }

    #[test]
    fn falls_back_to_full_name_for_everything_else() {
        assert_eq!(name(Signal::SIGHUP), "SIGHUP");
    }
}
