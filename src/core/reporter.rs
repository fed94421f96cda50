//! Human-readable findings on standard error.
//!
//! Three report shapes: a potential deadlock found by the comprehensive
//! search, the one-line termination header of a confirmed local deadlock,
//! and a double-locking report. Headers are red, section titles purple and
//! per-lock headers cyan, matching conventional terminal diagnostics.

use crate::core::dep_stack::PathEntry;
use crate::core::lock_state::LockState;
use crate::core::options::Options;
use std::panic::Location;

const RED: &str = "\x1b[1;31m";
const PURPLE: &str = "\x1b[1;35m";
const CYAN: &str = "\x1b[0;36m";
const RESET: &str = "\x1b[0m";

/// Report one cycle found by the comprehensive search.
pub(crate) fn report_potential_deadlock(cycle: &[PathEntry], opts: &Options) {
    eprintln!("{RED}POTENTIAL DEADLOCK{RESET}\n");

    eprintln!("{PURPLE}Initialization of locks involved in potential deadlock:{RESET}\n");
    for entry in cycle {
        for info in entry.dep.lock().context_snapshot() {
            if info.creation {
                eprintln!("{}:{}", info.file, info.line);
            }
        }
    }
    eprintln!();

    if opts.collect_call_stack {
        eprintln!("{PURPLE}Call stacks of locks involved in potential deadlock:{RESET}\n");
        for entry in cycle {
            let context = entry.dep.lock().context_snapshot();
            let created = &context[0];
            eprintln!(
                "{CYAN}Call stacks for lock created at: {}:{}{RESET}\n",
                created.file, created.line
            );
            for info in context.iter().skip(1) {
                if let Some(stack) = &info.call_stack {
                    eprintln!("{stack}");
                }
            }
        }
    } else {
        eprintln!("{PURPLE}Calls of locks involved in potential deadlock:{RESET}\n");
        for entry in cycle {
            let context = entry.dep.lock().context_snapshot();
            let created = &context[0];
            eprintln!(
                "{CYAN}Calls for lock created at: {}:{}{RESET}",
                created.file, created.line
            );
            for info in context.iter().skip(1) {
                eprintln!("{}:{}", info.file, info.line);
            }
            eprintln!();
        }
    }
    eprintln!();
}

/// Header printed when the periodical detector terminates the program. The
/// comprehensive report follows it.
pub(crate) fn report_local_deadlock() {
    eprintln!("{RED}THE PROGRAM WAS TERMINATED BECAUSE IT DETECTED A LOCAL DEADLOCK{RESET}\n");
}

/// Report a same-thread re-acquisition, including the lock's history and the
/// offending call site.
pub(crate) fn report_double_locking(m: &LockState, offending: &'static Location<'static>) {
    eprintln!("{RED}DEADLOCK (DOUBLE LOCKING){RESET}\n");

    let context = m.context_snapshot();
    eprintln!("{PURPLE}Initialization of lock involved in deadlock:{RESET}\n");
    eprintln!("{}:{}\n", context[0].file, context[0].line);

    eprintln!("{PURPLE}Calls of lock involved in deadlock:{RESET}\n");
    for info in context.iter().skip(1) {
        eprintln!("{}:{}", info.file, info.line);
    }
    eprintln!("{}:{}", offending.file(), offending.line());
    eprintln!("\n");
}
