//! # Keyboard Controls
//!
//! Turns lines typed on stdin into [`Control`] messages for the tick loop.
//!
//! ## Commands
//! - `start`, `stop`: begin or pause listening
//! - `0`..`5` or a string label such as `E2`: toggle the lock on that string
//! - `q`, `quit`: leave

use std::io::BufRead;
use std::thread;

use crossbeam_channel::Sender;
use tuner_core::driver::Control;
use tuner_core::tuning::GUITAR_STRINGS;

pub fn parse_command(line: &str) -> Option<Control> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => None,
        "q" | "quit" | "exit" => Some(Control::Shutdown),
        "start" => Some(Control::Start),
        "stop" => Some(Control::Stop),
        _ => {
            if let Ok(index) = line.parse::<usize>() {
                return Some(Control::ToggleLock(index));
            }
            GUITAR_STRINGS
                .iter()
                .position(|s| s.label.eq_ignore_ascii_case(line))
                .map(Control::ToggleLock)
        }
    }
}

/// Forwards stdin commands until EOF, `quit`, or the tick loop goes away.
pub fn spawn_stdin_reader(sender: Sender<Control>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(control) => {
                    if sender.send(control).is_err() || control == Control::Shutdown {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => log::warn!("unknown command: {}", line.trim()),
            }
        }
        log::debug!("stdin closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_commands() {
        assert_eq!(parse_command("start"), Some(Control::Start));
        assert_eq!(parse_command(" STOP \n"), Some(Control::Stop));
        assert_eq!(parse_command("q"), Some(Control::Shutdown));
        assert_eq!(parse_command("quit"), Some(Control::Shutdown));
    }

    #[test]
    fn lock_by_index_or_label() {
        assert_eq!(parse_command("0"), Some(Control::ToggleLock(0)));
        assert_eq!(parse_command("d3"), Some(Control::ToggleLock(2)));
        assert_eq!(parse_command("E4"), Some(Control::ToggleLock(5)));
        // Out-of-range indices are passed through and rejected by the session.
        assert_eq!(parse_command("9"), Some(Control::ToggleLock(9)));
    }

    #[test]
    fn unknown_input() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("F3"), None);
        assert_eq!(parse_command("tune"), None);
    }
}
