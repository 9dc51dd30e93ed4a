use std::io::{self, Write};

/// Audible nudge played when the learner leaves the session.
pub trait AlertSound: Send {
    fn play(&mut self) -> io::Result<()>;
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn play(&mut self) -> io::Result<()> {
        let mut err = io::stderr().lock();
        err.write_all(b"\x07")?;
        err.flush()
    }
}

/// Plays nothing.
#[derive(Debug, Default)]
pub struct Silent;

impl AlertSound for Silent {
    fn play(&mut self) -> io::Result<()> {
        Ok(())
    }
}
