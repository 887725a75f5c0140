use crate::core::error::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use std::time::Duration;

/// Wait up to `timeout` for a key press; other terminal events are dropped
pub fn poll_key(timeout: Duration) -> Result<Option<KeyEvent>> {
    // crossterm polling blocks the calling thread
    tokio::task::block_in_place(|| -> Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        }
    })
}
